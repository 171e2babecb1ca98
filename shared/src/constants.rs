//! Centralized constants for the scene porter.
//!
//! Names here are part of the on-disk layout or of the shading graph
//! conventions, so both the engines and the CLI read them from one place.

/// Extension of the per-mesh export documents (separate-file glTF).
pub const DOCUMENT_EXT: &str = "gltf";

/// Default file name of the manifest written when an export job finishes.
pub const DEFAULT_MANIFEST_FILE: &str = "selected_meshes.json";

/// Directory (below the per-source folder) that receives relocated images.
///
/// Layout: `<texture root>/<source folder>/texture/<file name>`
pub const TEXTURE_DIR: &str = "texture";

/// Marker contained in the tree name of the custom parameter group.
pub const PARAMETER_GROUP_MARKER: &str = "FePBR";

/// Marker contained in the tree name of the side-channel output group that
/// glTF importers create to carry ambient occlusion.
pub const GLTF_OUTPUT_GROUP_MARKER: &str = "glTF Material Output";

/// Suffix appended to a material copy before it is rewritten.
pub const REWRITTEN_MATERIAL_SUFFIX: &str = "_FePBR";

/// Default suffix for generated collision hulls.
pub const DEFAULT_HULL_SUFFIX: &str = "_UCX";

/// Minimum interval between two export ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
