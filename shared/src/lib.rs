//! Shared types for the FePBR scene porter.
//!
//! Holds everything both the engines in `fepbr-core` and the command line
//! front end need to agree on: the `export.toml` settings, the manifest
//! records written at the end of an export, and a few filesystem helpers.

pub mod constants;
pub mod fs;
pub mod ids;
pub mod manifest;
pub mod settings;

pub use manifest::{InstanceRecord, MeshListing, QuatRecord, SceneManifest, Vec3Record};
pub use settings::{ChannelFlags, ExportSettings, SettingsError};
