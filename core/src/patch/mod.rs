//! Export document patch engine
//!
//! Takes the host's first-draft document for one instance and corrects it
//! in place:
//!
//! 1. map each material's channels to image keys through its shading graph
//! 2. strip channels the user switched off
//! 3. find the textures still referenced from a known site
//! 4. relocate their images to the shared texture directory
//! 5. compact and re-index `images`, `textures` and `materials`
//! 6. write the document back
//!
//! The cross-reference invariant (every index in range) is checked on the
//! draft and again before writing.

pub mod assets;
mod filter;
mod mapping;
mod relocate;
mod reindex;

pub use assets::{AssetMap, AssetMetadata, ImageKey, collect_assets};
pub use filter::filter_channels;
pub use mapping::{ChannelBinding, ChannelMap, map_channels};
pub use reindex::{ReindexStats, reindex, used_images};
pub use relocate::{RelocationStats, decode_uri, relocate_images};

use std::path::{Path, PathBuf};

use fepbr_shared::ChannelFlags;
use fepbr_shared::fs::{MAX_DOCUMENT_BYTES, read_file_with_limit};
use tracing::{debug, info};

use crate::document::{DocumentError, ExportDocument};
use crate::graph::ShadingGraph;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Draft document was not written: {}", .0.display())]
    MissingDocument(PathBuf),

    #[error("Draft document is invalid: {0}")]
    Draft(#[source] DocumentError),

    #[error("Patched document is inconsistent: {0}")]
    Inconsistent(#[source] DocumentError),

    #[error(transparent)]
    Fs(#[from] anyhow::Error),
}

/// Everything the engine needs for one document
#[derive(Debug, Clone, Copy)]
pub struct PatchInput<'a> {
    pub document_path: &'a Path,
    /// Shading graph per material slot, in slot order
    pub slots: &'a [Option<&'a ShadingGraph>],
    pub flags: ChannelFlags,
    pub assets: &'a AssetMap,
}

/// Counters describing what a patch changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub bindings: usize,
    pub filtered: usize,
    pub relocation: RelocationStats,
    pub reindex: ReindexStats,
}

/// Patch the document at `input.document_path` in place.
pub fn patch_document(input: PatchInput<'_>) -> Result<PatchReport, PatchError> {
    let path = input.document_path;
    if !path.is_file() {
        return Err(PatchError::MissingDocument(path.to_path_buf()));
    }
    let document_dir = path.parent().unwrap_or(Path::new(""));

    let bytes = read_file_with_limit(path, MAX_DOCUMENT_BYTES)?;
    let mut document = ExportDocument::parse(&bytes).map_err(PatchError::Draft)?;
    document.validate().map_err(PatchError::Draft)?;

    let report = patch_in_memory(&mut document, &input, document_dir)?;

    document.validate().map_err(PatchError::Inconsistent)?;
    document.save(path)?;

    info!(
        "Patched {}: {} channel(s) filtered, {} image(s) relocated, {} texture(s) and {} image(s) dropped",
        path.display(),
        report.filtered,
        report.relocation.relocated,
        report.reindex.dropped_textures,
        report.reindex.dropped_images + report.reindex.merged_images,
    );
    Ok(report)
}

/// The patch steps without the file round trip. Relocation still touches
/// the filesystem around `document_dir`.
pub fn patch_in_memory(
    document: &mut ExportDocument,
    input: &PatchInput<'_>,
    document_dir: &Path,
) -> Result<PatchReport, PatchError> {
    let mut map = map_channels(document, input.slots, input.assets);
    debug!("{} structural channel binding(s)", map.bindings.len());

    let filtered = filter_channels(document, &map, &input.flags);

    let used_textures = document.used_textures();
    let used = used_images(document, &used_textures);
    let relocation = relocate_images(document, &used, &map, input.assets, document_dir)?;

    let reindexed = reindex(document, &mut map.image_keys);

    Ok(PatchReport {
        bindings: map.bindings.len(),
        filtered: filtered.len(),
        relocation,
        reindex: reindexed,
    })
}
