//! Image relocation
//!
//! Moves every used, file-addressed image to its shared home under the
//! texture root and points its URI there. The host's adjacent copies are
//! removed once the shared copy exists; files outside the document directory
//! and source images are never touched.

use std::path::{Path, PathBuf};

use anyhow::Result;
use hashbrown::HashSet;
use tracing::debug;

use fepbr_shared::fs::{copy_if_absent, remove_file_if_exists};

use crate::document::ExportDocument;
use crate::paths::canonicalize_lenient;

use super::assets::AssetMap;
use super::mapping::ChannelMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationStats {
    /// URIs rewritten
    pub relocated: usize,
    /// Sources copied to a fresh destination
    pub copied: usize,
    /// Host-written adjacent files removed
    pub removed: usize,
}

/// Relocate every image flagged in `used`, then delete the adjacent files of
/// images that are about to be dropped.
pub fn relocate_images(
    document: &mut ExportDocument,
    used: &[bool],
    map: &ChannelMap,
    assets: &AssetMap,
    document_dir: &Path,
) -> Result<RelocationStats> {
    let mut stats = RelocationStats::default();
    let doc_dir = canonicalize_lenient(document_dir);
    let destinations: HashSet<PathBuf> = assets.destinations().map(canonicalize_lenient).collect();
    // A document written next to its sources sees them as adjacent files.
    let sources: HashSet<PathBuf> = assets
        .iter()
        .filter_map(|meta| meta.source.as_deref())
        .map(canonicalize_lenient)
        .collect();
    let removable = |adjacent: &Path| {
        adjacent.starts_with(&doc_dir)
            && !destinations.contains(adjacent)
            && !sources.contains(adjacent)
    };

    let plans: Vec<_> = document
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let relocation = used
                .get(index)
                .copied()
                .unwrap_or(false)
                .then(|| image.file_uri())
                .flatten()
                .and(map.image_keys.get(&(index as u32)))
                .and_then(|key| assets.get(key))
                .and_then(|meta| meta.relocation());
            (index, relocation)
        })
        .collect();

    // Adjacent files still needed by used images that stay where the host put them.
    let pinned: HashSet<String> = plans
        .iter()
        .filter(|(index, plan)| plan.is_none() && used.get(*index).copied().unwrap_or(false))
        .filter_map(|(index, _)| document.images[*index].file_uri().map(str::to_string))
        .collect();

    let mut rewrites = Vec::new();
    for (index, plan) in &plans {
        let Some((source, destination, uri)) = plan else {
            continue;
        };
        let Some(old_uri) = document.images[*index].file_uri() else {
            continue;
        };

        if copy_if_absent(source, destination)? {
            debug!("Copied {} -> {}", source.display(), destination.display());
            stats.copied += 1;
        }

        let adjacent = canonicalize_lenient(&doc_dir.join(decode_uri(old_uri)));
        if !pinned.contains(old_uri)
            && removable(adjacent.as_path())
            && remove_file_if_exists(&adjacent)?
        {
            stats.removed += 1;
        }

        rewrites.push((*index, uri.to_string()));
    }

    for (index, uri) in rewrites {
        document.images[index].uri = Some(uri);
        stats.relocated += 1;
    }

    let surviving: HashSet<&str> = document
        .images
        .iter()
        .enumerate()
        .filter(|(index, _)| used.get(*index).copied().unwrap_or(false))
        .filter_map(|(_, image)| image.file_uri())
        .collect();
    for (index, image) in document.images.iter().enumerate() {
        if used.get(index).copied().unwrap_or(false) {
            continue;
        }
        let Some(uri) = image.file_uri() else {
            continue;
        };
        if surviving.contains(uri) {
            continue;
        }
        let adjacent = canonicalize_lenient(&doc_dir.join(decode_uri(uri)));
        if removable(adjacent.as_path()) && remove_file_if_exists(&adjacent)? {
            debug!("Removed dropped image {}", adjacent.display());
            stats.removed += 1;
        }
    }

    Ok(stats)
}

/// Undo `%XX` escapes in a relative URI.
pub fn decode_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = uri.get(i + 1..i + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
