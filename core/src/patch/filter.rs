//! Channel filtering

use fepbr_shared::ChannelFlags;
use tracing::debug;

use crate::document::ExportDocument;

use super::mapping::{ChannelBinding, ChannelMap};

/// Remove the texture reference of every structurally resolved channel
/// whose family is switched off. Returns the removed bindings.
///
/// Channels the mapping could not resolve are never touched.
pub fn filter_channels(
    document: &mut ExportDocument,
    map: &ChannelMap,
    flags: &ChannelFlags,
) -> Vec<ChannelBinding> {
    let mut removed = Vec::new();

    for binding in &map.bindings {
        if binding.family.is_enabled(flags) {
            continue;
        }
        let Some(material) = document.materials.get_mut(binding.material) else {
            continue;
        };
        if material.take_channel(binding.family).is_some() {
            debug!(
                "Dropped {} texture {} from material {}",
                binding.family, binding.texture, binding.material
            );
            removed.push(binding.clone());
        }
    }

    removed
}
