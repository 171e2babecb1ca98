//! Structural channel mapping
//!
//! Pairs each document material (by position) with its slot's shading graph
//! and, per channel family, records which texture and image the document
//! uses and which image key the graph says feeds that channel. Neither side
//! alone is trusted: a binding exists only when both agree there is a
//! texture.

use hashbrown::HashMap;
use tracing::debug;

use crate::channel::ChannelFamily;
use crate::document::ExportDocument;
use crate::graph::ShadingGraph;
use crate::trace::trace_family;

use super::assets::{AssetMap, ImageKey};

/// One resolved (material, family) channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub material: usize,
    pub family: ChannelFamily,
    pub texture: u32,
    pub image: Option<u32>,
    pub key: ImageKey,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    pub bindings: Vec<ChannelBinding>,
    /// Image index to the key of the source it was exported from
    pub image_keys: HashMap<u32, ImageKey>,
}

impl ChannelMap {
    pub fn binding(&self, material: usize, family: ChannelFamily) -> Option<&ChannelBinding> {
        self.bindings
            .iter()
            .find(|b| b.material == material && b.family == family)
    }
}

/// Build the channel map for `document`. `slots[i]` is the graph of the
/// material exported as `materials[i]`, if it has one.
pub fn map_channels(
    document: &ExportDocument,
    slots: &[Option<&ShadingGraph>],
    assets: &AssetMap,
) -> ChannelMap {
    let mut map = ChannelMap::default();

    for (index, material) in document.materials.iter().enumerate() {
        let Some(graph) = slots.get(index).copied().flatten() else {
            debug!("Material {index} has no shading graph; channels left as exported");
            continue;
        };

        for family in ChannelFamily::ALL {
            let Some(info) = material.channel(family) else {
                continue;
            };
            let Some(key) = trace_family(graph, family)
                .and_then(|node| graph.node(node))
                .and_then(|node| node.image())
                .and_then(|image| assets.key_of(image))
            else {
                continue;
            };

            let image = document
                .textures
                .get(info.index as usize)
                .and_then(|texture| texture.source);

            if let Some(image) = image {
                match map.image_keys.get(&image) {
                    Some(existing) if existing != key => {
                        debug!("Image {image} claimed by {existing} and {key}; keeping the first");
                    }
                    Some(_) => {}
                    None => {
                        map.image_keys.insert(image, key.clone());
                    }
                }
            }

            map.bindings.push(ChannelBinding {
                material: index,
                family,
                texture: info.index,
                image,
                key: key.clone(),
            });
        }
    }

    map
}
