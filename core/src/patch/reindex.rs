//! Index recomputation
//!
//! Drops unreferenced textures and images, merges images exported from the
//! same source, and rewrites every cross-reference to the compacted arrays.
//! Surviving entries keep their relative order, so running this on its own
//! output changes nothing.

use hashbrown::HashMap;

use crate::document::ExportDocument;

use super::assets::ImageKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub dropped_textures: usize,
    pub dropped_images: usize,
    /// Images folded into an earlier image with the same key
    pub merged_images: usize,
}

/// Images sampled by at least one texture in `used_textures`
pub fn used_images(document: &ExportDocument, used_textures: &[bool]) -> Vec<bool> {
    let mut used = vec![false; document.images.len()];
    for (texture, _) in used_textures.iter().enumerate().filter(|(_, u)| **u) {
        let Some(texture) = document.textures.get(texture) else {
            continue;
        };
        for image in texture.image_sources() {
            if let Some(flag) = used.get_mut(image as usize) {
                *flag = true;
            }
        }
    }
    used
}

/// Compact `document` in place. `image_keys` is rewritten to the new image
/// indices.
pub fn reindex(document: &mut ExportDocument, image_keys: &mut HashMap<u32, ImageKey>) -> ReindexStats {
    let used_textures = document.used_textures();
    let used_images = used_images(document, &used_textures);
    let mut stats = ReindexStats::default();

    // Images
    let mut image_map: HashMap<u32, u32> = HashMap::new();
    let mut key_owner: HashMap<ImageKey, u32> = HashMap::new();
    let mut new_keys: HashMap<u32, ImageKey> = HashMap::new();
    let mut images = Vec::new();
    for (old, image) in std::mem::take(&mut document.images).into_iter().enumerate() {
        let old = old as u32;
        if !used_images[old as usize] {
            stats.dropped_images += 1;
            continue;
        }
        let key = image_keys.get(&old);
        if let Some(&owner) = key.and_then(|k| key_owner.get(k)) {
            image_map.insert(old, owner);
            stats.merged_images += 1;
            continue;
        }

        let new = images.len() as u32;
        if let Some(key) = key {
            key_owner.insert(key.clone(), new);
            new_keys.insert(new, key.clone());
        }
        image_map.insert(old, new);
        images.push(image);
    }
    document.images = images;
    *image_keys = new_keys;

    // Textures
    let mut texture_map: HashMap<u32, u32> = HashMap::new();
    let mut textures = Vec::new();
    for (old, mut texture) in std::mem::take(&mut document.textures).into_iter().enumerate() {
        if !used_textures[old] {
            stats.dropped_textures += 1;
            continue;
        }
        texture.remap_images(|i| image_map.get(&i).copied().unwrap_or(i));
        texture_map.insert(old as u32, textures.len() as u32);
        textures.push(texture);
    }
    document.textures = textures;

    for material in &mut document.materials {
        material.remap_textures(|i| texture_map.get(&i).copied().unwrap_or(i));
    }

    stats
}
