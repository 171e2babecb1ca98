//! Export document model
//!
//! The glTF-style JSON produced by the host's draft exporter. Only the three
//! cross-referenced arrays are typed; every other field of the document (and
//! of each entry) is carried through untouched in a flattened map.
//!
//! Texture references are only ever read or written through the enumerated
//! [`TextureSite`]s, and image references through [`Texture::image_sources`],
//! so the patch engine and the invariant check always agree on what counts
//! as a reference.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fepbr_shared::fs::{MAX_DOCUMENT_BYTES, read_file_with_limit, to_json_pretty};

use crate::channel::ChannelFamily;

/// Material extensions and the texture-info fields they carry.
pub const EXTENSION_TEXTURE_SITES: &[(&str, &[&str])] = &[
    (
        "KHR_materials_clearcoat",
        &["clearcoatTexture", "clearcoatRoughnessTexture", "clearcoatNormalTexture"],
    ),
    ("KHR_materials_transmission", &["transmissionTexture"]),
    ("KHR_materials_volume", &["thicknessTexture"]),
    ("KHR_materials_specular", &["specularTexture", "specularColorTexture"]),
    ("KHR_materials_sheen", &["sheenColorTexture", "sheenRoughnessTexture"]),
    (
        "KHR_materials_iridescence",
        &["iridescenceTexture", "iridescenceThicknessTexture"],
    ),
    ("KHR_materials_anisotropy", &["anisotropyTexture"]),
    (
        "KHR_materials_diffuse_transmission",
        &["diffuseTransmissionTexture", "diffuseTransmissionColorTexture"],
    ),
    (
        "KHR_materials_pbrSpecularGlossiness",
        &["diffuseTexture", "specularGlossinessTexture"],
    ),
];

/// Texture extensions that point at an alternative image `source`.
pub const IMAGE_SOURCE_EXTENSIONS: &[&str] = &[
    "EXT_texture_webp",
    "KHR_texture_basisu",
    "EXT_texture_avif",
    "MSFT_texture_dds",
];

/// A place in a material that can reference a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSite {
    Core(ChannelFamily),
    Extension {
        extension: &'static str,
        field: &'static str,
    },
}

impl std::fmt::Display for TextureSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureSite::Core(family) => f.write_str(family.label()),
            TextureSite::Extension { extension, field } => write!(f, "{extension}.{field}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid export document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Material {material} ({site}) references texture {index}, but there are {len}")]
    TextureOutOfRange {
        material: usize,
        site: TextureSite,
        index: u32,
        len: usize,
    },

    #[error("Texture {texture} references image {index}, but there are {len}")]
    ImageOutOfRange { texture: usize, index: u32, len: usize },

    #[error("{location} holds {value}, which is not an array index")]
    InvalidIndex { location: String, value: String },
}

/// An extension `index` / `source` value as an array index. Negative,
/// fractional and out-of-range values are `None`.
fn index_value(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

/// `images[i]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    /// Image data lives in a buffer rather than a file
    pub fn is_embedded(&self) -> bool {
        self.buffer_view.is_some()
    }

    /// The file URI, for file-addressed images only. `data:` URIs count as
    /// embedded.
    pub fn file_uri(&self) -> Option<&str> {
        if self.is_embedded() {
            return None;
        }
        self.uri
            .as_deref()
            .filter(|uri| !uri.is_empty() && !uri.starts_with("data:"))
    }
}

/// `textures[i]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Texture {
    pub fn with_source(source: u32) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    /// Every image this texture can sample: `source` first, then the
    /// sources of known image-format extensions.
    pub fn image_sources(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.source.into_iter().collect();
        if let Some(extensions) = &self.extensions {
            for name in IMAGE_SOURCE_EXTENSIONS {
                if let Some(index) = extensions
                    .get(*name)
                    .and_then(|ext| ext.get("source"))
                    .and_then(index_value)
                {
                    out.push(index);
                }
            }
        }
        out
    }

    /// Rewrite every image reference through `map`.
    pub fn remap_images(&mut self, map: impl Fn(u32) -> u32) {
        if let Some(source) = self.source.as_mut() {
            *source = map(*source);
        }
        if let Some(extensions) = self.extensions.as_mut() {
            for name in IMAGE_SOURCE_EXTENSIONS {
                if let Some(source) = extensions
                    .get_mut(*name)
                    .and_then(|ext| ext.get_mut("source"))
                    && let Some(index) = index_value(source)
                {
                    *source = Value::from(map(index));
                }
            }
        }
    }
}

/// Reference from a material to a texture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub index: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextureInfo {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `materials[i]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Material {
    pub fn channel(&self, family: ChannelFamily) -> Option<&TextureInfo> {
        match family {
            ChannelFamily::BaseColor => self
                .pbr_metallic_roughness
                .as_ref()
                .and_then(|p| p.base_color_texture.as_ref()),
            ChannelFamily::MetallicRoughness => self
                .pbr_metallic_roughness
                .as_ref()
                .and_then(|p| p.metallic_roughness_texture.as_ref()),
            ChannelFamily::Normal => self.normal_texture.as_ref(),
            ChannelFamily::Occlusion => self.occlusion_texture.as_ref(),
            ChannelFamily::Emissive => self.emissive_texture.as_ref(),
        }
    }

    fn channel_slot(&mut self, family: ChannelFamily) -> Option<&mut Option<TextureInfo>> {
        match family {
            ChannelFamily::BaseColor => self
                .pbr_metallic_roughness
                .as_mut()
                .map(|p| &mut p.base_color_texture),
            ChannelFamily::MetallicRoughness => self
                .pbr_metallic_roughness
                .as_mut()
                .map(|p| &mut p.metallic_roughness_texture),
            ChannelFamily::Normal => Some(&mut self.normal_texture),
            ChannelFamily::Occlusion => Some(&mut self.occlusion_texture),
            ChannelFamily::Emissive => Some(&mut self.emissive_texture),
        }
    }

    /// Remove and return the texture reference for `family`. Factors stay.
    pub fn take_channel(&mut self, family: ChannelFamily) -> Option<TextureInfo> {
        self.channel_slot(family).and_then(Option::take)
    }

    /// Every texture reference of the material, in site order.
    pub fn texture_refs(&self) -> Vec<(TextureSite, u32)> {
        let mut refs: Vec<_> = ChannelFamily::ALL
            .iter()
            .filter_map(|&family| {
                self.channel(family)
                    .map(|info| (TextureSite::Core(family), info.index))
            })
            .collect();

        if let Some(extensions) = &self.extensions {
            for &(extension, fields) in EXTENSION_TEXTURE_SITES {
                let Some(ext) = extensions.get(extension) else {
                    continue;
                };
                for &field in fields {
                    if let Some(index) = ext
                        .get(field)
                        .and_then(|info| info.get("index"))
                        .and_then(index_value)
                    {
                        refs.push((TextureSite::Extension { extension, field }, index));
                    }
                }
            }
        }
        refs
    }

    /// Rewrite every texture reference through `map`.
    pub fn remap_textures(&mut self, map: impl Fn(u32) -> u32) {
        for family in ChannelFamily::ALL {
            if let Some(Some(info)) = self.channel_slot(family) {
                info.index = map(info.index);
            }
        }

        let Some(extensions) = self.extensions.as_mut() else {
            return;
        };
        for &(extension, fields) in EXTENSION_TEXTURE_SITES {
            let Some(ext) = extensions.get_mut(extension) else {
                continue;
            };
            for &field in fields {
                if let Some(index) = ext.get_mut(field).and_then(|info| info.get_mut("index"))
                    && let Some(old) = index_value(index)
                {
                    *index = Value::from(map(old));
                }
            }
        }
    }
}

/// A draft or patched export document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ExportDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_file_with_limit(path, MAX_DOCUMENT_BYTES)?;
        Self::parse(&bytes).with_context(|| format!("Failed to parse document: {}", path.display()))
    }

    /// Four-space indented JSON
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_json_pretty(self)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write document: {}", path.display()))
    }

    /// Textures referenced from any material site
    pub fn used_textures(&self) -> Vec<bool> {
        let mut used = vec![false; self.textures.len()];
        for material in &self.materials {
            for (_, index) in material.texture_refs() {
                if let Some(flag) = used.get_mut(index as usize) {
                    *flag = true;
                }
            }
        }
        used
    }

    /// Check that every cross-reference is a representable index and in range.
    pub fn validate(&self) -> Result<(), DocumentError> {
        self.check_extension_indices()?;
        for (material, entry) in self.materials.iter().enumerate() {
            for (site, index) in entry.texture_refs() {
                if index as usize >= self.textures.len() {
                    return Err(DocumentError::TextureOutOfRange {
                        material,
                        site,
                        index,
                        len: self.textures.len(),
                    });
                }
            }
        }
        for (texture, entry) in self.textures.iter().enumerate() {
            for index in entry.image_sources() {
                if index as usize >= self.images.len() {
                    return Err(DocumentError::ImageOutOfRange {
                        texture,
                        index,
                        len: self.images.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Extension indices are untyped JSON; a value that is present but not
    /// a `u32` would otherwise be skipped by the site walk.
    fn check_extension_indices(&self) -> Result<(), DocumentError> {
        let invalid = |location: String, value: &Value| DocumentError::InvalidIndex {
            location,
            value: value.to_string(),
        };

        for (material, entry) in self.materials.iter().enumerate() {
            let Some(extensions) = &entry.extensions else {
                continue;
            };
            for &(extension, fields) in EXTENSION_TEXTURE_SITES {
                let Some(ext) = extensions.get(extension) else {
                    continue;
                };
                for &field in fields {
                    if let Some(index) = ext.get(field).and_then(|info| info.get("index"))
                        && index_value(index).is_none()
                    {
                        return Err(invalid(
                            format!("Material {material} ({extension}.{field})"),
                            index,
                        ));
                    }
                }
            }
        }

        for (texture, entry) in self.textures.iter().enumerate() {
            let Some(extensions) = &entry.extensions else {
                continue;
            };
            for name in IMAGE_SOURCE_EXTENSIONS {
                if let Some(source) = extensions.get(*name).and_then(|ext| ext.get("source"))
                    && index_value(source).is_none()
                {
                    return Err(invalid(format!("Texture {texture} ({name}.source)"), source));
                }
            }
        }
        Ok(())
    }
}
