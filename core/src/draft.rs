//! Reference draft writer
//!
//! Produces the kind of first-draft glTF document an interactive exporter
//! would: one material per material slot, every traced channel image copied
//! next to the document under its own file name, and a plain node/mesh
//! skeleton. The file-backed host and the test host both export through it.

use std::path::Path;

use anyhow::{Context, Result, bail};
use hashbrown::HashMap;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use fepbr_shared::fs::{copy_if_absent, create_dir_all};

use crate::channel::ChannelFamily;
use crate::document::{self, ExportDocument, Image, PbrMetallicRoughness, Texture, TextureInfo};
use crate::host::{DraftImageFormat, DraftOptions};
use crate::scene::{InstanceId, MeshInstance, Scene};
use crate::trace::trace_family;

pub const GENERATOR: &str = "fepbr draft writer";

/// Build the draft for `instance` and write it to `path`.
pub fn write_draft(scene: &Scene, instance: InstanceId, path: &Path, options: &DraftOptions) -> Result<ExportDocument> {
    let instance = scene
        .instance(instance)
        .with_context(|| format!("{instance} is not in the scene"))?;
    if !options.separate_images && options.image_format != DraftImageFormat::None {
        bail!("Embedded images are not supported; enable separate images");
    }

    let document_dir = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(document_dir)?;

    let document = build_draft(scene, instance, document_dir, options)?;
    document.save(path)?;
    debug!(
        "Draft {}: {} material(s), {} texture(s), {} image(s)",
        path.display(),
        document.materials.len(),
        document.textures.len(),
        document.images.len()
    );
    Ok(document)
}

/// Build the draft, copying images into `document_dir`.
pub fn build_draft(
    scene: &Scene,
    instance: &MeshInstance,
    document_dir: &Path,
    options: &DraftOptions,
) -> Result<ExportDocument> {
    let mut document = ExportDocument::default();
    // Image datablock name -> texture index; the exporter writes each once.
    let mut textures_by_image: HashMap<String, u32> = HashMap::new();

    for (slot, material_slot) in instance.material_slots.iter().enumerate() {
        let Some(material) = &material_slot.material else {
            document.materials.push(document::Material {
                name: Some(format!("slot {slot}")),
                ..Default::default()
            });
            continue;
        };

        let mut out = document::Material {
            name: Some(material.name.clone()),
            pbr_metallic_roughness: Some(PbrMetallicRoughness::default()),
            ..Default::default()
        };

        if let Some(graph) = &material.graph
            && options.image_format != DraftImageFormat::None
        {
            for family in ChannelFamily::ALL {
                let Some(image) = trace_family(graph, family)
                    .and_then(|node| graph.node(node))
                    .and_then(|node| node.image())
                else {
                    continue;
                };

                let texture = match textures_by_image.get(&image.name) {
                    Some(&texture) => texture,
                    None => {
                        let Some(raw) = image.filepath.as_deref() else {
                            continue;
                        };
                        let source = scene.resolve_data_path(instance, raw);
                        let Some(file_name) = source.file_name().filter(|_| source.is_file()) else {
                            warn!("Image {} is missing at {}, not exported", image.name, source.display());
                            continue;
                        };
                        if options.image_format != DraftImageFormat::Auto {
                            debug!("{:?} requested; {} is copied unchanged", options.image_format, image.name);
                        }
                        copy_if_absent(&source, &document_dir.join(file_name))?;

                        let image_index = document.images.len() as u32;
                        document.images.push(Image {
                            uri: Some(file_name.to_string_lossy().into_owned()),
                            mime_type: mime_type(&source).map(str::to_string),
                            name: Some(image.name.clone()),
                            ..Default::default()
                        });
                        let texture = document.textures.len() as u32;
                        document.textures.push(Texture {
                            sampler: Some(0),
                            ..Texture::with_source(image_index)
                        });
                        textures_by_image.insert(image.name.clone(), texture);
                        texture
                    }
                };
                set_channel(&mut out, family, texture);
            }
        }
        document.materials.push(out);
    }

    document.rest = skeleton(scene, instance, !document.textures.is_empty());
    Ok(document)
}

fn set_channel(material: &mut document::Material, family: ChannelFamily, texture: u32) {
    let info = Some(TextureInfo::new(texture));
    match family {
        ChannelFamily::BaseColor => {
            material
                .pbr_metallic_roughness
                .get_or_insert_with(Default::default)
                .base_color_texture = info;
        }
        ChannelFamily::MetallicRoughness => {
            material
                .pbr_metallic_roughness
                .get_or_insert_with(Default::default)
                .metallic_roughness_texture = info;
        }
        ChannelFamily::Normal => material.normal_texture = info,
        ChannelFamily::Occlusion => material.occlusion_texture = info,
        ChannelFamily::Emissive => material.emissive_texture = info,
    }
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Everything outside the three typed arrays
fn skeleton(scene: &Scene, instance: &MeshInstance, with_sampler: bool) -> Map<String, Value> {
    let mesh_name = scene
        .mesh_of(instance)
        .map(|mesh| mesh.name.as_str())
        .unwrap_or(instance.name.as_str());
    let primitives: Vec<Value> = (0..instance.material_slots.len().max(1))
        .map(|slot| {
            if instance.material_slots.is_empty() {
                json!({ "attributes": {} })
            } else {
                json!({ "attributes": {}, "material": slot })
            }
        })
        .collect();

    let mut rest = Map::new();
    rest.insert("asset".into(), json!({ "version": "2.0", "generator": GENERATOR }));
    rest.insert("scene".into(), json!(0));
    rest.insert("scenes".into(), json!([{ "name": "Scene", "nodes": [0] }]));
    rest.insert("nodes".into(), json!([{ "name": instance.name, "mesh": 0 }]));
    rest.insert("meshes".into(), json!([{ "name": mesh_name, "primitives": primitives }]));
    if with_sampler {
        rest.insert("samplers".into(), json!([{ "magFilter": 9729, "minFilter": 9987 }]));
    }
    rest
}
