//! Batch import
//!
//! Imports many files through the host. Materials of meshes imported from
//! glTF documents are copied with an `_FePBR` suffix and rewritten to the
//! FePBR parameter group; FBX imports only list the textures they brought in.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use fepbr_shared::constants::REWRITTEN_MATERIAL_SUFFIX;

use crate::graph::ShadingGraph;
use crate::host::{ImportHost, ReportLevel};
use crate::rewrite::rewrite_material;
use crate::scene::{InstanceId, Material, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// glTF / GLB documents
    Document,
    /// FBX meshes
    Mesh,
}

impl ImportKind {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImportKind::Document => &["gltf", "glb"],
            ImportKind::Mesh => &["fbx"],
        }
    }

    /// Case-insensitive extension check
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        [ImportKind::Document, ImportKind::Mesh]
            .into_iter()
            .find(|kind| kind.matches(path))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Files passed in
    pub requested: usize,
    pub imported: usize,
    pub failed: usize,
    /// Files with the wrong extension
    pub skipped: usize,
    /// Materials rewritten to the parameter group
    pub rewritten: usize,
    /// Materials copied but left as imported
    pub rewrite_failed: usize,
}

/// Material counters for one instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialConversion {
    pub rewritten: usize,
    pub failed: usize,
}

/// A texture file referenced by an imported material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUse {
    pub material: String,
    pub image: String,
    pub path: PathBuf,
}

/// Import every file in `paths` of the given kind.
///
/// Per-file failures are logged and counted; the batch keeps going.
pub fn import_files<H: ImportHost + ?Sized>(
    host: &mut H,
    paths: &[PathBuf],
    kind: ImportKind,
    template: Option<&ShadingGraph>,
) -> ImportSummary {
    let mut summary = ImportSummary {
        requested: paths.len(),
        ..Default::default()
    };

    let valid: Vec<&PathBuf> = paths
        .iter()
        .filter(|path| {
            let ok = kind.matches(path);
            if !ok {
                debug!("Skipping {}: not a {:?} file", path.display(), kind);
            }
            ok
        })
        .collect();
    summary.skipped = paths.len() - valid.len();
    info!("Importing {} file(s)", valid.len());
    if kind == ImportKind::Document && template.is_none() {
        warn!("No template material loaded; materials will be copied but not rewritten");
    }

    for path in valid {
        let result = match kind {
            ImportKind::Document => host.import_document(path),
            ImportKind::Mesh => host.import_mesh(path),
        };
        let new_objects = match result {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to import {}: {e:#}", path.display());
                summary.failed += 1;
                continue;
            }
        };
        info!("Imported: {}", path.display());
        summary.imported += 1;

        match kind {
            ImportKind::Document => {
                for id in new_objects {
                    let conversion = convert_instance_materials(host.scene_mut(), id, template);
                    summary.rewritten += conversion.rewritten;
                    summary.rewrite_failed += conversion.failed;
                }
            }
            ImportKind::Mesh => {
                let textures: Vec<_> = new_objects
                    .iter()
                    .flat_map(|id| texture_paths(host.scene(), *id))
                    .collect();
                if textures.is_empty() {
                    info!("  (no textures found)");
                }
                for texture in textures {
                    info!(
                        "  material {}: image {} at {}",
                        texture.material,
                        texture.image,
                        texture.path.display()
                    );
                }
            }
        }
    }

    host.report(
        ReportLevel::Info,
        &format!(
            "Imported {}/{} file(s)",
            summary.imported,
            summary.requested - summary.skipped
        ),
    );
    summary
}

/// Replace every material of a mesh instance with a rewritten copy named
/// `<name>_FePBR`.
///
/// A copy whose rewrite fails is still assigned, unmodified.
pub fn convert_instance_materials(
    scene: &mut Scene,
    id: InstanceId,
    template: Option<&ShadingGraph>,
) -> MaterialConversion {
    let mut conversion = MaterialConversion::default();
    let Some(instance) = scene.instance_mut(id).filter(|i| i.is_mesh()) else {
        return conversion;
    };

    for slot in &mut instance.material_slots {
        let Some(original) = &slot.material else {
            continue;
        };
        let mut copy = original.clone();
        copy.name = format!("{}{REWRITTEN_MATERIAL_SUFFIX}", original.name);

        if let Some(graph) = copy.graph.as_mut() {
            match rewrite_material(graph, template) {
                Ok(outcome) => {
                    debug!("Rewrote {}: {} input(s) carried over", copy.name, outcome.rewired.len());
                    conversion.rewritten += 1;
                }
                Err(e) => {
                    warn!("Material {} left as imported: {e}", copy.name);
                    conversion.failed += 1;
                }
            }
        }
        slot.material = Some(copy);
    }

    conversion
}

/// Existing image files referenced by an instance's materials
pub fn texture_paths(scene: &Scene, id: InstanceId) -> Vec<TextureUse> {
    let Some(instance) = scene.instance(id).filter(|i| i.is_mesh()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for material in instance.materials() {
        let Some(graph) = &material.graph else {
            continue;
        };
        for (_, image) in graph.image_nodes() {
            let Some(raw) = image.filepath.as_deref() else {
                continue;
            };
            let path = scene.resolve_data_path(instance, raw);
            if path.exists() {
                out.push(TextureUse {
                    material: material.name.clone(),
                    image: image.name.clone(),
                    path,
                });
            }
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Library { materials: Vec<Material> },
    Single(Material),
}

/// Load the template material: a JSON file holding either one material or
/// `{"materials": [...]}`, of which the first is used.
///
/// A missing file is not an error; imports then copy materials without
/// rewriting them.
pub fn load_template(path: &Path) -> Result<Option<Material>> {
    if !path.exists() {
        warn!("Template not found at {}", path.display());
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template: {}", path.display()))?;
    let file: TemplateFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse template: {}", path.display()))?;

    let material = match file {
        TemplateFile::Library { materials } => materials.into_iter().next(),
        TemplateFile::Single(material) => Some(material),
    };
    if let Some(material) = &material {
        info!("Loaded template material: {}", material.name);
    }
    Ok(material)
}
