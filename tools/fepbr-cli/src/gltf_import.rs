//! glTF / GLB document import for the file-backed host
//!
//! Builds scene objects the way an editor's glTF importer does: one object
//! per mesh node, one material slot per distinct primitive material, and a
//! standard shading graph with an image node per texture channel. Occlusion
//! goes to a side `glTF Material Output` group, normals through a decoder.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use glam::{Mat4, Quat, Vec2, Vec3};
use serde_json::Value;
use tracing::debug;

use fepbr_core::document::{self, ExportDocument};
use fepbr_core::graph::{ImageRef, Node, NodeId, ShadingGraph, SocketType};
use fepbr_core::patch::decode_uri;
use fepbr_core::scene::{
    Bounds, InstanceId, Material, MaterialSlot, MeshData, MeshDataId, MeshInstance, ObjectKind,
    Scene,
};
use fepbr_shared::constants::GLTF_OUTPUT_GROUP_MARKER;
use fepbr_shared::fs::{MAX_DOCUMENT_BYTES, read_file_with_limit};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_JSON_CHUNK: u32 = 0x4E4F_534A;

/// The JSON part of a `.gltf` or `.glb` file
pub fn read_document(path: &Path) -> Result<ExportDocument> {
    let bytes = read_file_with_limit(path, MAX_DOCUMENT_BYTES)?;
    let json = if bytes.starts_with(GLB_MAGIC) {
        glb_json_chunk(&bytes).with_context(|| format!("Invalid GLB container: {}", path.display()))?
    } else {
        &bytes[..]
    };
    ExportDocument::parse(json).with_context(|| format!("Failed to parse {}", path.display()))
}

fn glb_json_chunk(bytes: &[u8]) -> Result<&[u8]> {
    let word = |offset: usize| -> Result<u32> {
        let raw = bytes
            .get(offset..offset + 4)
            .context("truncated header")?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    };
    let length = word(12)? as usize;
    if word(16)? != GLB_JSON_CHUNK {
        bail!("first chunk is not JSON");
    }
    bytes.get(20..20 + length).context("truncated JSON chunk")
}

/// Add the objects of the document at `path` to `scene`.
pub fn import_into(scene: &mut Scene, path: &Path) -> Result<Vec<InstanceId>> {
    let document = read_document(path)?;
    document.validate()?;
    let base_dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

    let materials = document
        .materials
        .iter()
        .enumerate()
        .map(|(index, material)| {
            let name = material
                .name
                .clone()
                .unwrap_or_else(|| format!("Material.{index:03}"));
            let graph = material_graph(&document, material, &base_dir)?;
            Ok(Material::new(name, graph))
        })
        .collect::<Result<Vec<_>>>()?;

    let meshes = document.rest.get("meshes").and_then(Value::as_array);
    let Some(meshes) = meshes.filter(|m| !m.is_empty()) else {
        bail!("{} contains no meshes", path.display());
    };

    let mesh_ids: Vec<MeshDataId> = meshes
        .iter()
        .enumerate()
        .map(|(index, mesh)| {
            scene.add_mesh(MeshData {
                id: MeshDataId(0),
                name: mesh["name"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Mesh.{index:03}")),
                library: None,
                bounds: mesh_bounds(&document, mesh),
            })
        })
        .collect();

    let placements: Vec<(String, usize, Mat4)> = match document.rest.get("nodes").and_then(Value::as_array) {
        Some(nodes) => nodes
            .iter()
            .filter_map(|node| {
                let mesh = node["mesh"].as_u64()? as usize;
                let name = node["name"].as_str().unwrap_or("Object").to_string();
                Some((name, mesh, node_matrix(node)))
            })
            .collect(),
        None => (0..meshes.len())
            .map(|mesh| (format!("Object.{mesh:03}"), mesh, Mat4::IDENTITY))
            .collect(),
    };

    let mut created = Vec::new();
    for (name, mesh, matrix_local) in placements {
        let Some(&mesh_id) = mesh_ids.get(mesh) else {
            bail!("Node {name} references missing mesh {mesh}");
        };
        let material_slots = primitive_materials(&meshes[mesh])
            .into_iter()
            .map(|index| MaterialSlot {
                material: materials.get(index).cloned(),
            })
            .collect();
        let id = scene.add_instance(MeshInstance {
            id: InstanceId(0),
            name,
            kind: ObjectKind::Mesh,
            mesh: Some(mesh_id),
            library: None,
            matrix_local,
            material_slots,
        });
        created.push(id);
    }

    debug!("{}: {} object(s), {} material(s)", path.display(), created.len(), materials.len());
    Ok(created)
}

/// Distinct material indices of a mesh's primitives, in first-use order
fn primitive_materials(mesh: &Value) -> Vec<usize> {
    let mut out = Vec::new();
    for primitive in mesh["primitives"].as_array().into_iter().flatten() {
        if let Some(index) = primitive["material"].as_u64().map(|i| i as usize)
            && !out.contains(&index)
        {
            out.push(index);
        }
    }
    out
}

/// Bounds from the POSITION accessors' min/max, unit cube when absent
fn mesh_bounds(document: &ExportDocument, mesh: &Value) -> Bounds {
    let accessors = document.rest.get("accessors").and_then(Value::as_array);
    let vec3 = |value: &Value| -> Option<Vec3> {
        let a = value.as_array()?;
        Some(Vec3::new(
            a.first()?.as_f64()? as f32,
            a.get(1)?.as_f64()? as f32,
            a.get(2)?.as_f64()? as f32,
        ))
    };

    let mut bounds: Option<Bounds> = None;
    for primitive in mesh["primitives"].as_array().into_iter().flatten() {
        let Some(accessor) = primitive["attributes"]["POSITION"]
            .as_u64()
            .and_then(|i| accessors?.get(i as usize))
        else {
            continue;
        };
        let (Some(min), Some(max)) = (vec3(&accessor["min"]), vec3(&accessor["max"])) else {
            continue;
        };
        bounds = Some(match bounds {
            Some(b) => Bounds::new(b.min.min(min), b.max.max(max)),
            None => Bounds::new(min, max),
        });
    }
    bounds.unwrap_or_else(|| Bounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)))
}

fn node_matrix(node: &Value) -> Mat4 {
    let floats = |key: &str| -> Option<Vec<f32>> {
        node[key]
            .as_array()?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    };
    if let Some(m) = floats("matrix").filter(|m| m.len() == 16) {
        return Mat4::from_cols_slice(&m);
    }
    let translation = floats("translation")
        .filter(|t| t.len() == 3)
        .map_or(Vec3::ZERO, |t| Vec3::from_slice(&t));
    let rotation = floats("rotation")
        .filter(|r| r.len() == 4)
        .map_or(Quat::IDENTITY, |r| Quat::from_slice(&r));
    let scale = floats("scale")
        .filter(|s| s.len() == 3)
        .map_or(Vec3::ONE, |s| Vec3::from_slice(&s));
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Standard shading graph for one glTF material
fn material_graph(document: &ExportDocument, material: &document::Material, base_dir: &Path) -> Result<ShadingGraph> {
    let mut graph = ShadingGraph::new();
    let shader = graph.add_node(Node::standard_shading("Principled BSDF"));
    let output = graph.add_node(Node::material_output("Material Output").at(Vec2::new(300.0, 0.0)));
    graph.connect(shader, "BSDF", output, "Surface")?;

    let image = |graph: &mut ShadingGraph, label: &str, index: u32, row: f32| -> Option<NodeId> {
        let image = texture_image(document, index, base_dir)?;
        Some(graph.add_node(Node::image_source(label, Some(image)).at(Vec2::new(-600.0, row))))
    };

    let pbr = material.pbr_metallic_roughness.as_ref();
    if let Some(info) = pbr.and_then(|p| p.base_color_texture.as_ref())
        && let Some(node) = image(&mut graph, "Base Color", info.index, 0.0)
    {
        graph.connect(node, "Color", shader, "Base Color")?;
        graph.connect(node, "Alpha", shader, "Alpha")?;
    }
    if let Some(info) = pbr.and_then(|p| p.metallic_roughness_texture.as_ref())
        && let Some(node) = image(&mut graph, "Metallic Roughness", info.index, -300.0)
    {
        graph.connect(node, "Color", shader, "Metallic")?;
        graph.connect(node, "Color", shader, "Roughness")?;
    }
    if let Some(info) = material.normal_texture.as_ref()
        && let Some(node) = image(&mut graph, "Normal", info.index, -600.0)
    {
        let decoder = graph.add_node(Node::normal_decoder("Normal Map").at(Vec2::new(-300.0, -600.0)));
        graph.connect(node, "Color", decoder, "Color")?;
        graph.connect(decoder, "Normal", shader, "Normal")?;
    }
    if let Some(info) = material.emissive_texture.as_ref()
        && let Some(node) = image(&mut graph, "Emission", info.index, -900.0)
    {
        graph.connect(node, "Color", shader, "Emission Color")?;
    }
    if let Some(info) = material.occlusion_texture.as_ref()
        && let Some(node) = image(&mut graph, "Occlusion", info.index, -1200.0)
    {
        let side = graph.add_node(
            Node::group(GLTF_OUTPUT_GROUP_MARKER, GLTF_OUTPUT_GROUP_MARKER)
                .with_input("Occlusion", SocketType::Color)
                .at(Vec2::new(0.0, -1200.0)),
        );
        graph.connect(node, "Color", side, "Occlusion")?;
    }

    Ok(graph)
}

/// Image datablock for a texture; embedded images keep only their name
fn texture_image(document: &ExportDocument, texture: u32, base_dir: &Path) -> Option<ImageRef> {
    let source = document.textures.get(texture as usize)?.image_sources().into_iter().next()?;
    let image = document.images.get(source as usize)?;
    let filepath: Option<PathBuf> = image.file_uri().map(|uri| base_dir.join(decode_uri(uri)));
    let name = image
        .name
        .clone()
        .or_else(|| {
            filepath
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| format!("Image.{source:03}"));
    Some(ImageRef::new(name, filepath))
}
