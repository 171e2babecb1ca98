//! Shared test utilities for integration and unit tests

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use glam::Vec3;
use hashbrown::HashSet;

use fepbr_shared::ExportSettings;

use crate::draft::write_draft;
use crate::graph::{ImageRef, Node, ShadingGraph, SocketType};
use crate::host::{DraftOptions, ExportHost, GeometryHost, ImportHost, ReportLevel, SceneHost};
use crate::hull::HullParams;
use crate::scene::{
    Bounds, Library, LibraryId, Material, MaterialSlot, MeshData, MeshDataId, MeshInstance,
    ObjectKind, Scene, Selection, InstanceId,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Write a small fake image file at `root/relative` and return its path
pub fn image_file(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, relative.as_bytes()).unwrap();
    path
}

/// Parameter-group template with every input the rewriter maps to
pub fn fepbr_template() -> ShadingGraph {
    let mut graph = ShadingGraph::new();
    graph.add_node(
        Node::group("FePBR", "FePBR_v2")
            .with_input("Albedo Map", SocketType::Color)
            .with_input("Alpha Map", SocketType::Float)
            .with_input("Metallic", SocketType::Float)
            .with_input("Roughness", SocketType::Float)
            .with_input("Normal Map", SocketType::Color)
            .with_input("Emission", SocketType::Color)
            .with_input("AO", SocketType::Color)
            .with_output("BSDF", SocketType::Shader),
    );
    graph
}

/// Standard shading graph with an optional albedo image (also feeding
/// alpha) and an optional normal image behind a decoder
pub fn pbr_graph(albedo: Option<&Path>, normal: Option<&Path>) -> ShadingGraph {
    let mut graph = ShadingGraph::new();
    let shader = graph.add_node(Node::standard_shading("Principled BSDF"));
    let output = graph.add_node(Node::material_output("Material Output"));
    graph.connect(shader, "BSDF", output, "Surface").unwrap();

    if let Some(path) = albedo {
        let image = graph.add_node(Node::image_source("Albedo", Some(image_ref(path))));
        graph.connect(image, "Color", shader, "Base Color").unwrap();
        graph.connect(image, "Alpha", shader, "Alpha").unwrap();
    }
    if let Some(path) = normal {
        let image = graph.add_node(Node::image_source("Normal", Some(image_ref(path))));
        let decoder = graph.add_node(Node::normal_decoder("Normal Map"));
        graph.connect(image, "Color", decoder, "Color").unwrap();
        graph.connect(decoder, "Normal", shader, "Normal").unwrap();
    }
    graph
}

fn image_ref(path: &Path) -> ImageRef {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ImageRef::new(name, Some(path.to_path_buf()))
}

/// Builds scenes whose file lives at `<root>/scene/level.json`
pub struct SceneBuilder {
    scene: Scene,
}

impl SceneBuilder {
    pub fn new(root: &Path) -> Self {
        Self {
            scene: Scene {
                file_path: Some(root.join("scene/level.json")),
                ..Default::default()
            },
        }
    }

    pub fn library(&mut self, filepath: &Path) -> LibraryId {
        let id = LibraryId(self.scene.libraries.len() as u32);
        self.scene.libraries.push(Library {
            id,
            filepath: filepath.to_path_buf(),
        });
        id
    }

    pub fn mesh(&mut self, name: &str, library: Option<LibraryId>) -> MeshDataId {
        self.scene.add_mesh(MeshData {
            id: MeshDataId(0),
            name: name.to_string(),
            library,
            bounds: Bounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        })
    }

    /// Add a selected instance of `mesh`, linked when the mesh is.
    /// `slots` holds one (material name, albedo image, normal image) per slot.
    pub fn instance<P: AsRef<Path>>(
        &mut self,
        name: &str,
        mesh: MeshDataId,
        slots: &[(&str, Option<P>, Option<P>)],
    ) -> InstanceId {
        let library = self.scene.mesh(mesh).and_then(|m| m.library);
        let material_slots = slots
            .iter()
            .map(|(material, albedo, normal)| MaterialSlot {
                material: Some(Material::new(
                    *material,
                    pbr_graph(
                        albedo.as_ref().map(AsRef::as_ref),
                        normal.as_ref().map(AsRef::as_ref),
                    ),
                )),
            })
            .collect();
        let id = self.scene.add_instance(MeshInstance {
            id: InstanceId(0),
            name: name.to_string(),
            kind: ObjectKind::Mesh,
            mesh: Some(mesh),
            library,
            matrix_local: Default::default(),
            material_slots,
        });
        self.scene.selection.selected.push(id);
        self.scene.selection.active.get_or_insert(id);
        id
    }

    pub fn build(self) -> Scene {
        self.scene
    }
}

/// Settings with all three roots below `root`
pub fn settings_in(root: &Path) -> ExportSettings {
    let toml = format!(
        "[paths]\nasset_source = {:?}\nasset_destination = {:?}\nscene_destination = {:?}\n",
        root.join("sources"),
        root.join("out/assets"),
        root.join("out/scene"),
    );
    ExportSettings::parse(&toml).unwrap()
}

// ============================================================================
// Test Host Implementation
// ============================================================================

/// Host recording every call; drafts go through the reference draft writer
#[derive(Default)]
pub struct MockHost {
    pub scene: Scene,
    pub reports: Vec<(ReportLevel, String)>,
    pub progress: Vec<(usize, usize)>,
    /// Instance passed to each `export_draft` call, in order
    pub drafts: Vec<InstanceId>,
    /// Selection seen by each `export_draft` call
    pub draft_selections: Vec<Selection>,
    pub fail_draft_for: HashSet<InstanceId>,
    /// Files `import_document` / `import_mesh` accept, with the material
    /// slots the new object gets
    pub importable: Vec<(PathBuf, Vec<(String, ShadingGraph)>)>,
    pub geometry_calls: Vec<String>,
}

impl MockHost {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            ..Default::default()
        }
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|(level, _)| *level >= ReportLevel::Warning)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    fn import(&mut self, path: &Path) -> Result<Vec<InstanceId>> {
        let Some((_, slots)) = self.importable.iter().find(|(p, _)| p == path) else {
            bail!("cannot read {}", path.display());
        };
        let slots = slots.clone();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mesh = self.scene.add_mesh(MeshData {
            id: MeshDataId(0),
            name: name.clone(),
            library: None,
            bounds: Bounds::default(),
        });
        let id = self.scene.add_instance(MeshInstance {
            id: InstanceId(0),
            name,
            kind: ObjectKind::Mesh,
            mesh: Some(mesh),
            library: None,
            matrix_local: Default::default(),
            material_slots: slots
                .into_iter()
                .map(|(material, graph)| MaterialSlot {
                    material: Some(Material::new(material, graph)),
                })
                .collect(),
        });
        Ok(vec![id])
    }
}

impl SceneHost for MockHost {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn set_selection(&mut self, selection: Selection) {
        self.scene.selection = selection;
    }

    fn report(&mut self, level: ReportLevel, message: &str) {
        self.reports.push((level, message.to_string()));
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.progress.push((done, total));
    }
}

impl ExportHost for MockHost {
    fn export_draft(&mut self, instance: InstanceId, path: &Path, options: &DraftOptions) -> Result<()> {
        self.drafts.push(instance);
        self.draft_selections.push(self.scene.selection.clone());
        if self.fail_draft_for.contains(&instance) {
            bail!("exporter crashed");
        }
        write_draft(&self.scene, instance, path, options)?;
        Ok(())
    }
}

impl ImportHost for MockHost {
    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn import_document(&mut self, path: &Path) -> Result<Vec<InstanceId>> {
        self.import(path)
    }

    fn import_mesh(&mut self, path: &Path) -> Result<Vec<InstanceId>> {
        self.import(path)
    }
}

impl GeometryHost for MockHost {
    fn duplicate_instance(&mut self, instance: InstanceId, suffix: &str) -> Result<InstanceId> {
        self.geometry_calls.push(format!("duplicate {instance}"));
        match self.scene.duplicate_instance(instance, suffix) {
            Some(id) => Ok(id),
            None => bail!("{instance} not found"),
        }
    }

    fn convex_hull(&mut self, instance: InstanceId, _params: &HullParams) -> Result<()> {
        self.geometry_calls.push(format!("hull {instance}"));
        Ok(())
    }

    fn decimate(&mut self, instance: InstanceId, ratio: f32) -> Result<()> {
        self.geometry_calls.push(format!("decimate {instance} {ratio}"));
        Ok(())
    }
}
