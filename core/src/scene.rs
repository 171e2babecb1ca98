//! Scene model
//!
//! A scene is what the host exposes to the engines: mesh instances with
//! their transforms and material slots, the mesh data they share, the
//! libraries they may be linked from, and the current selection.
//!
//! The same structure doubles as the on-disk scene description read by the
//! command line tool (`serde_json`).

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::graph::{GraphError, ShadingGraph};

/// Prefix marking a path relative to the owning document's directory.
pub const RELATIVE_PREFIX: &str = "//";

macro_rules! scene_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

scene_id!(InstanceId, "object#");
scene_id!(MeshDataId, "mesh#");
scene_id!(LibraryId, "library#");

/// Externally linked source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    /// Absolute, or relative to the scene file (`//` prefix optional)
    pub filepath: PathBuf,
}

/// Local-space axis-aligned bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Geometry shared by any number of instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub id: MeshDataId,
    pub name: String,
    #[serde(default)]
    pub library: Option<LibraryId>,
    #[serde(default)]
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Mesh,
    Empty,
    Light,
    Camera,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// `None` for materials that do not use a node graph
    #[serde(default)]
    pub graph: Option<ShadingGraph>,
}

impl Material {
    pub fn new(name: impl Into<String>, graph: ShadingGraph) -> Self {
        Self {
            name: name.into(),
            graph: Some(graph),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSlot {
    #[serde(default)]
    pub material: Option<Material>,
}

/// An object placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInstance {
    pub id: InstanceId,
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    #[serde(default)]
    pub mesh: Option<MeshDataId>,
    #[serde(default)]
    pub library: Option<LibraryId>,
    /// Column-major local transform
    #[serde(default)]
    pub matrix_local: Mat4,
    #[serde(default)]
    pub material_slots: Vec<MaterialSlot>,
}

impl MeshInstance {
    pub fn is_mesh(&self) -> bool {
        self.kind == ObjectKind::Mesh && self.mesh.is_some()
    }

    /// Location, rotation and scale decomposed from the local matrix
    pub fn decompose(&self) -> (Vec3, Quat, Vec3) {
        let (scale, rotation, location) = self.matrix_local.to_scale_rotation_translation();
        (location, rotation, scale)
    }

    pub fn location(&self) -> Vec3 {
        self.matrix_local.w_axis.truncate()
    }

    pub fn set_location(&mut self, location: Vec3) {
        self.matrix_local.w_axis = location.extend(1.0);
    }

    /// Materials present in the slots, in slot order
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.material_slots.iter().filter_map(|s| s.material.as_ref())
    }
}

/// Selected objects and the active one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub selected: Vec<InstanceId>,
    #[serde(default)]
    pub active: Option<InstanceId>,
}

impl Selection {
    /// Exactly one object, selected and active
    pub fn only(id: InstanceId) -> Self {
        Self {
            selected: vec![id],
            active: Some(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    #[error("{object} references missing {target}")]
    DanglingReference { object: String, target: String },

    #[error("Material '{material}' of {object}: {source}")]
    InvalidGraph {
        object: String,
        material: String,
        #[source]
        source: GraphError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Where the scene was loaded from; anchors `//` paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub meshes: Vec<MeshData>,
    #[serde(default)]
    pub objects: Vec<MeshInstance>,
    #[serde(default)]
    pub selection: Selection,
}

impl Scene {
    /// Load a scene description, anchoring relative paths at its location.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fepbr_shared::fs::read_file_with_limit(path, fepbr_shared::fs::MAX_SCENE_BYTES)?;
        let mut scene: Scene = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse scene: {}", path.display()))?;
        if scene.file_path.is_none() {
            scene.file_path = Some(path.to_path_buf());
        }
        scene
            .validate()
            .with_context(|| format!("Invalid scene: {}", path.display()))?;
        Ok(scene)
    }

    /// Write the scene back as indented JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        fepbr_shared::fs::write_json_pretty(path, self)
            .with_context(|| format!("Failed to write scene: {}", path.display()))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&MeshInstance> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut MeshInstance> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn mesh(&self, id: MeshDataId) -> Option<&MeshData> {
        self.meshes.iter().find(|m| m.id == id)
    }

    pub fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.iter().find(|l| l.id == id)
    }

    /// Mesh data of an instance
    pub fn mesh_of(&self, instance: &MeshInstance) -> Option<&MeshData> {
        instance.mesh.and_then(|id| self.mesh(id))
    }

    /// Library an instance comes from, directly or through its mesh data
    pub fn instance_library(&self, instance: &MeshInstance) -> Option<&Library> {
        instance
            .library
            .or_else(|| self.mesh_of(instance).and_then(|m| m.library))
            .and_then(|id| self.library(id))
    }

    /// Directory that `//` paths of the scene itself are relative to
    pub fn base_dir(&self) -> PathBuf {
        self.file_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Absolute path of a library file
    pub fn resolve_library_path(&self, library: &Library) -> PathBuf {
        resolve_against(&library.filepath, &self.base_dir())
    }

    /// Absolute path of a file referenced from `instance`'s data. Relative
    /// paths of linked data resolve against the library's directory.
    pub fn resolve_data_path(&self, instance: &MeshInstance, raw: &Path) -> PathBuf {
        let base = match self.instance_library(instance) {
            Some(library) => self
                .resolve_library_path(library)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            None => self.base_dir(),
        };
        resolve_against(raw, &base)
    }

    /// Names of every mesh object, in scene order
    pub fn mesh_object_names(&self) -> Vec<String> {
        self.objects
            .iter()
            .filter(|o| o.is_mesh())
            .map(|o| o.name.clone())
            .collect()
    }

    /// Selected instances that can be exported, in selection order
    pub fn selected_meshes(&self) -> Vec<InstanceId> {
        self.selection
            .selected
            .iter()
            .copied()
            .filter(|id| self.instance(*id).is_some_and(MeshInstance::is_mesh))
            .collect()
    }

    fn next_instance_id(&self) -> InstanceId {
        InstanceId(self.objects.iter().map(|o| o.id.0 + 1).max().unwrap_or(0))
    }

    fn next_mesh_id(&self) -> MeshDataId {
        MeshDataId(self.meshes.iter().map(|m| m.id.0 + 1).max().unwrap_or(0))
    }

    /// Add mesh data, assigning a fresh id.
    pub fn add_mesh(&mut self, mut mesh: MeshData) -> MeshDataId {
        let id = self.next_mesh_id();
        mesh.id = id;
        self.meshes.push(mesh);
        id
    }

    /// Add an instance, assigning a fresh id.
    pub fn add_instance(&mut self, mut instance: MeshInstance) -> InstanceId {
        let id = self.next_instance_id();
        instance.id = id;
        self.objects.push(instance);
        id
    }

    /// Copy an instance and its mesh data, appending `suffix` to both names.
    /// The copy is local even when the original was linked.
    pub fn duplicate_instance(&mut self, id: InstanceId, suffix: &str) -> Option<InstanceId> {
        let mut copy = self.instance(id)?.clone();
        copy.name = format!("{}{suffix}", copy.name);
        copy.library = None;

        if let Some(mesh) = self.mesh_of(&copy).cloned() {
            let new_mesh = self.add_mesh(MeshData {
                name: format!("{}{suffix}", mesh.name),
                library: None,
                ..mesh
            });
            copy.mesh = Some(new_mesh);
        }

        Some(self.add_instance(copy))
    }

    /// Check id uniqueness, references and every material graph.
    pub fn validate(&self) -> Result<(), SceneError> {
        fn unique<I: Iterator<Item = u32>>(kind: &'static str, ids: I) -> Result<(), SceneError> {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(SceneError::DuplicateId { kind, id });
                }
            }
            Ok(())
        }
        unique("object", self.objects.iter().map(|o| o.id.0))?;
        unique("mesh", self.meshes.iter().map(|m| m.id.0))?;
        unique("library", self.libraries.iter().map(|l| l.id.0))?;

        let dangling = |object: &str, target: String| SceneError::DanglingReference {
            object: object.to_string(),
            target,
        };

        for mesh in &self.meshes {
            if let Some(lib) = mesh.library
                && self.library(lib).is_none()
            {
                return Err(dangling(&mesh.name, lib.to_string()));
            }
        }

        for object in &self.objects {
            if let Some(mesh) = object.mesh
                && self.mesh(mesh).is_none()
            {
                return Err(dangling(&object.name, mesh.to_string()));
            }
            if let Some(lib) = object.library
                && self.library(lib).is_none()
            {
                return Err(dangling(&object.name, lib.to_string()));
            }
            for material in object.materials() {
                if let Some(graph) = &material.graph {
                    graph.validate().map_err(|source| SceneError::InvalidGraph {
                        object: object.name.clone(),
                        material: material.name.clone(),
                        source,
                    })?;
                }
            }
        }

        for id in self.selection.selected.iter().chain(&self.selection.active) {
            if self.instance(*id).is_none() {
                return Err(dangling("selection", id.to_string()));
            }
        }

        Ok(())
    }
}

/// Resolve `raw` against `base`, stripping a leading `//`.
pub fn resolve_against(raw: &Path, base: &Path) -> PathBuf {
    let text = raw.to_string_lossy();
    match text.strip_prefix(RELATIVE_PREFIX) {
        Some(rest) => base.join(rest),
        None if raw.is_absolute() => raw.to_path_buf(),
        None => base.join(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rocks() -> Scene {
        let json = r#"{
            "file_path": "/work/level/level.json",
            "libraries": [{"id": 0, "filepath": "//../props/rocks.blend"}],
            "meshes": [
                {"id": 0, "name": "Rock", "library": 0,
                 "bounds": {"min": [-1, -1, 0], "max": [1, 1, 2]}},
                {"id": 1, "name": "Crate"}
            ],
            "objects": [
                {"id": 0, "name": "Rock.001", "mesh": 0},
                {"id": 1, "name": "Crate", "mesh": 1},
                {"id": 2, "name": "Sun", "kind": "light"}
            ],
            "selection": {"selected": [0, 1, 2], "active": 1}
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_library_lookup_through_mesh_data() {
        let scene = two_rocks();
        let rock = scene.instance(InstanceId(0)).unwrap();
        let crate_ = scene.instance(InstanceId(1)).unwrap();

        let lib = scene.instance_library(rock).unwrap();
        assert_eq!(
            scene.resolve_library_path(lib),
            PathBuf::from("/work/level/../props/rocks.blend")
        );
        assert!(scene.instance_library(crate_).is_none());
    }

    #[test]
    fn test_data_paths_follow_the_library() {
        let scene = two_rocks();
        let rock = scene.instance(InstanceId(0)).unwrap();
        let crate_ = scene.instance(InstanceId(1)).unwrap();

        assert_eq!(
            scene.resolve_data_path(rock, Path::new("//tex/rock.png")),
            PathBuf::from("/work/level/../props/tex/rock.png")
        );
        assert_eq!(
            scene.resolve_data_path(crate_, Path::new("//tex/crate.png")),
            PathBuf::from("/work/level/tex/crate.png")
        );
        assert_eq!(
            scene.resolve_data_path(crate_, Path::new("/abs/crate.png")),
            PathBuf::from("/abs/crate.png")
        );
    }

    #[test]
    fn test_selected_meshes_skip_other_kinds() {
        let scene = two_rocks();
        assert_eq!(scene.selected_meshes(), vec![InstanceId(0), InstanceId(1)]);
        assert_eq!(scene.mesh_object_names(), vec!["Rock.001", "Crate"]);
    }

    #[test]
    fn test_decompose_matrix() {
        let mut scene = two_rocks();
        let rock = scene.instance_mut(InstanceId(0)).unwrap();
        rock.matrix_local = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 2.0, 3.0),
        );

        let (location, rotation, scale) = rock.decompose();
        assert!(location.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-5));
        assert!(scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
        assert!(rotation.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), 1e-5));

        rock.set_location(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(rock.location(), Vec3::new(5.0, 0.0, 0.0));
        assert!(rock.decompose().2.abs_diff_eq(Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn test_duplicate_instance_copies_mesh_data() {
        let mut scene = two_rocks();
        let copy = scene.duplicate_instance(InstanceId(0), "_UCX").unwrap();

        let dup = scene.instance(copy).unwrap();
        assert_eq!(dup.name, "Rock.001_UCX");
        let mesh = scene.mesh_of(dup).unwrap();
        assert_eq!(mesh.name, "Rock_UCX");
        assert_ne!(mesh.id, MeshDataId(0));
        assert!(scene.instance_library(dup).is_none());
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_mesh() {
        let mut scene = two_rocks();
        scene.objects[1].mesh = Some(MeshDataId(42));
        assert!(matches!(
            scene.validate(),
            Err(SceneError::DanglingReference { .. })
        ));

        let mut scene = two_rocks();
        scene.objects[1].id = InstanceId(0);
        assert!(matches!(
            scene.validate(),
            Err(SceneError::DuplicateId { kind: "object", id: 0 })
        ));
    }

    #[test]
    fn test_load_sets_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut scene = two_rocks();
        scene.file_path = None;
        scene.save(&path).unwrap();

        let loaded = Scene::load(&path).unwrap();
        assert_eq!(loaded.file_path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.objects.len(), 3);
    }
}
