//! End-to-end tests of the `fepbr` binary on scene files.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::tempdir;

use fepbr_core::graph::{ImageRef, Node, ShadingGraph};
use fepbr_core::scene::{
    InstanceId, Library, LibraryId, Material, MaterialSlot, MeshData, MeshDataId, MeshInstance,
    ObjectKind, Scene, Selection,
};
use fepbr_shared::{MeshListing, SceneManifest};

fn fepbr(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fepbr"))
        .args(args)
        .output()
        .expect("Failed to run fepbr")
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"png").unwrap();
}

fn albedo_graph(image: &Path) -> ShadingGraph {
    let mut graph = ShadingGraph::new();
    let shader = graph.add_node(Node::standard_shading("Principled BSDF"));
    let output = graph.add_node(Node::material_output("Material Output"));
    let name = image.file_name().unwrap().to_string_lossy().into_owned();
    let texture = graph.add_node(Node::image_source(
        "Albedo",
        Some(ImageRef::new(name, Some(image.to_path_buf()))),
    ));
    graph.connect(shader, "BSDF", output, "Surface").unwrap();
    graph.connect(texture, "Color", shader, "Base Color").unwrap();
    graph
}

/// Scene with a local rock, two instances of a linked crate and a lamp,
/// everything selected
fn write_scene(root: &Path) -> PathBuf {
    let rock_png = root.join("sources/rock/rock_albedo.png");
    let crate_png = root.join("sources/props/crate_albedo.png");
    touch(&rock_png);
    touch(&crate_png);

    let object = |id: u32, name: &str, mesh: Option<u32>, graph: Option<ShadingGraph>| MeshInstance {
        id: InstanceId(id),
        name: name.to_string(),
        kind: if mesh.is_some() { ObjectKind::Mesh } else { ObjectKind::Light },
        mesh: mesh.map(MeshDataId),
        library: None,
        matrix_local: glam::Mat4::from_translation(glam::Vec3::new(id as f32, 0.0, 0.0)),
        material_slots: graph
            .map(|g| MaterialSlot {
                material: Some(Material::new("Mat", g)),
            })
            .into_iter()
            .collect(),
    };

    let scene = Scene {
        file_path: None,
        libraries: vec![Library {
            id: LibraryId(0),
            filepath: "//../sources/props/props.blend".into(),
        }],
        meshes: vec![
            MeshData {
                id: MeshDataId(0),
                name: "Rock".into(),
                library: None,
                bounds: Default::default(),
            },
            MeshData {
                id: MeshDataId(1),
                name: "Crate".into(),
                library: Some(LibraryId(0)),
                bounds: Default::default(),
            },
        ],
        objects: vec![
            object(0, "Rock", Some(0), Some(albedo_graph(&rock_png))),
            object(1, "Crate.001", Some(1), Some(albedo_graph(&crate_png))),
            object(2, "Crate.002", Some(1), Some(albedo_graph(&crate_png))),
            object(3, "Lamp", None, None),
        ],
        selection: Selection {
            selected: (0..4).map(InstanceId).collect(),
            active: Some(InstanceId(0)),
        },
    };

    let path = root.join("scene/level.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    scene.save(&path).unwrap();
    path
}

fn write_config(root: &Path) -> PathBuf {
    let path = root.join("export.toml");
    std::fs::write(
        &path,
        "[paths]\nasset_source = \"sources\"\nasset_destination = \"out/assets\"\nscene_destination = \"out/scene\"\n",
    )
    .unwrap();
    path
}

#[test]
fn test_cli_export_writes_documents_and_manifest() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let scene = write_scene(root);
    let config = write_config(root);

    let output = fepbr(&[
        "export",
        scene.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "fepbr export failed: {}", String::from_utf8_lossy(&output.stderr));

    assert!(root.join("out/scene/Rock.gltf").is_file());
    assert!(root.join("out/assets/props/Crate.gltf").is_file());
    assert!(root.join("out/assets/rock/texture/rock_albedo.png").is_file());
    assert!(root.join("out/assets/props/texture/crate_albedo.png").is_file());

    let manifest = std::fs::read_to_string(root.join("out/scene/selected_meshes.json")).unwrap();
    let manifest = SceneManifest::parse(&manifest).unwrap();
    let rows: Vec<(&str, bool, &str)> = manifest
        .instances
        .iter()
        .map(|r| (r.name.as_str(), r.is_linked, r.asset_path.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Rock", false, "Rock.gltf"),
            ("Crate.001", true, "props/Crate.gltf"),
            ("Crate.002", true, "props/Crate.gltf"),
        ]
    );
    assert_eq!(manifest.instances[2].location.x, 2.0);

    // The scene file itself is left alone.
    let reloaded = Scene::load(&scene).unwrap();
    assert_eq!(reloaded.selection.selected.len(), 4);
}

#[test]
fn test_cli_export_without_destination_fails() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path());
    let config = dir.path().join("export.toml");
    std::fs::write(&config, "[paths]\nasset_source = \"sources\"\n").unwrap();

    let output = fepbr(&["export", scene.to_str().unwrap(), "-c", config.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_cli_list_and_check() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path());
    let listing_path = dir.path().join("meshes.json");

    let output = fepbr(&["list", scene.to_str().unwrap(), "-o", listing_path.to_str().unwrap()]);
    assert!(output.status.success());
    let listing: MeshListing =
        serde_json::from_str(&std::fs::read_to_string(&listing_path).unwrap()).unwrap();
    assert_eq!(listing.count, 3);
    assert_eq!(listing.meshes, vec!["Rock", "Crate.001", "Crate.002"]);
    assert_eq!(listing.scene_file, "level.json");

    let config = write_config(dir.path());
    assert!(fepbr(&["check", config.to_str().unwrap()]).status.success());
    assert!(!fepbr(&["check", dir.path().join("missing.toml").to_str().unwrap()]).status.success());
}

#[test]
fn test_cli_hull_and_arrange_update_scene() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path());

    let output = fepbr(&["hull", scene.to_str().unwrap(), "-o", "Rock", "--ratio", "0.5"]);
    assert!(output.status.success());
    let updated = Scene::load(&scene).unwrap();
    let hull = updated.objects.iter().find(|o| o.name == "Rock_UCX").unwrap();
    assert_eq!(updated.selection, Selection::only(hull.id));
    assert_eq!(updated.mesh_of(hull).unwrap().name, "Rock_UCX");

    let output = fepbr(&["arrange", scene.to_str().unwrap(), "--spacing", "1", "-o", "Rock", "-o", "Crate.001"]);
    assert!(output.status.success());
    let arranged = Scene::load(&scene).unwrap();
    let crate_box = arranged.objects.iter().find(|o| o.name == "Crate.001").unwrap();
    assert_eq!(crate_box.location().y, 0.0);

    let output = fepbr(&["arrange", scene.to_str().unwrap(), "--spacing", "500"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_import_gltf_with_template() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let scene = write_scene(root);
    touch(&root.join("incoming/barrel.png"));
    let gltf = root.join("incoming/barrel.gltf");
    std::fs::write(
        &gltf,
        r#"{
            "asset": {"version": "2.0"},
            "images": [{"uri": "barrel.png"}],
            "textures": [{"source": 0}],
            "materials": [{"name": "Metal", "pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
            "meshes": [{"name": "Barrel", "primitives": [{"attributes": {}, "material": 0}]}],
            "nodes": [{"name": "Barrel", "mesh": 0}]
        }"#,
    )
    .unwrap();
    let template = root.join("template.json");
    std::fs::write(
        &template,
        r#"{"name": "FePBR_Template", "graph": {"nodes": [{
            "id": 0, "name": "FePBR", "kind": {"type": "parameter_group", "tree": "FePBR_v2"},
            "inputs": [{"name": "Albedo Map", "type": "color"}, {"name": "Alpha Map", "type": "float"}],
            "outputs": [{"name": "BSDF", "type": "shader"}]
        }], "links": []}}"#,
    )
    .unwrap();

    let output = fepbr(&[
        "import",
        scene.to_str().unwrap(),
        gltf.to_str().unwrap(),
        "--template",
        template.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "fepbr import failed: {}", String::from_utf8_lossy(&output.stderr));

    let updated = Scene::load(&scene).unwrap();
    let barrel = updated.objects.iter().find(|o| o.name == "Barrel").unwrap();
    let material = barrel.materials().next().unwrap();
    assert_eq!(material.name, "Metal_FePBR");
    let graph = material.graph.as_ref().unwrap();
    assert!(graph.nodes().iter().any(|n| n.is_group_containing("FePBR")));
    assert!(!graph.nodes().iter().any(|n| n.is_standard_shading()));
}
