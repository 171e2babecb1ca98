//! Manifest written at the end of an export job, and the mesh listing report.

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub instances: Vec<InstanceRecord>,
}

/// One exported (or referenced) mesh instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub name: String,
    pub mesh_data_name: String,
    pub is_linked: bool,
    /// Document path relative to the destination root, forward slashes.
    pub asset_path: String,
    pub location: Vec3Record,
    pub rotation: QuatRecord,
    pub scale: Vec3Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3Record {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuatRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<Vec3> for Vec3Record {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Quat> for QuatRecord {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl SceneManifest {
    /// Parse a manifest from JSON
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse manifest JSON")
    }

    /// Write the manifest as indented JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        crate::fs::write_json_pretty(path, self)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }
}

/// Mesh-object names found in a scene, for external tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshListing {
    pub scene_file: String,
    pub meshes: Vec<String>,
    pub count: usize,
}

impl MeshListing {
    pub fn new(scene_file: impl Into<String>, meshes: Vec<String>) -> Self {
        let count = meshes.len();
        Self {
            scene_file: scene_file.into(),
            meshes,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_names() {
        let record = InstanceRecord {
            name: "Rock.001".to_string(),
            mesh_data_name: "Rock".to_string(),
            is_linked: true,
            asset_path: "props/Rock.gltf".to_string(),
            location: Vec3::new(1.0, 2.0, 3.0).into(),
            rotation: Quat::IDENTITY.into(),
            scale: Vec3::ONE.into(),
        };
        let manifest = SceneManifest {
            instances: vec![record],
        };

        let value = serde_json::to_value(&manifest).unwrap();
        let entry = &value["instances"][0];
        assert_eq!(entry["meshDataName"], "Rock");
        assert_eq!(entry["isLinked"], true);
        assert_eq!(entry["assetPath"], "props/Rock.gltf");
        assert_eq!(entry["location"]["z"], 3.0);
        assert_eq!(entry["rotation"]["w"], 1.0);

        let text = serde_json::to_string(&manifest).unwrap();
        assert_eq!(SceneManifest::parse(&text).unwrap(), manifest);
    }

    #[test]
    fn test_listing_count() {
        let listing = MeshListing::new("level.json", vec!["A".into(), "B".into()]);
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["sceneFile"], "level.json");
    }
}
