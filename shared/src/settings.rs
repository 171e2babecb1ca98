//! export.toml parsing
//!
//! ```toml
//! [paths]
//! asset_source = "../sources"
//! asset_destination = "build/assets"
//! scene_destination = "build/scene"
//!
//! # Optional: every channel defaults to true
//! [channels]
//! normal = false
//!
//! # Optional
//! [manifest]
//! file_name = "selected_meshes.json"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_MANIFEST_FILE;
use crate::ids::is_safe_file_stem;

/// Export settings, usually read from `export.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub channels: ChannelFlags,
    #[serde(default)]
    pub manifest: ManifestSection,
}

/// Source and destination roots.
///
/// Empty strings are treated the same as a missing entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// Where the original source files (FBX/glTF and their images) live.
    #[serde(default)]
    pub asset_source: Option<PathBuf>,
    /// Root for exported documents of linked meshes and for relocated images.
    #[serde(default)]
    pub asset_destination: Option<PathBuf>,
    /// Root for exported documents of local meshes and for the manifest.
    #[serde(default)]
    pub scene_destination: Option<PathBuf>,
}

/// The seven user-selectable channel flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelFlags {
    pub albedo: bool,
    pub metallic: bool,
    pub roughness: bool,
    pub normal: bool,
    pub emission: bool,
    pub alpha: bool,
    pub ao: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl ChannelFlags {
    /// Every channel enabled.
    pub const fn all() -> Self {
        Self {
            albedo: true,
            metallic: true,
            roughness: true,
            normal: true,
            emission: true,
            alpha: true,
            ao: true,
        }
    }
}

/// Manifest output section
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSection {
    #[serde(default = "default_manifest_file")]
    pub file_name: String,
}

impl Default for ManifestSection {
    fn default() -> Self {
        Self {
            file_name: default_manifest_file(),
        }
    }
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

/// Configuration errors. An export job refuses to start on any of these.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("No destination path is set (need asset_destination or scene_destination)")]
    NoDestination,

    #[error("Invalid manifest file name: {0:?}")]
    InvalidManifestName(String),
}

impl ExportSettings {
    /// Load settings from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = Self::parse(&content)?;

        // Relative roots are relative to the settings file, not the cwd.
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(settings.with_base_dir(base_dir))
    }

    /// Parse settings from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse export.toml")
    }

    /// Join every relative root onto `base_dir`.
    pub fn with_base_dir(mut self, base_dir: &Path) -> Self {
        for slot in [
            &mut self.paths.asset_source,
            &mut self.paths.asset_destination,
            &mut self.paths.scene_destination,
        ] {
            if let Some(path) = slot.as_mut()
                && !path.as_os_str().is_empty()
                && path.is_relative()
            {
                *path = base_dir.join(&*path);
            }
        }
        self
    }

    /// Validate settings fields
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.asset_destination().is_none() && self.scene_destination().is_none() {
            return Err(SettingsError::NoDestination);
        }

        let name = &self.manifest.file_name;
        if !is_safe_file_stem(name) || !name.ends_with(".json") {
            return Err(SettingsError::InvalidManifestName(name.clone()));
        }

        Ok(())
    }

    pub fn asset_source(&self) -> Option<&Path> {
        non_empty(&self.paths.asset_source)
    }

    pub fn asset_destination(&self) -> Option<&Path> {
        non_empty(&self.paths.asset_destination)
    }

    pub fn scene_destination(&self) -> Option<&Path> {
        non_empty(&self.paths.scene_destination)
    }

    /// Root for relocated images: the asset destination when set, the scene
    /// destination otherwise.
    pub fn texture_root(&self) -> Option<&Path> {
        self.asset_destination().or_else(|| self.scene_destination())
    }

    /// Directory receiving the manifest: the scene destination when set,
    /// the asset destination otherwise.
    pub fn manifest_dir(&self) -> Option<&Path> {
        self.scene_destination().or_else(|| self.asset_destination())
    }

    /// Full path of the manifest file, if any destination is configured.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.manifest_dir()
            .map(|dir| dir.join(&self.manifest.file_name))
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}
