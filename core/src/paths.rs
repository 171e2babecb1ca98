//! Path resolution and export layout
//!
//! Every path the exporter compares or writes goes through
//! [`canonicalize_lenient`] first, so symlinks and `..` segments never
//! produce two spellings of the same file.

use std::path::{Component, Path, PathBuf};

use fepbr_shared::ExportSettings;
use fepbr_shared::constants::DOCUMENT_EXT;
use fepbr_shared::ids::sanitize_file_stem;

use crate::scene::{MeshInstance, Scene};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("No asset or scene destination is configured")]
    NoDestination,

    #[error("{0} has no mesh data")]
    NoMeshData(String),
}

/// Absolute, symlink-free form of `path`.
///
/// `.` and `..` segments are folded lexically first. Paths that do not exist
/// yet are handled by canonicalizing their deepest existing ancestor and
/// appending the remaining components.
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let absolute = normalize_lexically(&absolute);

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    let mut out = loop {
        if let Ok(canonical) = existing.canonicalize() {
            break canonical;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => break existing.to_path_buf(),
        }
    };

    for name in tail.iter().rev() {
        out.push(name);
    }
    out
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Result of [`resolve_relative`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelativePath {
    /// Path from the base to the target
    Relative(PathBuf),
    /// The paths share no root; the canonical target instead
    Absolute(PathBuf),
}

impl RelativePath {
    pub fn as_path(&self) -> &Path {
        match self {
            RelativePath::Relative(p) | RelativePath::Absolute(p) => p,
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, RelativePath::Relative(_))
    }

    /// True when the relative path climbs out of its base
    pub fn escapes_base(&self) -> bool {
        match self {
            RelativePath::Relative(p) => p.components().next() == Some(Component::ParentDir),
            RelativePath::Absolute(_) => true,
        }
    }

    /// Render with `/` separators on every platform.
    pub fn to_slash_string(&self) -> String {
        to_slash_string(self.as_path())
    }
}

/// Join the components of `path` with `/`.
pub fn to_slash_string(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => out.push('/'),
            Component::CurDir => {}
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// Path of `target` relative to the directory `base`, both canonicalized.
///
/// Falls back to the canonical absolute target when the two live on
/// different roots (drives, UNC shares).
pub fn resolve_relative(target: &Path, base: &Path) -> RelativePath {
    let target = canonicalize_lenient(target);
    let base = canonicalize_lenient(base);

    if root_of(&target) != root_of(&base) {
        return RelativePath::Absolute(target);
    }
    match pathdiff::diff_paths(&target, &base) {
        Some(relative) => RelativePath::Relative(relative),
        None => RelativePath::Absolute(target),
    }
}

fn root_of(path: &Path) -> Option<Component<'_>> {
    path.components()
        .next()
        .filter(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
}

/// Folder name a source directory maps to under a destination root.
///
/// With a hint (the asset source root) this is the directory's path below
/// the hint; a directory outside the hint, or no hint at all, yields its
/// base name. The hint directory itself maps to the empty string.
pub fn source_folder_for_dir(dir: &Path, hint: Option<&Path>) -> String {
    if let Some(hint) = hint {
        let relative = resolve_relative(dir, hint);
        if !relative.escapes_base() {
            let folder = relative.to_slash_string();
            return if folder == "." { String::new() } else { folder };
        }
    }

    canonicalize_lenient(dir)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where an instance's data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFolder {
    /// Authored in the open scene
    Local,
    /// Linked from a library; the folder below the destination root,
    /// empty for the root itself
    Linked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_linked: bool,
    pub source_folder: SourceFolder,
}

/// Decide whether `instance` is local or linked, and from which folder.
pub fn classify(scene: &Scene, instance: &MeshInstance, source_root_hint: Option<&Path>) -> Classification {
    let Some(library) = scene.instance_library(instance) else {
        return Classification {
            is_linked: false,
            source_folder: SourceFolder::Local,
        };
    };

    let library_path = scene.resolve_library_path(library);
    let library_dir = library_path.parent().unwrap_or(Path::new(""));
    Classification {
        is_linked: true,
        source_folder: SourceFolder::Linked(source_folder_for_dir(library_dir, source_root_hint)),
    }
}

/// Output locations of one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    pub classification: Classification,
    pub mesh_data_name: String,
    /// File-safe form of the mesh data name
    pub file_stem: String,
    pub document_dir: PathBuf,
    pub document_path: PathBuf,
    /// Manifest path of the document relative to its destination root
    pub asset_path: String,
}

impl ExportLayout {
    pub fn compute(
        settings: &ExportSettings,
        scene: &Scene,
        instance: &MeshInstance,
    ) -> Result<Self, PathError> {
        let mesh = scene
            .mesh_of(instance)
            .ok_or_else(|| PathError::NoMeshData(instance.name.clone()))?;
        let classification = classify(scene, instance, settings.asset_source());

        let file_stem = sanitize_file_stem(&mesh.name);
        let file_name = format!("{file_stem}.{DOCUMENT_EXT}");
        let (document_dir, asset_path) = match &classification.source_folder {
            SourceFolder::Local => {
                let root = settings
                    .scene_destination()
                    .or_else(|| settings.asset_destination())
                    .ok_or(PathError::NoDestination)?;
                (root.to_path_buf(), file_name.clone())
            }
            SourceFolder::Linked(folder) => {
                let root = settings
                    .asset_destination()
                    .or_else(|| settings.scene_destination())
                    .ok_or(PathError::NoDestination)?;
                if folder.is_empty() {
                    (root.to_path_buf(), file_name.clone())
                } else {
                    (root.join(folder), format!("{folder}/{file_name}"))
                }
            }
        };

        let document_path = document_dir.join(&file_name);
        Ok(Self {
            classification,
            mesh_data_name: mesh.name.clone(),
            file_stem,
            document_dir,
            document_path,
            asset_path,
        })
    }

    pub fn is_linked(&self) -> bool {
        self.classification.is_linked
    }
}
