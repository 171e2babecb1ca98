//! Per-instance asset metadata
//!
//! Every image referenced by an instance's materials gets one entry, keyed
//! by its resolved absolute source path (or its name when it has no file).
//! Two image nodes pointing at the same file therefore share an entry, and
//! later share one relocated copy.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use fepbr_shared::ExportSettings;
use fepbr_shared::constants::TEXTURE_DIR;

use crate::graph::ImageRef;
use crate::paths::{canonicalize_lenient, resolve_relative, source_folder_for_dir};
use crate::scene::{MeshInstance, Scene};

/// Stable identity of an image across materials and documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageKey {
    Path(PathBuf),
    Name(String),
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageKey::Path(path) => write!(f, "{}", path.display()),
            ImageKey::Name(name) => write!(f, "<{name}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub key: ImageKey,
    pub name: String,
    /// Resolved source file, when it exists on disk
    pub source: Option<PathBuf>,
    /// Shared home of the image under the texture root
    pub destination: Option<PathBuf>,
    /// `destination` relative to the document directory, `/` separated
    pub relative_uri: Option<String>,
}

impl AssetMetadata {
    /// Source, destination and URI are all known
    pub fn relocation(&self) -> Option<(&Path, &Path, &str)> {
        match (&self.source, &self.destination, &self.relative_uri) {
            (Some(source), Some(destination), Some(uri)) => Some((source, destination, uri)),
            _ => None,
        }
    }
}

/// Asset metadata of one instance, in first-encounter order
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    entries: Vec<AssetMetadata>,
    by_key: HashMap<ImageKey, usize>,
    by_ref: HashMap<ImageRef, ImageKey>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetMetadata> {
        self.entries.iter()
    }

    pub fn get(&self, key: &ImageKey) -> Option<&AssetMetadata> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Key an image node's reference was filed under
    pub fn key_of(&self, image: &ImageRef) -> Option<&ImageKey> {
        self.by_ref.get(image)
    }

    /// Record `image` under `metadata.key`. Returns `false` when the key was
    /// already known; the first entry is kept.
    pub fn insert(&mut self, image: ImageRef, metadata: AssetMetadata) -> bool {
        let key = metadata.key.clone();
        self.by_ref.insert(image, key.clone());
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(key, self.entries.len());
        self.entries.push(metadata);
        true
    }

    /// Every destination path, for "is this file ours" checks
    pub fn destinations(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| e.destination.as_deref())
    }
}

/// Walk every image node of every material of `instance`.
///
/// `document_dir` is where the instance's document will be written; relative
/// URIs are computed against it.
pub fn collect_assets(
    settings: &ExportSettings,
    scene: &Scene,
    instance: &MeshInstance,
    document_dir: &Path,
) -> AssetMap {
    let mut assets = AssetMap::new();
    let texture_root = settings.texture_root();

    for material in instance.materials() {
        let Some(graph) = &material.graph else {
            continue;
        };
        for (_, image) in graph.image_nodes() {
            if assets.key_of(image).is_some() {
                continue;
            }
            let metadata = describe_image(settings, scene, instance, image, texture_root, document_dir);
            assets.insert(image.clone(), metadata);
        }
    }

    assets
}

fn describe_image(
    settings: &ExportSettings,
    scene: &Scene,
    instance: &MeshInstance,
    image: &ImageRef,
    texture_root: Option<&Path>,
    document_dir: &Path,
) -> AssetMetadata {
    let resolved = image
        .filepath
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|raw| canonicalize_lenient(&scene.resolve_data_path(instance, raw)));

    let key = match &resolved {
        Some(path) => ImageKey::Path(path.clone()),
        None => ImageKey::Name(image.name.clone()),
    };
    let source = resolved.filter(|path| path.is_file());

    let destination = source.as_deref().zip(texture_root).and_then(|(source, root)| {
        let file_name = source.file_name()?;
        let folder = source
            .parent()
            .map(|dir| source_folder_for_dir(dir, settings.asset_source()))
            .unwrap_or_default();
        Some(root.join(folder).join(TEXTURE_DIR).join(file_name))
    });
    let relative_uri = destination
        .as_deref()
        .map(|dst| resolve_relative(dst, document_dir).to_slash_string());

    AssetMetadata {
        key,
        name: image.name.clone(),
        source,
        destination,
        relative_uri,
    }
}
