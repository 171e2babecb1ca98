//! File-backed host
//!
//! Stands in for an interactive editor: the scene is a JSON scene file,
//! drafts come from the reference draft writer, glTF/GLB files are imported
//! by [`crate::gltf_import`], and reports become log lines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};

use fepbr_core::draft::write_draft;
use fepbr_core::host::{DraftOptions, ExportHost, GeometryHost, ImportHost, ReportLevel, SceneHost};
use fepbr_core::hull::HullParams;
use fepbr_core::scene::{InstanceId, Scene, Selection};

use crate::gltf_import;

pub struct SceneFileHost {
    scene: Scene,
    path: PathBuf,
}

impl SceneFileHost {
    /// Load a scene file.
    pub fn open(path: &Path) -> Result<Self> {
        let scene = Scene::load(path)?;
        info!(
            "Loaded {} ({} object(s), {} selected)",
            path.display(),
            scene.objects.len(),
            scene.selection.selected.len()
        );
        Ok(Self {
            scene,
            path: path.to_path_buf(),
        })
    }

    /// Write the scene back to where it was loaded from.
    pub fn save(&self) -> Result<()> {
        self.scene.save(&self.path)?;
        info!("Saved {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Select objects by name; an empty list keeps the saved selection.
    pub fn select_by_name(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let Some(object) = self.scene.objects.iter().find(|o| &o.name == name) else {
                bail!("No object named {name:?} in {}", self.path.display());
            };
            selected.push(object.id);
        }
        self.scene.selection = Selection {
            active: selected.first().copied(),
            selected,
        };
        Ok(())
    }
}

impl SceneHost for SceneFileHost {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn set_selection(&mut self, selection: Selection) {
        self.scene.selection = selection;
    }

    fn report(&mut self, level: ReportLevel, message: &str) {
        match level {
            ReportLevel::Info => info!("{message}"),
            ReportLevel::Warning => warn!("{message}"),
            ReportLevel::Error => error!("{message}"),
        }
    }

    fn progress(&mut self, done: usize, total: usize) {
        debug!("Progress {done}/{total}");
    }
}

impl ExportHost for SceneFileHost {
    fn export_draft(&mut self, instance: InstanceId, path: &Path, options: &DraftOptions) -> Result<()> {
        write_draft(&self.scene, instance, path, options)?;
        Ok(())
    }
}

impl ImportHost for SceneFileHost {
    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn import_document(&mut self, path: &Path) -> Result<Vec<InstanceId>> {
        gltf_import::import_into(&mut self.scene, path)
            .with_context(|| format!("Failed to import {}", path.display()))
    }

    fn import_mesh(&mut self, path: &Path) -> Result<Vec<InstanceId>> {
        bail!(
            "FBX files need an interactive host to import: {}",
            path.display()
        )
    }
}

/// Geometry is only tracked as bounds here, and the hull of a box is the
/// box itself, so the mesh operators just log.
impl GeometryHost for SceneFileHost {
    fn duplicate_instance(&mut self, instance: InstanceId, suffix: &str) -> Result<InstanceId> {
        self.scene
            .duplicate_instance(instance, suffix)
            .with_context(|| format!("{instance} is not in the scene"))
    }

    fn convex_hull(&mut self, instance: InstanceId, params: &HullParams) -> Result<()> {
        debug!(
            "Convex hull of {instance} (face threshold {:.3} rad)",
            params.face_threshold
        );
        Ok(())
    }

    fn decimate(&mut self, instance: InstanceId, ratio: f32) -> Result<()> {
        debug!("Decimate {instance} to {ratio}");
        Ok(())
    }
}
