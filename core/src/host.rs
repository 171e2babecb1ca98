//! Host interface
//!
//! The engines never import, export or modify geometry themselves. The
//! application embedding them (an interactive editor, or the file-backed
//! host of the command line tool) implements these traits.
//!
//! All host calls are synchronous and happen on the caller's thread.

use std::path::Path;

use anyhow::Result;

use crate::hull::HullParams;
use crate::scene::{InstanceId, Scene, Selection};

/// Severity of a user-visible report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReportLevel::Info => "info",
            ReportLevel::Warning => "warning",
            ReportLevel::Error => "error",
        })
    }
}

/// Image handling requested from the draft exporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DraftImageFormat {
    /// Keep each image's own format
    #[default]
    Auto,
    Png,
    Jpeg,
    /// Write no images
    None,
}

/// Options passed to [`ExportHost::export_draft`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftOptions {
    /// Export only the current selection
    pub selected_only: bool,
    /// Bake modifiers into the exported geometry
    pub apply_modifiers: bool,
    /// Write images as separate files next to the document
    pub separate_images: bool,
    pub image_format: DraftImageFormat,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            selected_only: true,
            apply_modifiers: true,
            separate_images: true,
            image_format: DraftImageFormat::Auto,
        }
    }
}

/// Scene access, selection and reporting
///
/// Every other host trait builds on this one.
pub trait SceneHost {
    /// The open scene
    fn scene(&self) -> &Scene;

    /// Current selection (selected objects and the active one)
    fn selection(&self) -> Selection {
        self.scene().selection.clone()
    }

    /// Replace the selection
    fn set_selection(&mut self, selection: Selection);

    /// Show a message to the user
    ///
    /// Implementations should not fail; a report that cannot be shown is
    /// simply dropped.
    fn report(&mut self, level: ReportLevel, message: &str);

    /// Progress of a long-running operation. `done` counts finished steps.
    fn progress(&mut self, _done: usize, _total: usize) {}
}

/// Native draft export
pub trait ExportHost: SceneHost {
    /// Write a first-draft export document for `instance` to `path`
    ///
    /// The draft is glTF-style JSON with `images[]{uri}`, `textures[]{source}`
    /// and `materials[]`, one material per material slot of the instance in
    /// slot order. Images may be written next to the document.
    ///
    /// # Errors
    /// Any failure is reported per instance by the caller; the job keeps
    /// running.
    fn export_draft(&mut self, instance: InstanceId, path: &Path, options: &DraftOptions) -> Result<()>;
}

/// File import
pub trait ImportHost: SceneHost {
    fn scene_mut(&mut self) -> &mut Scene;

    /// Import a glTF/GLB document, returning the new objects
    fn import_document(&mut self, path: &Path) -> Result<Vec<InstanceId>>;

    /// Import an FBX file, returning the new objects
    fn import_mesh(&mut self, path: &Path) -> Result<Vec<InstanceId>>;
}

/// Geometry operators used by the convex-hull orchestration
pub trait GeometryHost: SceneHost {
    /// Copy an object together with its mesh data, appending `suffix` to
    /// both names
    fn duplicate_instance(&mut self, instance: InstanceId, suffix: &str) -> Result<InstanceId>;

    /// Replace the object's geometry with its convex hull
    fn convex_hull(&mut self, instance: InstanceId, params: &HullParams) -> Result<()>;

    /// Collapse-decimate the object's geometry to `ratio` of its faces
    fn decimate(&mut self, instance: InstanceId, ratio: f32) -> Result<()>;
}
