//! Command implementations behind the `fepbr` subcommands

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use fepbr_core::arrange::{ArrangeOptions, apply_arrangement};
use fepbr_core::host::{DraftImageFormat, DraftOptions, ImportHost, SceneHost};
use fepbr_core::hull::{HullOptions, create_convex_hulls};
use fepbr_core::import::{ImportKind, ImportSummary, convert_instance_materials, import_files, load_template};
use fepbr_core::job::{ExportJob, JobSummary, run_to_completion};
use fepbr_core::graph::ShadingGraph;
use fepbr_shared::constants::DEFAULT_TICK_INTERVAL_MS;
use fepbr_shared::fs::write_json_pretty;
use fepbr_shared::{ExportSettings, MeshListing};

use crate::host::SceneFileHost;

/// Destination roots given on the command line
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub asset_source: Option<PathBuf>,
    pub asset_destination: Option<PathBuf>,
    pub scene_destination: Option<PathBuf>,
}

impl PathOverrides {
    fn apply(self, settings: &mut ExportSettings) {
        let paths = &mut settings.paths;
        if self.asset_source.is_some() {
            paths.asset_source = self.asset_source;
        }
        if self.asset_destination.is_some() {
            paths.asset_destination = self.asset_destination;
        }
        if self.scene_destination.is_some() {
            paths.scene_destination = self.scene_destination;
        }
    }
}

/// Settings from `config` (when it exists) with the overrides applied
pub fn load_settings(config: &Path, overrides: PathOverrides) -> Result<ExportSettings> {
    let mut settings = if config.exists() {
        ExportSettings::load(config)?
    } else {
        info!("{} not found, using command line paths only", config.display());
        ExportSettings::default()
    };
    overrides.apply(&mut settings);
    Ok(settings)
}

pub struct ExportRequest<'a> {
    pub scene: &'a Path,
    pub settings: ExportSettings,
    /// Objects to export; empty keeps the scene's saved selection
    pub objects: &'a [String],
    pub images: bool,
}

pub fn export(request: ExportRequest<'_>) -> Result<JobSummary> {
    let mut host = SceneFileHost::open(request.scene)?;
    host.select_by_name(request.objects)?;

    let options = DraftOptions {
        image_format: if request.images {
            DraftImageFormat::Auto
        } else {
            DraftImageFormat::None
        },
        ..Default::default()
    };
    let mut job = ExportJob::new(request.settings).with_options(options);
    let summary = run_to_completion(
        &mut job,
        &mut host,
        Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
    )?;
    Ok(summary)
}

fn template_graph(template: &Path) -> Result<ShadingGraph> {
    let Some(material) = load_template(template)? else {
        bail!("Template material not found: {}", template.display());
    };
    material
        .graph
        .with_context(|| format!("Template {} has no node graph", material.name))
}

/// Rewrite the materials of the selected objects and save the scene.
/// Returns the number of materials rewritten.
pub fn rewrite(scene: &Path, template: &Path, objects: &[String]) -> Result<usize> {
    let template = template_graph(template)?;
    let mut host = SceneFileHost::open(scene)?;
    host.select_by_name(objects)?;

    let selected = host.scene().selected_meshes();
    if selected.is_empty() {
        bail!("No mesh objects selected");
    }
    let mut rewritten = 0;
    for id in selected {
        let conversion = convert_instance_materials(host.scene_mut(), id, Some(&template));
        rewritten += conversion.rewritten;
    }
    host.save()?;
    Ok(rewritten)
}

/// Import `files` into the scene and save it.
pub fn import(scene: &Path, template: Option<&Path>, files: &[PathBuf], kind: ImportKind) -> Result<ImportSummary> {
    let template = match template {
        Some(path) => load_template(path)?.and_then(|m| m.graph),
        None => None,
    };
    let mut host = SceneFileHost::open(scene)?;
    let summary = import_files(&mut host, files, kind, template.as_ref());
    host.save()?;
    Ok(summary)
}

pub fn arrange(scene: &Path, options: ArrangeOptions, objects: &[String]) -> Result<()> {
    let mut host = SceneFileHost::open(scene)?;
    host.select_by_name(objects)?;
    apply_arrangement(host.scene_mut(), &options)?;
    host.save()
}

/// Create collision hulls for the selected objects and save the scene.
pub fn hull(scene: &Path, options: &HullOptions, objects: &[String]) -> Result<usize> {
    let mut host = SceneFileHost::open(scene)?;
    host.select_by_name(objects)?;
    let created = create_convex_hulls(&mut host, options)?;
    host.save()?;
    Ok(created.len())
}

/// Write the mesh-object listing to `output`, or return it as JSON text.
pub fn list(scene: &Path, output: Option<&Path>) -> Result<Option<String>> {
    let host = SceneFileHost::open(scene)?;
    let scene_file = host
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let listing = MeshListing::new(scene_file, host.scene().mesh_object_names());

    match output {
        Some(path) => {
            write_json_pretty(path, &listing)?;
            info!("Found {} mesh object(s), written to {}", listing.count, path.display());
            Ok(None)
        }
        None => Ok(Some(serde_json::to_string_pretty(&listing)?)),
    }
}

/// Validate settings, returning the resolved roots for display.
pub fn check(settings: &ExportSettings) -> Result<Vec<(&'static str, String)>> {
    settings.validate()?;
    let show = |path: Option<&Path>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    };
    Ok(vec![
        ("asset source", show(settings.asset_source())),
        ("asset destination", show(settings.asset_destination())),
        ("scene destination", show(settings.scene_destination())),
        (
            "manifest",
            show(settings.manifest_path().as_deref()),
        ),
    ])
}
