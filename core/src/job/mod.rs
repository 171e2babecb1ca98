//! Export job
//!
//! A tick-driven state machine that exports the selected mesh instances one
//! per tick, so an interactive host can keep its UI responsive and show
//! progress between ticks.
//!
//! ```text
//! Idle --start--> Running --(last instance)--> Finishing --> Done
//!   |                |                            |
//!   +--(bad config)--+-------(cancel)-------------+--> Cancelled
//! ```
//!
//! All per-job state lives in [`ExportJob`]; nothing is global.

mod runner;

pub use runner::{run_to_completion, run_until_cancelled};

use std::path::PathBuf;

use anyhow::Context;
use hashbrown::HashSet;
use tracing::{info, warn};

use fepbr_shared::fs::create_dir_all;
use fepbr_shared::{ExportSettings, InstanceRecord, SceneManifest};

use crate::host::{DraftOptions, ExportHost, ReportLevel, SceneHost};
use crate::patch::{PatchInput, PatchReport, collect_assets, patch_document};
use crate::paths::{ExportLayout, SourceFolder, classify};
use crate::scene::{InstanceId, MeshDataId, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Running,
    Finishing,
    Done,
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Export cancelled: {0}")]
    Cancelled(String),

    #[error("Export job has not been started")]
    NotStarted,

    #[error("Export job was already started")]
    AlreadyStarted,

    #[error("Failed to write manifest {}: {reason}", path.display())]
    ManifestWrite { path: PathBuf, reason: String },
}

/// What a finished (or cancelled) job did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    /// Eligible instances at start
    pub instances: usize,
    /// Unique documents written and patched
    pub exported: usize,
    /// Instances whose mesh data was already exported by this job
    pub shared: usize,
    /// Instances whose export or patch failed
    pub failed: usize,
    pub manifest_path: Option<PathBuf>,
}

pub struct ExportJob {
    settings: ExportSettings,
    options: DraftOptions,
    phase: JobPhase,
    instances: Vec<InstanceId>,
    cursor: usize,
    processed: HashSet<MeshDataId>,
    records: Vec<InstanceRecord>,
    snapshot: Option<Selection>,
    summary: JobSummary,
}

impl ExportJob {
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            settings,
            options: DraftOptions::default(),
            phase: JobPhase::Idle,
            instances: Vec::new(),
            cursor: 0,
            processed: HashSet::new(),
            records: Vec::new(),
            snapshot: None,
            summary: JobSummary::default(),
        }
    }

    pub fn with_options(mut self, options: DraftOptions) -> Self {
        self.options = options;
        self
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Instances processed so far and the total
    pub fn position(&self) -> (usize, usize) {
        (self.cursor, self.instances.len())
    }

    pub fn records(&self) -> &[InstanceRecord] {
        &self.records
    }

    pub fn summary(&self) -> &JobSummary {
        &self.summary
    }

    /// `Idle -> Running`.
    ///
    /// Needs a destination and at least one selected mesh instance;
    /// otherwise the job is cancelled with a report and nothing is written.
    pub fn start<H: SceneHost + ?Sized>(&mut self, host: &mut H) -> Result<(), JobError> {
        if self.phase != JobPhase::Idle {
            return Err(JobError::AlreadyStarted);
        }

        if let Err(e) = self.settings.validate() {
            return Err(self.abort(host, e.to_string()));
        }

        let selection = host.selection();
        let scene = host.scene();
        let instances: Vec<InstanceId> = selection
            .selected
            .iter()
            .copied()
            .filter(|id| scene.instance(*id).is_some_and(|i| i.is_mesh()))
            .collect();
        if instances.is_empty() {
            return Err(self.abort(host, "No mesh objects selected".to_string()));
        }

        let roots: Vec<PathBuf> = [self.settings.scene_destination(), self.settings.asset_destination()]
            .into_iter()
            .flatten()
            .map(PathBuf::from)
            .collect();
        for dir in &roots {
            if let Err(e) = create_dir_all(dir) {
                return Err(self.abort(host, format!("{e:#}")));
            }
        }

        info!("Exporting {} mesh instance(s)", instances.len());
        self.summary = JobSummary {
            instances: instances.len(),
            ..Default::default()
        };
        self.instances = instances;
        self.snapshot = Some(selection);
        self.phase = JobPhase::Running;
        host.progress(0, self.instances.len());
        Ok(())
    }

    /// Advance the job by one step and return the new phase.
    ///
    /// A `Running` tick processes exactly one instance. A `Finishing` tick
    /// restores the selection and writes the manifest. Ticks on a finished
    /// or cancelled job do nothing.
    pub fn tick<H: ExportHost + ?Sized>(&mut self, host: &mut H) -> Result<JobPhase, JobError> {
        match self.phase {
            JobPhase::Idle => Err(JobError::NotStarted),
            JobPhase::Running => {
                if let Some(&id) = self.instances.get(self.cursor) {
                    self.process(host, id);
                    self.cursor += 1;
                    host.progress(self.cursor, self.instances.len());
                }
                if self.cursor >= self.instances.len() {
                    self.phase = JobPhase::Finishing;
                }
                Ok(self.phase)
            }
            JobPhase::Finishing => self.finish(host),
            JobPhase::Done | JobPhase::Cancelled => Ok(self.phase),
        }
    }

    /// Stop a running job: restore the selection and drop the manifest.
    /// Files already relocated stay where they are.
    ///
    /// Returns `false` when there was nothing to cancel.
    pub fn cancel<H: SceneHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !matches!(self.phase, JobPhase::Running | JobPhase::Finishing) {
            return false;
        }
        self.restore_selection(host);
        self.records.clear();
        self.phase = JobPhase::Cancelled;
        host.report(
            ReportLevel::Warning,
            &format!(
                "Export cancelled after {}/{} instance(s)",
                self.cursor,
                self.instances.len()
            ),
        );
        true
    }

    fn abort<H: SceneHost + ?Sized>(&mut self, host: &mut H, reason: String) -> JobError {
        warn!("Export not started: {reason}");
        host.report(ReportLevel::Warning, &reason);
        self.phase = JobPhase::Cancelled;
        JobError::Cancelled(reason)
    }

    fn restore_selection<H: SceneHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(selection) = self.snapshot.take() {
            host.set_selection(selection);
        }
    }

    fn process<H: ExportHost + ?Sized>(&mut self, host: &mut H, id: InstanceId) {
        let scene = host.scene();
        let Some(instance) = scene.instance(id) else {
            warn!("{id} disappeared during export");
            return;
        };
        let (location, rotation, scale) = instance.decompose();
        let mut record = InstanceRecord {
            name: instance.name.clone(),
            mesh_data_name: scene.mesh_of(instance).map(|m| m.name.clone()).unwrap_or_default(),
            is_linked: classify(scene, instance, self.settings.asset_source()).is_linked,
            asset_path: String::new(),
            location: location.into(),
            rotation: rotation.into(),
            scale: scale.into(),
        };
        let mesh = instance.mesh;
        let name = instance.name.clone();

        // Recorded without an asset path when there is nowhere to export to.
        let layout = match ExportLayout::compute(&self.settings, scene, instance) {
            Ok(layout) => layout,
            Err(e) => {
                self.summary.failed += 1;
                host.report(ReportLevel::Warning, &format!("Could not export {name}: {e}"));
                self.records.push(record);
                return;
            }
        };
        record.asset_path = layout.asset_path.clone();

        let destination = match &layout.classification.source_folder {
            SourceFolder::Local => "scene (root)/".to_string(),
            SourceFolder::Linked(folder) if folder.is_empty() => "assets (root)/".to_string(),
            SourceFolder::Linked(folder) => format!("{folder}/"),
        };
        host.report(
            ReportLevel::Info,
            &format!(
                "Exporting {} {}/{}: {} -> {}",
                if layout.is_linked() { "(Linked)" } else { "(Local)" },
                self.cursor + 1,
                self.instances.len(),
                name,
                destination
            ),
        );

        match mesh {
            Some(mesh) if self.processed.insert(mesh) => match self.export_one(host, id, &layout) {
                Ok(report) => {
                    self.summary.exported += 1;
                    info!(
                        "Exported {} ({} image(s) relocated)",
                        layout.document_path.display(),
                        report.relocation.relocated
                    );
                }
                Err(e) => {
                    self.summary.failed += 1;
                    warn!("Export of {name} failed: {e:#}");
                    host.report(
                        ReportLevel::Warning,
                        &format!("Could not export {name}: {e:#}"),
                    );
                }
            },
            Some(_) => self.summary.shared += 1,
            None => self.summary.failed += 1,
        }

        self.records.push(record);
    }

    /// Draft export and patch for one instance whose mesh data is new.
    fn export_one<H: ExportHost + ?Sized>(
        &self,
        host: &mut H,
        id: InstanceId,
        layout: &ExportLayout,
    ) -> anyhow::Result<PatchReport> {
        let scene = host.scene();
        let instance = scene
            .instance(id)
            .with_context(|| format!("{id} disappeared during export"))?;

        let assets = collect_assets(&self.settings, scene, instance, &layout.document_dir);
        let graphs: Vec<_> = instance
            .material_slots
            .iter()
            .map(|slot| slot.material.as_ref().and_then(|m| m.graph.clone()))
            .collect();

        create_dir_all(&layout.document_dir)?;
        host.set_selection(Selection::only(id));
        host.export_draft(id, &layout.document_path, &self.options)
            .with_context(|| format!("Draft export to {} failed", layout.document_path.display()))?;

        let slots: Vec<_> = graphs.iter().map(Option::as_ref).collect();
        let report = patch_document(PatchInput {
            document_path: &layout.document_path,
            slots: &slots,
            flags: self.settings.channels,
            assets: &assets,
        })?;
        Ok(report)
    }

    fn finish<H: SceneHost + ?Sized>(&mut self, host: &mut H) -> Result<JobPhase, JobError> {
        self.restore_selection(host);

        let manifest = SceneManifest {
            instances: std::mem::take(&mut self.records),
        };
        let result = match self.settings.manifest_path() {
            Some(path) => manifest
                .write(&path)
                .map(|()| path.clone())
                .map_err(|e| JobError::ManifestWrite {
                    path,
                    reason: format!("{e:#}"),
                }),
            None => Err(JobError::ManifestWrite {
                path: PathBuf::from(&self.settings.manifest.file_name),
                reason: "no destination configured".to_string(),
            }),
        };

        match result {
            Ok(path) => {
                self.summary.manifest_path = Some(path);
                self.phase = JobPhase::Done;
                let message = format!(
                    "Done! {} instances, {} unique documents exported.",
                    self.summary.instances, self.summary.exported
                );
                info!("{message}");
                host.report(ReportLevel::Info, &message);
                Ok(JobPhase::Done)
            }
            Err(e) => {
                self.phase = JobPhase::Cancelled;
                host.report(ReportLevel::Error, &e.to_string());
                Err(e)
            }
        }
    }
}
