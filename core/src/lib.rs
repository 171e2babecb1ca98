//! FePBR Core - material graph rewriting and export document patching
//!
//! This crate holds the engines of the FePBR scene porter. They operate on a
//! [`Scene`] exposed by a host application and never touch geometry
//! themselves: importing, draft export and mesh operators are delegated
//! through the traits in [`host`].
//!
//! # Architecture
//!
//! - [`rewrite`] - Replaces the standard shading node with the FePBR parameter group
//! - [`trace`] - Finds the image feeding a semantic input (one decoder hop)
//! - [`paths`] - Linked/local classification and destination layout
//! - [`job`] - Tick-driven export of the selected instances
//! - [`patch`] - Corrects the host's draft documents in place
//! - [`import`], [`arrange`], [`hull`] - Batch import, grid layout, collision hulls

pub mod arrange;
pub mod channel;
pub mod document;
pub mod draft;
pub mod graph;
pub mod host;
pub mod hull;
pub mod import;
#[cfg(test)]
mod integration;
pub mod job;
pub mod patch;
pub mod paths;
pub mod rewrite;
pub mod scene;
#[cfg(test)]
pub mod test_utils;
pub mod trace;

// Re-export the engine entry points
pub use arrange::{ArrangeError, ArrangeOptions, Arrangement, apply_arrangement, arrange_grid};
pub use channel::ChannelFamily;
pub use document::{DocumentError, ExportDocument};
pub use graph::{GraphError, Node, NodeId, ShadingGraph};
pub use host::{DraftOptions, ExportHost, GeometryHost, ImportHost, ReportLevel, SceneHost};
pub use hull::{HullError, HullOptions, HullParams, create_convex_hulls};
pub use import::{ImportKind, ImportSummary, import_files, load_template};
pub use job::{ExportJob, JobError, JobPhase, JobSummary, run_to_completion, run_until_cancelled};
pub use patch::{PatchError, PatchInput, PatchReport, patch_document};
pub use paths::{Classification, ExportLayout, PathError, SourceFolder, classify};
pub use rewrite::{RewriteError, RewriteOutcome, rewrite_material};
pub use scene::{InstanceId, MeshDataId, Scene, SceneError, Selection};
pub use trace::{trace_family, trace_socket};
