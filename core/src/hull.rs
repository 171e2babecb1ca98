//! Convex-hull orchestration
//!
//! Builds simplified collision meshes next to the selected objects. The
//! geometry work itself is done by the host.

use tracing::{info, warn};

use fepbr_shared::constants::DEFAULT_HULL_SUFFIX;

use crate::host::{GeometryHost, ReportLevel};
use crate::scene::{InstanceId, Selection};

/// Convex hull operator settings (40 degree face and shape thresholds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullParams {
    pub delete_unused: bool,
    pub use_existing_faces: bool,
    pub make_holes: bool,
    pub join_triangles: bool,
    /// Radians
    pub face_threshold: f32,
    /// Radians
    pub shape_threshold: f32,
    pub uvs: bool,
    pub vertex_colors: bool,
    pub seams: bool,
    pub sharp: bool,
    pub materials: bool,
}

impl Default for HullParams {
    fn default() -> Self {
        Self {
            delete_unused: true,
            use_existing_faces: true,
            make_holes: false,
            join_triangles: true,
            face_threshold: 0.698132,
            shape_threshold: 0.698132,
            uvs: false,
            vertex_colors: false,
            seams: false,
            sharp: false,
            materials: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HullOptions {
    /// Fraction of faces kept after the hull; 1.0 skips decimation
    pub decimate_ratio: f32,
    /// Appended to the new object's name
    pub suffix: String,
    pub params: HullParams,
}

impl Default for HullOptions {
    fn default() -> Self {
        Self {
            decimate_ratio: 1.0,
            suffix: DEFAULT_HULL_SUFFIX.to_string(),
            params: HullParams::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HullError {
    #[error("Decimate ratio {0} is outside [0, 1]")]
    Ratio(f32),
}

impl HullOptions {
    pub fn validate(&self) -> Result<(), HullError> {
        if !(0.0..=1.0).contains(&self.decimate_ratio) {
            return Err(HullError::Ratio(self.decimate_ratio));
        }
        Ok(())
    }
}

/// Duplicate each selected mesh, hull it and optionally decimate it.
///
/// Afterwards only the new objects are selected, the first one active.
/// Objects whose hull fails are reported and left in the scene as plain
/// duplicates so the user can inspect them.
pub fn create_convex_hulls<H: GeometryHost + ?Sized>(
    host: &mut H,
    options: &HullOptions,
) -> Result<Vec<InstanceId>, HullError> {
    options.validate()?;

    let selection = host.selection();
    if selection.is_empty() {
        host.report(ReportLevel::Warning, "No objects selected");
        return Ok(Vec::new());
    }

    let meshes: Vec<InstanceId> = selection
        .selected
        .iter()
        .copied()
        .filter(|id| host.scene().instance(*id).is_some_and(|i| i.is_mesh()))
        .collect();

    let mut created = Vec::new();
    for id in meshes {
        let copy = match host.duplicate_instance(id, &options.suffix) {
            Ok(copy) => copy,
            Err(e) => {
                warn!("Could not duplicate {id}: {e:#}");
                host.report(ReportLevel::Warning, &format!("Could not duplicate {id}: {e:#}"));
                continue;
            }
        };
        host.set_selection(Selection::only(copy));

        let result = host.convex_hull(copy, &options.params).and_then(|()| {
            if options.decimate_ratio < 1.0 {
                host.decimate(copy, options.decimate_ratio)
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            warn!("Convex hull of {copy} failed: {e:#}");
            host.report(ReportLevel::Warning, &format!("Convex hull of {copy} failed: {e:#}"));
        }
        created.push(copy);
    }

    host.set_selection(Selection {
        selected: created.clone(),
        active: created.first().copied(),
    });
    info!("Created {} convex hull(s)", created.len());
    Ok(created)
}
