//! Grid arranger
//!
//! Lays mesh instances out on the ground plane, largest footprint first,
//! so that no two bounding boxes overlap.

use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::scene::{InstanceId, MeshInstance, Scene};

pub const DEFAULT_SPACING: f32 = 2.0;
pub const SPACING_RANGE: (f32, f32) = (0.1, 100.0);
pub const MAX_COLUMNS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrangeOptions {
    /// Gap between neighbouring boxes
    pub spacing: f32,
    /// Objects per row; 0 picks a square-ish grid
    pub columns: u32,
}

impl Default for ArrangeOptions {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            columns: 0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ArrangeError {
    #[error("Spacing {0} is outside [0.1, 100]")]
    Spacing(f32),

    #[error("Columns {0} is above 100")]
    Columns(u32),

    #[error("No mesh objects selected")]
    NothingSelected,
}

impl ArrangeOptions {
    pub fn validate(&self) -> Result<(), ArrangeError> {
        let (min, max) = SPACING_RANGE;
        if !(min..=max).contains(&self.spacing) {
            return Err(ArrangeError::Spacing(self.spacing));
        }
        if self.columns > MAX_COLUMNS {
            return Err(ArrangeError::Columns(self.columns));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub instance: InstanceId,
    /// World-space bounding box size
    pub size: Vec3,
    pub location: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub placements: Vec<Placement>,
    pub columns: usize,
    pub rows: usize,
}

/// Size of the instance's bounds after its local transform
pub fn world_size(scene: &Scene, instance: &MeshInstance) -> Vec3 {
    let Some(mesh) = scene.mesh_of(instance) else {
        return Vec3::ZERO;
    };
    let corners = mesh
        .bounds
        .corners()
        .map(|c| instance.matrix_local.transform_point3(c));
    let min = corners.iter().copied().fold(Vec3::splat(f32::INFINITY), Vec3::min);
    let max = corners.iter().copied().fold(Vec3::splat(f32::NEG_INFINITY), Vec3::max);
    max - min
}

/// Compute grid positions for the mesh instances among `selection`.
pub fn arrange_grid(
    scene: &Scene,
    selection: &[InstanceId],
    options: &ArrangeOptions,
) -> Result<Arrangement, ArrangeError> {
    options.validate()?;

    let mut items: Vec<(InstanceId, Vec3)> = selection
        .iter()
        .filter_map(|id| scene.instance(*id))
        .filter(|instance| instance.is_mesh())
        .map(|instance| (instance.id, world_size(scene, instance)))
        .collect();
    if items.is_empty() {
        return Err(ArrangeError::NothingSelected);
    }

    // Largest footprint first; stable for equal areas.
    items.sort_by(|a, b| {
        let area = |size: Vec3| size.x * size.y;
        area(b.1).total_cmp(&area(a.1))
    });

    let columns = if options.columns > 0 {
        options.columns as usize
    } else {
        (items.len() as f64).sqrt().ceil() as usize
    };

    let mut cursor = Vec2::ZERO;
    let mut row_height = 0.0f32;
    let mut column = 0;
    let mut rows = 1;
    let mut placements = Vec::with_capacity(items.len());

    for (instance, size) in items {
        if column >= columns {
            cursor.x = 0.0;
            cursor.y -= row_height + options.spacing;
            row_height = 0.0;
            column = 0;
            rows += 1;
        }

        let location = cursor.extend(0.0);
        debug!("{instance} ({:.2} x {:.2}) -> {location}", size.x, size.y);
        placements.push(Placement {
            instance,
            size,
            location,
        });

        cursor.x += size.x + options.spacing;
        row_height = row_height.max(size.y);
        column += 1;
    }

    Ok(Arrangement {
        placements,
        columns,
        rows,
    })
}

/// Arrange the scene's selected meshes and move them into place.
pub fn apply_arrangement(scene: &mut Scene, options: &ArrangeOptions) -> Result<Arrangement, ArrangeError> {
    let selection = scene.selection.selected.clone();
    let arrangement = arrange_grid(scene, &selection, options)?;

    for placement in &arrangement.placements {
        if let Some(instance) = scene.instance_mut(placement.instance) {
            instance.set_location(placement.location);
        }
    }
    info!(
        "Arranged {} mesh(es) in {} row(s)",
        arrangement.placements.len(),
        arrangement.rows
    );
    Ok(arrangement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Bounds, MeshData, MeshDataId, ObjectKind};
    use glam::Mat4;

    fn scene_with_boxes(sizes: &[Vec3]) -> Scene {
        let mut scene = Scene::default();
        for (i, size) in sizes.iter().enumerate() {
            let mesh = scene.add_mesh(MeshData {
                id: MeshDataId(0),
                name: format!("Box{i}"),
                library: None,
                bounds: Bounds::new(-*size / 2.0, *size / 2.0),
            });
            let id = scene.add_instance(MeshInstance {
                id: InstanceId(0),
                name: format!("Box{i}"),
                kind: ObjectKind::Mesh,
                mesh: Some(mesh),
                library: None,
                matrix_local: Mat4::from_translation(Vec3::new(50.0, 50.0, 3.0)),
                material_slots: Vec::new(),
            });
            scene.selection.selected.push(id);
        }
        scene
    }

    #[test]
    fn test_largest_first_in_rows() {
        let scene = scene_with_boxes(&[
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(4.0, 2.0, 1.0),
            Vec3::new(2.0, 3.0, 1.0),
            Vec3::new(1.0, 1.0, 5.0),
        ]);
        let options = ArrangeOptions {
            spacing: 1.0,
            columns: 0,
        };
        let result = arrange_grid(&scene, &scene.selection.selected, &options).unwrap();

        assert_eq!(result.columns, 2);
        assert_eq!(result.rows, 2);
        let order: Vec<u32> = result.placements.iter().map(|p| p.instance.0).collect();
        // Areas 8, 6, then the two 1x1 boxes in selection order.
        assert_eq!(order, vec![1, 2, 0, 3]);

        let locations: Vec<Vec3> = result.placements.iter().map(|p| p.location).collect();
        assert_eq!(locations[0], Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(locations[1], Vec3::new(5.0, 0.0, 0.0));
        // Next row sits below the tallest box (3) plus spacing.
        assert_eq!(locations[2], Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(locations[3], Vec3::new(2.0, -4.0, 0.0));
    }

    #[test]
    fn test_rotation_changes_footprint() {
        let mut scene = scene_with_boxes(&[Vec3::new(4.0, 1.0, 1.0)]);
        scene.objects[0].matrix_local = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let size = world_size(&scene, &scene.objects[0]);
        assert!(size.abs_diff_eq(Vec3::new(1.0, 4.0, 1.0), 1e-5));
    }

    #[test]
    fn test_apply_moves_objects_to_ground() {
        let mut scene = scene_with_boxes(&[Vec3::ONE, Vec3::ONE, Vec3::ONE]);
        let arrangement = apply_arrangement(
            &mut scene,
            &ArrangeOptions {
                spacing: 0.5,
                columns: 3,
            },
        )
        .unwrap();

        assert_eq!(arrangement.rows, 1);
        let xs: Vec<f32> = scene.objects.iter().map(|o| o.location().x).collect();
        assert_eq!(xs, vec![0.0, 1.5, 3.0]);
        assert!(scene.objects.iter().all(|o| o.location().z == 0.0));
    }

    #[test]
    fn test_options_are_validated() {
        let scene = scene_with_boxes(&[Vec3::ONE]);
        let bad_spacing = ArrangeOptions {
            spacing: 0.05,
            columns: 0,
        };
        assert_eq!(
            arrange_grid(&scene, &scene.selection.selected, &bad_spacing),
            Err(ArrangeError::Spacing(0.05))
        );
        let bad_columns = ArrangeOptions {
            spacing: 1.0,
            columns: 101,
        };
        assert_eq!(
            arrange_grid(&scene, &scene.selection.selected, &bad_columns),
            Err(ArrangeError::Columns(101))
        );
        assert_eq!(
            arrange_grid(&scene, &[], &ArrangeOptions::default()),
            Err(ArrangeError::NothingSelected)
        );
    }
}
