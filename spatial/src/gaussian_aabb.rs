//! Per-splat world-space extents.
//!
//! Gaussians render out to three sigma, so each splat's footprint is the
//! world AABB of its rotated three-sigma box. Only the half-extents are stored;
//! callers reconstruct `min = pos - extent`, `max = pos + extent`.

use gsplat_core::{Column, DataTable, Result};
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

pub struct GaussianExtents {
    /// Table with f32 columns `extent_x`, `extent_y`, `extent_z`.
    pub extents: DataTable,
    /// Componentwise bounds of `pos +- extent` over all valid splats.
    pub scene_min: Vector3<f32>,
    pub scene_max: Vector3<f32>,
    /// Splats whose extents came out non-finite (stored as zero).
    pub invalid_count: usize,
}

/// Rotation matrix from the table's `(rot_0=w, rot_1=x, rot_2=y, rot_3=z)`
/// convention, renormalized.
pub fn rotation_matrix(w: f32, x: f32, y: f32, z: f32) -> Matrix3<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)).to_rotation_matrix()
        .into_inner()
}

pub fn compute_gaussian_extents(table: &DataTable) -> Result<GaussianExtents> {
    let num_rows = table.num_rows();

    let x = table.column_by_name("x")?.as_f32()?;
    let y = table.column_by_name("y")?.as_f32()?;
    let z = table.column_by_name("z")?.as_f32()?;
    let rw = table.column_by_name("rot_0")?.as_f32()?;
    let rx = table.column_by_name("rot_1")?.as_f32()?;
    let ry = table.column_by_name("rot_2")?.as_f32()?;
    let rz = table.column_by_name("rot_3")?.as_f32()?;
    let sx = table.column_by_name("scale_0")?.as_f32()?;
    let sy = table.column_by_name("scale_1")?.as_f32()?;
    let sz = table.column_by_name("scale_2")?.as_f32()?;

    let mut extent_x = vec![0.0f32; num_rows];
    let mut extent_y = vec![0.0f32; num_rows];
    let mut extent_z = vec![0.0f32; num_rows];

    let mut scene_min = Vector3::repeat(f32::INFINITY);
    let mut scene_max = Vector3::repeat(f32::NEG_INFINITY);
    let mut invalid_count = 0usize;

    for i in 0..num_rows {
        let position = Vector3::new(x[i], y[i], z[i]);
        let rot = rotation_matrix(rw[i], rx[i], ry[i], rz[i]);
        let half = Vector3::new(
            sx[i].exp() * 3.0,
            sy[i].exp() * 3.0,
            sz[i].exp() * 3.0,
        );

        let mut world_min = Vector3::repeat(f32::INFINITY);
        let mut world_max = Vector3::repeat(f32::NEG_INFINITY);
        for corner in 0..8u32 {
            let local = Vector3::new(
                if corner & 1 != 0 { half.x } else { -half.x },
                if corner & 2 != 0 { half.y } else { -half.y },
                if corner & 4 != 0 { half.z } else { -half.z },
            );
            let world = rot * local + position;
            world_min = world_min.inf(&world);
            world_max = world_max.sup(&world);
        }

        let half_extents = (world_max - world_min) * 0.5;
        if !half_extents.iter().all(|v| v.is_finite()) {
            invalid_count += 1;
            continue;
        }

        extent_x[i] = half_extents.x;
        extent_y[i] = half_extents.y;
        extent_z[i] = half_extents.z;

        scene_min = scene_min.inf(&(position - half_extents));
        scene_max = scene_max.sup(&(position + half_extents));
    }

    if invalid_count > 0 {
        tracing::warn!(invalid_count, "skipped gaussians with invalid scale/rotation values");
    }

    let extents = DataTable::new(vec![
        Column::new("extent_x", extent_x),
        Column::new("extent_y", extent_y),
        Column::new("extent_z", extent_z),
    ])?;

    Ok(GaussianExtents {
        extents,
        scene_min,
        scene_max,
        invalid_count,
    })
}
