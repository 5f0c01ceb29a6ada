//! CPU voxelization of Gaussians onto a uniform grid.
//!
//! Reference implementation of the voxelizer interface: a voxel is occupied
//! when some Gaussian's density at its center, scaled by the splat's linear
//! opacity, reaches the cutoff. Results land in a [`BlockAccumulator`] of
//! 4x4x4 blocks keyed by block Morton code, ready for the sparse octree
//! builder.

use std::collections::BTreeMap;

use gsplat_core::{DataTable, Result};
use nalgebra::{Matrix3, Vector3};

use crate::gaussian_aabb::{compute_gaussian_extents, rotation_matrix};
use crate::morton::xyz_to_morton;
use crate::octree::{BlockAccumulator, Bounds};

pub struct VoxelizeResult {
    pub accumulator: BlockAccumulator,
    /// Grid bounds aligned to 4x4x4 block boundaries.
    pub grid_bounds: Bounds,
    /// Tight bounds of the splats' 3-sigma boxes.
    pub scene_bounds: Bounds,
}

/// Voxelize every splat in `table` at `voxel_resolution` world units per
/// voxel. Voxels whose best density falls below `opacity_cutoff` stay
/// empty.
pub fn voxelize_gaussians(
    table: &DataTable,
    voxel_resolution: f64,
    opacity_cutoff: f32,
) -> Result<VoxelizeResult> {
    let extents = compute_gaussian_extents(table)?;

    let scene_bounds = Bounds {
        min: extents.scene_min.map(|v| v as f64),
        max: extents.scene_max.map(|v| v as f64),
    };

    // block-aligned grid that encloses the scene
    let block_size = voxel_resolution * 4.0;
    let grid_min = scene_bounds.min.map(|v| (v / block_size).floor() * block_size);
    let grid_max = scene_bounds.max.map(|v| (v / block_size).ceil() * block_size);
    let grid_bounds = Bounds {
        min: grid_min,
        max: grid_max,
    };

    let x = table.column_by_name("x")?.as_f32()?;
    let y = table.column_by_name("y")?.as_f32()?;
    let z = table.column_by_name("z")?.as_f32()?;
    let rw = table.column_by_name("rot_0")?.as_f32()?;
    let rx = table.column_by_name("rot_1")?.as_f32()?;
    let ry = table.column_by_name("rot_2")?.as_f32()?;
    let rz = table.column_by_name("rot_3")?.as_f32()?;
    let s0 = table.column_by_name("scale_0")?.as_f32()?;
    let s1 = table.column_by_name("scale_1")?.as_f32()?;
    let s2 = table.column_by_name("scale_2")?.as_f32()?;
    let opacity = table.column_by_name("opacity")?.as_f32()?;

    let ex = extents.extents.column_by_name("extent_x")?.as_f32()?;
    let ey = extents.extents.column_by_name("extent_y")?.as_f32()?;
    let ez = extents.extents.column_by_name("extent_z")?.as_f32()?;

    let mut blocks: BTreeMap<u64, (u32, u32)> = BTreeMap::new();
    let res = voxel_resolution as f32;
    let origin = Vector3::new(grid_min.x as f32, grid_min.y as f32, grid_min.z as f32);

    for i in 0..table.num_rows() {
        // zero extents mark splats the extent pass rejected
        if ex[i] == 0.0 && ey[i] == 0.0 && ez[i] == 0.0 {
            continue;
        }

        let alpha = 1.0 / (1.0 + (-opacity[i]).exp());
        if alpha < opacity_cutoff {
            continue;
        }

        let position = Vector3::new(x[i], y[i], z[i]);
        let rot = rotation_matrix(rw[i], rx[i], ry[i], rz[i]);
        // inverse covariance: R diag(exp(-2s)) R^T
        let inv_cov: Matrix3<f32> = rot
            * Matrix3::from_diagonal(&Vector3::new(
                (-2.0 * s0[i]).exp(),
                (-2.0 * s1[i]).exp(),
                (-2.0 * s2[i]).exp(),
            ))
            * rot.transpose();

        let voxel_range = |center: f32, extent: f32, org: f32| -> (i64, i64) {
            (
                ((center - extent - org) / res).floor() as i64,
                ((center + extent - org) / res).floor() as i64,
            )
        };
        let (vx0, vx1) = voxel_range(position.x, ex[i], origin.x);
        let (vy0, vy1) = voxel_range(position.y, ey[i], origin.y);
        let (vz0, vz1) = voxel_range(position.z, ez[i], origin.z);

        for vz in vz0.max(0)..=vz1.max(0) {
            for vy in vy0.max(0)..=vy1.max(0) {
                for vx in vx0.max(0)..=vx1.max(0) {
                    let center = origin
                        + Vector3::new(
                            (vx as f32 + 0.5) * res,
                            (vy as f32 + 0.5) * res,
                            (vz as f32 + 0.5) * res,
                        );
                    let d = center - position;
                    let mahalanobis = (d.transpose() * inv_cov * d)[(0, 0)];
                    if alpha * (-0.5 * mahalanobis).exp() < opacity_cutoff {
                        continue;
                    }

                    let (bx, by, bz) = (vx as u32 / 4, vy as u32 / 4, vz as u32 / 4);
                    let (lx, ly, lz) = (vx as u32 % 4, vy as u32 % 4, vz as u32 % 4);
                    let bit = lx + 4 * ly + 16 * lz;
                    let entry = blocks.entry(xyz_to_morton(bx, by, bz)).or_insert((0, 0));
                    if bit < 32 {
                        entry.0 |= 1 << bit;
                    } else {
                        entry.1 |= 1 << (bit - 32);
                    }
                }
            }
        }
    }

    let mut accumulator = BlockAccumulator::default();
    for (morton, (lo, hi)) in blocks {
        accumulator.add_block(morton, lo, hi);
    }

    Ok(VoxelizeResult {
        accumulator,
        grid_bounds,
        scene_bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::splat_table;

    fn table_with_opacity(
        rows: &[([f32; 3], [f32; 4], [f32; 3])],
        opacity: f32,
    ) -> gsplat_core::DataTable {
        let mut table = splat_table(rows);
        table
            .add_column(gsplat_core::Column::new(
                "opacity",
                vec![opacity; rows.len()],
            ))
            .unwrap();
        table
    }

    #[test]
    fn opaque_gaussian_fills_its_center() {
        // sigma 0.5 around the origin, strongly opaque
        let table = table_with_opacity(
            &[([1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.0], [-0.7, -0.7, -0.7])],
            8.0,
        );
        let result = voxelize_gaussians(&table, 0.25, 0.5).unwrap();
        assert!(!result.accumulator.is_empty());

        // grid bounds are block aligned around the scene bounds
        let block = 0.25 * 4.0;
        for axis in 0..3 {
            assert!((result.grid_bounds.min[axis] / block).fract().abs() < 1e-9);
            assert!(result.grid_bounds.min[axis] <= result.scene_bounds.min[axis]);
            assert!(result.grid_bounds.max[axis] >= result.scene_bounds.max[axis]);
        }
    }

    #[test]
    fn transparent_gaussian_produces_nothing() {
        let table = table_with_opacity(
            &[([1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.0], [-0.7, -0.7, -0.7])],
            -8.0,
        );
        let result = voxelize_gaussians(&table, 0.25, 0.5).unwrap();
        assert!(result.accumulator.is_empty());
    }

    #[test]
    fn tight_gaussian_marks_fewer_voxels_than_wide_one() {
        let tight = table_with_opacity(
            &[([2.0, 2.0, 2.0], [1.0, 0.0, 0.0, 0.0], [-2.0, -2.0, -2.0])],
            8.0,
        );
        let wide = table_with_opacity(
            &[([2.0, 2.0, 2.0], [1.0, 0.0, 0.0, 0.0], [-0.5, -0.5, -0.5])],
            8.0,
        );
        let count = |t| {
            let r = voxelize_gaussians(t, 0.1, 0.5).unwrap();
            let mut voxels = 0u32;
            for pair in r.accumulator.mixed_masks.chunks(2) {
                voxels += pair[0].count_ones() + pair[1].count_ones();
            }
            voxels + 64 * r.accumulator.solid_morton.len() as u32
        };
        assert!(count(&tight) < count(&wide));
    }
}
