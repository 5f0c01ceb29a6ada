//! BVH over per-splat world extents.
//!
//! Splits on the widest centroid axis (better balance than splitting on the
//! boxes themselves); every node caches the bounds of `pos +- extent` over
//! its subtree. Supports box-overlap queries.

use gsplat_core::{DataTable, Result};

use crate::btree::quickselect;

const MAX_LEAF_SIZE: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Bounds3 {
    min: [f32; 3],
    max: [f32; 3],
}

impl Bounds3 {
    fn overlaps(&self, min: &[f32; 3], max: &[f32; 3]) -> bool {
        !(self.max[0] < min[0]
            || self.min[0] > max[0]
            || self.max[1] < min[1]
            || self.min[1] > max[1]
            || self.max[2] < min[2]
            || self.min[2] > max[2])
    }
}

struct BvhNode {
    count: usize,
    bounds: Bounds3,
    indices: Vec<u32>,
    left: Option<Box<BvhNode>>,
    right: Option<Box<BvhNode>>,
}

/// BVH over a splat table and its extents table (both borrowed).
pub struct GaussianBvh<'a> {
    x: &'a [f32],
    y: &'a [f32],
    z: &'a [f32],
    extent_x: &'a [f32],
    extent_y: &'a [f32],
    extent_z: &'a [f32],
    root: Box<BvhNode>,
}

impl<'a> GaussianBvh<'a> {
    pub fn new(table: &'a DataTable, extents: &'a DataTable) -> Result<GaussianBvh<'a>> {
        let x = table.column_by_name("x")?.as_f32()?;
        let y = table.column_by_name("y")?.as_f32()?;
        let z = table.column_by_name("z")?.as_f32()?;
        let extent_x = extents.column_by_name("extent_x")?.as_f32()?;
        let extent_y = extents.column_by_name("extent_y")?.as_f32()?;
        let extent_z = extents.column_by_name("extent_z")?.as_f32()?;

        let mut bvh = GaussianBvh {
            x,
            y,
            z,
            extent_x,
            extent_y,
            extent_z,
            root: Box::new(BvhNode {
                count: 0,
                bounds: Bounds3 {
                    min: [f32::INFINITY; 3],
                    max: [f32::NEG_INFINITY; 3],
                },
                indices: Vec::new(),
                left: None,
                right: None,
            }),
        };

        let mut indices: Vec<u32> = (0..table.num_rows() as u32).collect();
        bvh.root = bvh.build(&mut indices);
        Ok(bvh)
    }

    fn splat_bounds(&self, idx: u32) -> Bounds3 {
        let i = idx as usize;
        Bounds3 {
            min: [
                self.x[i] - self.extent_x[i],
                self.y[i] - self.extent_y[i],
                self.z[i] - self.extent_z[i],
            ],
            max: [
                self.x[i] + self.extent_x[i],
                self.y[i] + self.extent_y[i],
                self.z[i] + self.extent_z[i],
            ],
        }
    }

    fn compute_bounds(&self, indices: &[u32]) -> Bounds3 {
        let mut bounds = Bounds3 {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        };
        for &idx in indices {
            let b = self.splat_bounds(idx);
            for axis in 0..3 {
                if b.min[axis] < bounds.min[axis] {
                    bounds.min[axis] = b.min[axis];
                }
                if b.max[axis] > bounds.max[axis] {
                    bounds.max[axis] = b.max[axis];
                }
            }
        }
        bounds
    }

    fn build(&self, indices: &mut [u32]) -> Box<BvhNode> {
        let bounds = self.compute_bounds(indices);

        if indices.len() <= MAX_LEAF_SIZE {
            return Box::new(BvhNode {
                count: indices.len(),
                bounds,
                indices: indices.to_vec(),
                left: None,
                right: None,
            });
        }

        // split on the widest centroid axis
        let mut cmin = [f32::INFINITY; 3];
        let mut cmax = [f32::NEG_INFINITY; 3];
        for &idx in indices.iter() {
            let i = idx as usize;
            let p = [self.x[i], self.y[i], self.z[i]];
            for axis in 0..3 {
                if p[axis] < cmin[axis] {
                    cmin[axis] = p[axis];
                }
                if p[axis] > cmax[axis] {
                    cmax[axis] = p[axis];
                }
            }
        }
        let ext = [cmax[0] - cmin[0], cmax[1] - cmin[1], cmax[2] - cmin[2]];
        let split_axis: &[f32] = if ext[0] >= ext[1] && ext[0] >= ext[2] {
            self.x
        } else if ext[1] >= ext[2] {
            self.y
        } else {
            self.z
        };

        let mid = indices.len() / 2;
        quickselect(split_axis, indices, mid);

        let (left_half, right_half) = indices.split_at_mut(mid);
        let left = self.build(left_half);
        let right = self.build(right_half);

        Box::new(BvhNode {
            count: left.count + right.count,
            bounds,
            indices: Vec::new(),
            left: Some(left),
            right: Some(right),
        })
    }

    /// Indices of every splat whose AABB overlaps the query box.
    pub fn query_overlapping(&self, min: [f32; 3], max: [f32; 3]) -> Vec<u32> {
        let mut result = Vec::new();
        self.query_node(&self.root, &min, &max, &mut result);
        result
    }

    fn query_node(&self, node: &BvhNode, min: &[f32; 3], max: &[f32; 3], result: &mut Vec<u32>) {
        if !node.bounds.overlaps(min, max) {
            return;
        }

        if !node.indices.is_empty() {
            for &idx in &node.indices {
                if self.splat_bounds(idx).overlaps(min, max) {
                    result.push(idx);
                }
            }
            return;
        }

        if let Some(left) = &node.left {
            self.query_node(left, min, max, result);
        }
        if let Some(right) = &node.right {
            self.query_node(right, min, max, result);
        }
    }

    pub fn len(&self) -> usize {
        self.root.count
    }

    pub fn is_empty(&self) -> bool {
        self.root.count == 0
    }
}
