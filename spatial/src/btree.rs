//! Median-split bounding tree over centroid columns.
//!
//! Not a nearest-neighbor structure: the LOD packer walks it top-down to
//! carve a scene into spatial chunks. Interior nodes cache their AABB and
//! subtree count; leaves (at most 256 rows) hold the row indices.

use gsplat_core::{DataTable, Result};

/// Axis-aligned box over an arbitrary number of dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl Aabb {
    /// Index of the widest axis. Meaningless for a dimensionless box.
    pub fn largest_axis(&self) -> usize {
        let mut best = 0usize;
        let mut best_extent = f32::NEG_INFINITY;
        for (i, (&min, &max)) in self.min.iter().zip(&self.max).enumerate() {
            let extent = max - min;
            if extent > best_extent {
                best_extent = extent;
                best = i;
            }
        }
        best
    }

    /// Extent along the widest axis.
    pub fn largest_dim(&self) -> f32 {
        let axis = self.largest_axis();
        if self.min.is_empty() {
            return 0.0;
        }
        self.max[axis] - self.min[axis]
    }

    /// Tight box around the centroid rows selected by `indices`.
    pub fn from_centroids(centroids: &DataTable, indices: &[u32]) -> Result<Aabb> {
        let columns: Vec<&[f32]> = centroids
            .columns()
            .iter()
            .map(|c| c.as_f32())
            .collect::<Result<_>>()?;
        Ok(aabb_of(&columns, indices))
    }
}

fn aabb_of(columns: &[&[f32]], indices: &[u32]) -> Aabb {
    let mut min = vec![f32::INFINITY; columns.len()];
    let mut max = vec![f32::NEG_INFINITY; columns.len()];
    for (axis, data) in columns.iter().enumerate() {
        for &i in indices {
            let v = data[i as usize];
            if v < min[axis] {
                min[axis] = v;
            }
            if v > max[axis] {
                max[axis] = v;
            }
        }
    }
    Aabb { min, max }
}

/// Partition `idx` in place so that element `k` is in its sorted position
/// with respect to `data`, smaller values before it and larger after.
/// Quickselect with median-of-three pivoting; compares through `idx`.
pub fn quickselect(data: &[f32], idx: &mut [u32], k: usize) {
    if idx.is_empty() {
        return;
    }
    debug_assert!(k < idx.len());

    let val = |idx: &[u32], p: usize| data[idx[p] as usize];

    let mut l = 0usize;
    let mut r = idx.len() - 1;

    loop {
        if r <= l + 1 {
            if r == l + 1 && val(idx, r) < val(idx, l) {
                idx.swap(l, r);
            }
            return;
        }

        // median-of-three: order {l, l+1, r} so l+1 holds the pivot
        let mid = (l + r) >> 1;
        idx.swap(mid, l + 1);
        if val(idx, l) > val(idx, r) {
            idx.swap(l, r);
        }
        if val(idx, l + 1) > val(idx, r) {
            idx.swap(l + 1, r);
        }
        if val(idx, l) > val(idx, l + 1) {
            idx.swap(l, l + 1);
        }

        let mut i = l + 1;
        let mut j = r;
        let pivot_val = val(idx, l + 1);
        let pivot_idx = idx[l + 1];

        loop {
            loop {
                i += 1;
                if val(idx, i) >= pivot_val {
                    break;
                }
            }
            loop {
                j -= 1;
                if val(idx, j) <= pivot_val {
                    break;
                }
            }
            if j < i {
                break;
            }
            idx.swap(i, j);
        }

        idx[l + 1] = idx[j];
        idx[j] = pivot_idx;

        if j >= k {
            r = j - 1;
        }
        if j <= k {
            l = i;
        }
    }
}

const LEAF_SIZE: usize = 256;

pub struct BTreeNode {
    pub count: usize,
    pub aabb: Aabb,
    /// Non-empty only for leaves.
    pub indices: Vec<u32>,
    pub left: Option<Box<BTreeNode>>,
    pub right: Option<Box<BTreeNode>>,
}

impl BTreeNode {
    pub fn is_leaf(&self) -> bool {
        !self.indices.is_empty()
    }
}

/// Median-split tree over a centroid table (borrowed for the tree's life).
pub struct BTree<'a> {
    columns: Vec<&'a [f32]>,
    pub root: Box<BTreeNode>,
}

impl<'a> BTree<'a> {
    pub fn new(centroids: &'a DataTable) -> Result<BTree<'a>> {
        let columns: Vec<&[f32]> = centroids
            .columns()
            .iter()
            .map(|c| c.as_f32())
            .collect::<Result<_>>()?;
        let mut indices: Vec<u32> = (0..centroids.num_rows() as u32).collect();
        let root = Self::recurse(&columns, &mut indices);
        Ok(BTree { columns, root })
    }

    fn recurse(columns: &[&[f32]], indices: &mut [u32]) -> Box<BTreeNode> {
        let aabb = aabb_of(columns, indices);
        let count = indices.len();

        if count <= LEAF_SIZE {
            return Box::new(BTreeNode {
                count,
                aabb,
                indices: indices.to_vec(),
                left: None,
                right: None,
            });
        }

        let axis = aabb.largest_axis();
        let mid = count >> 1;
        quickselect(columns[axis], indices, mid);

        let (left_half, right_half) = indices.split_at_mut(mid);
        let left = Self::recurse(columns, left_half);
        let right = Self::recurse(columns, right_half);

        Box::new(BTreeNode {
            count: left.count + right.count,
            aabb,
            indices: Vec::new(),
            left: Some(left),
            right: Some(right),
        })
    }

    /// Row indices of every leaf under `node`, in tree order.
    pub fn collect_indices(node: &BTreeNode, out: &mut Vec<u32>) {
        if node.is_leaf() {
            out.extend_from_slice(&node.indices);
            return;
        }
        if let Some(left) = &node.left {
            Self::collect_indices(left, out);
        }
        if let Some(right) = &node.right {
            Self::collect_indices(right, out);
        }
    }

    pub fn dims(&self) -> usize {
        self.columns.len()
    }
}
