//! Spatial data structures over splat tables.
//!
//! Implements:
//! - Morton (Z-order) reordering of row indices
//! - A balanced k-d tree for nearest-neighbor queries
//! - A median-split bounding tree used to carve spatial chunks
//! - Per-splat 3-sigma extents and a BVH over them
//! - A sparse voxel octree in Laine-Karras layout
//!
//! All structures borrow the table they index; none of them outlive it.

pub mod btree;
pub mod gaussian_aabb;
pub mod gaussian_bvh;
pub mod kdtree;
pub mod morton;
pub mod octree;
pub mod voxelize;

#[cfg(test)]
mod tests_support;

pub use btree::{Aabb, BTree, BTreeNode};
pub use gaussian_aabb::{compute_gaussian_extents, GaussianExtents};
pub use gaussian_bvh::GaussianBvh;
pub use kdtree::KdTree;
pub use morton::{morton_to_xyz, sort_morton_order, sort_morton_order_table, xyz_to_morton};
pub use octree::{
    build_sparse_octree, filter_and_fill_blocks, BlockAccumulator, Bounds, SparseOctree,
    SOLID_LEAF_MARKER,
};
pub use voxelize::{voxelize_gaussians, VoxelizeResult};
