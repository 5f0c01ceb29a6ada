//! Sparse voxel octree container.
//!
//! Two files per scene: `<name>.voxel.json` with grid metadata and array
//! sizes, and `<name>.voxel.bin` holding the Laine-Karras node array
//! followed by the mixed-leaf masks, both as little-endian u32.

use std::io::Write;
use std::path::{Path, PathBuf};

use gsplat_spatial::{Bounds, SparseOctree};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{IoError, Result};

#[derive(Serialize, Deserialize)]
struct BoundsMeta {
    min: [f64; 3],
    max: [f64; 3],
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoxelMeta {
    version: String,
    grid_bounds: BoundsMeta,
    scene_bounds: BoundsMeta,
    voxel_resolution: f64,
    leaf_size: u32,
    tree_depth: usize,
    num_interior_nodes: u32,
    num_mixed_leaves: u32,
    node_count: usize,
    leaf_data_count: usize,
}

fn bounds_meta(bounds: &Bounds) -> BoundsMeta {
    BoundsMeta {
        min: [bounds.min.x, bounds.min.y, bounds.min.z],
        max: [bounds.max.x, bounds.max.y, bounds.max.z],
    }
}

fn bin_path(json_path: &Path) -> Result<PathBuf> {
    let name = json_path.to_string_lossy();
    let stripped = name.strip_suffix(".voxel.json").ok_or_else(|| {
        IoError::UnsupportedFormat(format!("voxel output must end in .voxel.json: {name}"))
    })?;
    Ok(PathBuf::from(format!("{stripped}.voxel.bin")))
}

/// Write the octree as a `.voxel.json` / `.voxel.bin` pair.
pub fn write_voxel(json_path: &Path, octree: &SparseOctree) -> Result<()> {
    let bin = bin_path(json_path)?;
    let meta = VoxelMeta {
        version: "1.0".to_string(),
        grid_bounds: bounds_meta(&octree.grid_bounds),
        scene_bounds: bounds_meta(&octree.scene_bounds),
        voxel_resolution: octree.voxel_resolution,
        leaf_size: octree.leaf_size,
        tree_depth: octree.tree_depth,
        num_interior_nodes: octree.num_interior_nodes,
        num_mixed_leaves: octree.num_mixed_leaves,
        node_count: octree.nodes.len(),
        leaf_data_count: octree.leaf_data.len(),
    };
    std::fs::write(json_path, serde_json::to_vec(&meta)?)?;

    let file = std::fs::File::create(bin)?;
    let mut writer = std::io::BufWriter::new(file);
    for &word in octree.nodes.iter().chain(&octree.leaf_data) {
        writer.write_all(&word.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a `.voxel.json` / `.voxel.bin` pair back into a [`SparseOctree`].
pub fn read_voxel(json_path: &Path) -> Result<SparseOctree> {
    let meta: VoxelMeta = serde_json::from_slice(&std::fs::read(json_path)?)?;

    let bytes = std::fs::read(bin_path(json_path)?)?;
    let expected = (meta.node_count + meta.leaf_data_count) * 4;
    if bytes.len() != expected {
        return Err(IoError::InvalidData(format!(
            "voxel data for '{}' is {} bytes, expected {expected}",
            json_path.display(),
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let (nodes, leaf_data) = words.split_at(meta.node_count);

    Ok(SparseOctree {
        grid_bounds: Bounds {
            min: Vector3::from(meta.grid_bounds.min),
            max: Vector3::from(meta.grid_bounds.max),
        },
        scene_bounds: Bounds {
            min: Vector3::from(meta.scene_bounds.min),
            max: Vector3::from(meta.scene_bounds.max),
        },
        voxel_resolution: meta.voxel_resolution,
        leaf_size: meta.leaf_size,
        tree_depth: meta.tree_depth,
        num_interior_nodes: meta.num_interior_nodes,
        num_mixed_leaves: meta.num_mixed_leaves,
        nodes: nodes.to_vec(),
        leaf_data: leaf_data.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsplat_spatial::{build_sparse_octree, BlockAccumulator};

    fn small_octree() -> SparseOctree {
        let mut acc = BlockAccumulator::default();
        acc.add_block(0, 0b1011, 0);
        acc.add_block(1, u32::MAX, u32::MAX);
        acc.add_block(9, 1, 1 << 31);
        let bounds = Bounds {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(8.0, 8.0, 8.0),
        };
        build_sparse_octree(&acc, bounds, bounds, 1.0)
    }

    #[test]
    fn round_trip_preserves_arrays() {
        let octree = small_octree();
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("scene.voxel.json");

        write_voxel(&json, &octree).unwrap();
        assert!(dir.path().join("scene.voxel.bin").exists());

        let restored = read_voxel(&json).unwrap();
        assert_eq!(restored.nodes, octree.nodes);
        assert_eq!(restored.leaf_data, octree.leaf_data);
        assert_eq!(restored.tree_depth, octree.tree_depth);
        assert_eq!(restored.num_interior_nodes, octree.num_interior_nodes);
        assert_eq!(restored.num_mixed_leaves, octree.num_mixed_leaves);
        assert_eq!(restored.grid_bounds, octree.grid_bounds);
    }

    #[test]
    fn rejects_truncated_binary() {
        let octree = small_octree();
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("scene.voxel.json");
        write_voxel(&json, &octree).unwrap();

        let bin = dir.path().join("scene.voxel.bin");
        let mut bytes = std::fs::read(&bin).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&bin, bytes).unwrap();

        assert!(matches!(read_voxel(&json), Err(IoError::InvalidData(_))));
    }

    #[test]
    fn rejects_wrong_extension() {
        let octree = small_octree();
        let dir = tempfile::tempdir().unwrap();
        let result = write_voxel(&dir.path().join("scene.json"), &octree);
        assert!(matches!(result, Err(IoError::UnsupportedFormat(_))));
    }
}
