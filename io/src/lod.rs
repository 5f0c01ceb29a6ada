//! Level-of-detail packer.
//!
//! Carves the scene into spatial chunks with a median-split tree, bins each
//! chunk's rows by their `lod` value into capped "file units", then writes
//! every unit as its own SOG bundle on the rayon pool. The manifest
//! (`lod-meta.json`) records the chunk tree with per-LOD file references so
//! a streaming renderer can fetch only what it needs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gsplat_core::{DataTable, Result as CoreResult};
use gsplat_spatial::{sort_morton_order_table, BTree, BTreeNode};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::Serialize;

use crate::sog::{write_sog, SogOptions};
use crate::{IoError, Result};

#[derive(Debug, Clone)]
pub struct LodOptions {
    /// Write units as `.sog` bundles instead of unbundled directories.
    pub bundle: bool,
    /// K-means iterations handed to the SOG writer.
    pub iterations: usize,
    /// Unit capacity in thousands of splats.
    pub chunk_count: usize,
    /// Spatial cell size in world units.
    pub chunk_extent: f32,
}

impl Default for LodOptions {
    fn default() -> Self {
        LodOptions {
            bundle: true,
            iterations: 10,
            chunk_count: 512,
            chunk_extent: 16.0,
        }
    }
}

#[derive(Serialize)]
struct BoundJson {
    min: [f32; 3],
    max: [f32; 3],
}

#[derive(Serialize)]
struct LodRef {
    file: usize,
    offset: usize,
    count: usize,
}

#[derive(Serialize)]
struct TreeNode {
    bound: BoundJson,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    lods: BTreeMap<String, LodRef>,
}

#[derive(Serialize)]
struct LodMeta {
    #[serde(rename = "lodLevels")]
    lod_levels: usize,
    environment: Option<String>,
    filenames: Vec<String>,
    tree: TreeNode,
}

/// Bounding box of the selected splats from their rotated one-sigma boxes.
fn calc_bound(table: &DataTable, indices: &[u32]) -> CoreResult<BoundJson> {
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

    let mut min = Vector3::repeat(f32::INFINITY);
    let mut max = Vector3::repeat(f32::NEG_INFINITY);

    for &index in indices {
        let i = index as usize;
        let rot = gsplat_spatial::gaussian_aabb::rotation_matrix(rw[i], rx[i], ry[i], rz[i]);
        let position = Vector3::new(x[i], y[i], z[i]);
        let half = Vector3::new(sx[i].exp(), sy[i].exp(), sz[i].exp());

        for corner in 0..8u32 {
            let local = Vector3::new(
                if corner & 1 != 0 { half.x } else { -half.x },
                if corner & 2 != 0 { half.y } else { -half.y },
                if corner & 4 != 0 { half.z } else { -half.z },
            );
            let world = rot * local + position;
            if world.iter().all(|v| v.is_finite()) {
                min = min.inf(&world);
                max = max.sup(&world);
            }
        }
    }

    Ok(BoundJson {
        min: [min.x, min.y, min.z],
        max: [max.x, max.y, max.z],
    })
}

fn union(a: &BoundJson, b: &BoundJson) -> BoundJson {
    BoundJson {
        min: [
            a.min[0].min(b.min[0]),
            a.min[1].min(b.min[1]),
            a.min[2].min(b.min[2]),
        ],
        max: [
            a.max[0].max(b.max[0]),
            a.max[1].max(b.max[1]),
            a.max[2].max(b.max[2]),
        ],
    }
}

fn unit_filename(lod: i32, file_index: usize, bundle: bool) -> String {
    if bundle {
        format!("{lod}_{file_index}.sog")
    } else {
        format!("{lod}_{file_index}/meta.json")
    }
}

/// Mutable bookkeeping for the tree walk: every unit is a list of index
/// runs, capped at `bin_size` rows.
struct Packer<'a> {
    table: &'a DataTable,
    lod: &'a [f32],
    bin_size: usize,
    chunk_extent: f32,
    bundle: bool,
    /// lod level -> list of file units, each a list of index runs
    lod_files: BTreeMap<i32, Vec<Vec<Vec<u32>>>>,
    filenames: Vec<String>,
    lod_levels: usize,
}

impl Packer<'_> {
    fn build(&mut self, node: &BTreeNode) -> CoreResult<TreeNode> {
        if !node.is_leaf()
            && node.count > self.bin_size
            && node.aabb.largest_dim() > self.chunk_extent
        {
            let left = self.build(node.left.as_ref().expect("interior node has children"))?;
            let right = self.build(node.right.as_ref().expect("interior node has children"))?;
            let bound = union(&left.bound, &right.bound);
            return Ok(TreeNode {
                bound,
                children: vec![left, right],
                lods: BTreeMap::new(),
            });
        }

        // leaf group: bin all rows under this subtree by their lod level
        let mut all_indices = Vec::with_capacity(node.count);
        BTree::collect_indices(node, &mut all_indices);

        let mut bins: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
        for &index in &all_indices {
            let level = self.lod[index as usize].round() as i32;
            bins.entry(level).or_default().push(index);
        }

        let mut lods = BTreeMap::new();
        for (level, indices) in &bins {
            let files = self.lod_files.entry(*level).or_insert_with(|| vec![Vec::new()]);

            let mut unit_rows: usize = files.last().map_or(0, |u| u.iter().map(Vec::len).sum());
            if unit_rows >= self.bin_size {
                files.push(Vec::new());
                unit_rows = 0;
            }

            // the group starts in the current unit; overflow spills into
            // fresh units so no unit ever exceeds the cap
            let first_file_index = files.len() - 1;
            let first_offset = unit_rows;

            let mut remaining: &[u32] = indices;
            while !remaining.is_empty() {
                let capacity = self.bin_size - unit_rows;
                if capacity == 0 {
                    files.push(Vec::new());
                    unit_rows = 0;
                    continue;
                }
                let take = remaining.len().min(capacity);
                files
                    .last_mut()
                    .expect("at least one unit per level")
                    .push(remaining[..take].to_vec());
                unit_rows += take;
                remaining = &remaining[take..];
            }

            let filename = unit_filename(*level, first_file_index, self.bundle);
            let file_slot = match self.filenames.iter().position(|f| f == &filename) {
                Some(i) => i,
                None => {
                    self.filenames.push(filename);
                    self.filenames.len() - 1
                }
            };

            lods.insert(
                level.to_string(),
                LodRef {
                    file: file_slot,
                    offset: first_offset,
                    count: indices.len(),
                },
            );

            self.lod_levels = self.lod_levels.max((*level + 1).max(0) as usize);
        }

        Ok(TreeNode {
            bound: calc_bound(self.table, &all_indices)?,
            children: Vec::new(),
            lods,
        })
    }
}

/// Write the LOD tree: `lod-meta.json` at `output`, one SOG per file unit
/// beside it, and the environment scene when present.
pub fn write_lod(
    output: &Path,
    table: &DataTable,
    env_table: Option<&DataTable>,
    options: &LodOptions,
) -> Result<()> {
    let output_dir = output.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    std::fs::create_dir_all(&output_dir)?;

    let sog_options = SogOptions {
        bundle: options.bundle,
        iterations: options.iterations,
        reorder: true,
    };

    // environment splats render independently of LOD selection
    let environment = match env_table {
        Some(env) if env.num_rows() > 0 => {
            let name = if options.bundle { "env.sog" } else { "env/meta.json" };
            let path = output_dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "writing environment");
            write_sog(&path, env, &sog_options)?;
            Some(name.to_string())
        }
        _ => None,
    };

    let centroids = table.clone_subset(&["x", "y", "z"])?;
    let btree = BTree::new(&centroids)?;
    let lod = table.column_by_name("lod")?.as_f32()?;

    let mut packer = Packer {
        table,
        lod,
        bin_size: options.chunk_count * 1024,
        chunk_extent: options.chunk_extent,
        bundle: options.bundle,
        lod_files: BTreeMap::new(),
        filenames: Vec::new(),
        lod_levels: 0,
    };
    let tree = packer.build(&btree.root)?;

    // overflow units may not be referenced by any leaf; the manifest still
    // lists every file written
    for (level, files) in &packer.lod_files {
        for (file_index, runs) in files.iter().enumerate() {
            if runs.is_empty() {
                continue;
            }
            let filename = unit_filename(*level, file_index, options.bundle);
            if !packer.filenames.contains(&filename) {
                packer.filenames.push(filename);
            }
        }
    }

    let meta = LodMeta {
        lod_levels: packer.lod_levels,
        environment,
        filenames: packer.filenames,
        tree,
    };
    std::fs::write(output, serde_json::to_vec(&meta)?)?;

    // write file units on the thread pool; each job owns its permuted
    // sub-table, so workers share nothing mutable
    struct UnitJob {
        path: PathBuf,
        runs: Vec<Vec<u32>>,
    }

    let mut jobs = Vec::new();
    for (level, files) in packer.lod_files {
        for (file_index, runs) in files.into_iter().enumerate() {
            if runs.is_empty() {
                continue;
            }
            let path = output_dir.join(unit_filename(level, file_index, options.bundle));
            jobs.push(UnitJob { path, runs });
        }
    }

    let unit_options = SogOptions {
        bundle: options.bundle,
        iterations: options.iterations,
        reorder: false,
    };

    jobs.into_par_iter().try_for_each(|job| -> Result<()> {
        // morton-sort within each run so rows stay locally coherent, then
        // permute once over the concatenation
        let mut indices = Vec::with_capacity(job.runs.iter().map(Vec::len).sum());
        for run in &job.runs {
            let start = indices.len();
            indices.extend_from_slice(run);
            sort_morton_order_table(table, &mut indices[start..])
                .map_err(IoError::Core)?;
        }

        let unit = table.permute_rows(&indices).map_err(IoError::Core)?;
        if let Some(parent) = job.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %job.path.display(), rows = unit.num_rows(), "writing unit");
        write_sog(&job.path, &unit, &unit_options)
    })?;

    Ok(())
}
