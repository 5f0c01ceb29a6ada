//! Lloyd k-means over table rows.
//!
//! The iteration count is a contract, not a convergence bound: callers pick
//! a quality/time trade-off and the loop runs exactly that many rounds.
//! Assignment is accelerated with a k-d tree over the current centroids.

use gsplat_core::{Column, DataTable, Result};
use gsplat_spatial::KdTree;
use rand::rngs::StdRng;
use rand::Rng;

pub struct KMeans {
    pub centroids: DataTable,
    pub labels: Vec<u32>,
}

/// Cluster the rows of `points` into `k` clusters.
///
/// With fewer rows than clusters the input is returned as its own codebook
/// with identity labels. 1-D tables seed centroids evenly over `[min, max]`;
/// higher dimensions seed from `k` distinct random rows. Empty clusters are
/// reseeded to a random row each round.
pub fn kmeans(points: &DataTable, k: usize, iterations: usize, rng: &mut StdRng) -> Result<KMeans> {
    let rows = points.num_rows();
    let dims = points.num_columns();

    if rows < k {
        return Ok(KMeans {
            centroids: points.deep_clone(),
            labels: (0..rows as u32).collect(),
        });
    }

    let data: Vec<&[f32]> = points
        .columns()
        .iter()
        .map(|c| c.as_f32())
        .collect::<Result<_>>()?;

    let mut centroids: Vec<Vec<f32>> = vec![vec![0.0; k]; dims];
    if dims == 1 {
        let col = data[0];
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in col {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        let denom = (k - 1).max(1) as f32;
        for (i, c) in centroids[0].iter_mut().enumerate() {
            *c = min + (max - min) * i as f32 / denom;
        }
    } else {
        let picks = rand::seq::index::sample(rng, rows, k);
        for (i, row) in picks.into_iter().enumerate() {
            for d in 0..dims {
                centroids[d][i] = data[d][row];
            }
        }
    }

    tracing::debug!(dims, rows, clusters = k, iterations, "running k-means");

    let mut labels = vec![0u32; rows];
    let mut point = vec![0.0f32; dims];

    for _ in 0..iterations {
        // assign each row to its nearest centroid
        let names: Vec<String> = (0..dims).map(|d| format!("c{d}")).collect();
        let centroid_table = DataTable::new(
            centroids
                .iter()
                .zip(&names)
                .map(|(col, name)| Column::new(name.clone(), col.clone()))
                .collect(),
        )?;
        let tree = KdTree::new(&centroid_table)?;

        for i in 0..rows {
            for d in 0..dims {
                point[d] = data[d][i];
            }
            let (best, _, _) = tree.find_nearest(&point, None);
            labels[i] = best.unwrap_or(0);
        }

        // move each centroid to the mean of its members
        let mut sums = vec![vec![0.0f64; k]; dims];
        let mut counts = vec![0usize; k];
        for i in 0..rows {
            let label = labels[i] as usize;
            counts[label] += 1;
            for d in 0..dims {
                sums[d][label] += data[d][i] as f64;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // reseed to a random row so the centroid stays in play
                let row = rng.gen_range(0..rows);
                for d in 0..dims {
                    centroids[d][c] = data[d][row];
                }
            } else {
                for d in 0..dims {
                    centroids[d][c] = (sums[d][c] / counts[c] as f64) as f32;
                }
            }
        }
    }

    let centroid_columns = centroids
        .into_iter()
        .zip(points.columns())
        .map(|(values, col)| Column::new(col.name.clone(), values))
        .collect();

    Ok(KMeans {
        centroids: DataTable::new(centroid_columns)?,
        labels,
    })
}

/// Quantize a multi-column f32 table against a single 256-entry codebook.
///
/// The table's values are read as one long 1-D sequence (all rows of column
/// 0, then column 1, ...), clustered into 256 centroids which are then
/// sorted ascending, and the labels are remapped so that label 0 names the
/// smallest centroid. Returns the sorted codebook and a table of u8 label
/// columns mirroring the input's columns.
pub fn cluster_1d(
    table: &DataTable,
    iterations: usize,
    rng: &mut StdRng,
) -> Result<(Vec<f32>, DataTable)> {
    let rows = table.num_rows();
    let cols = table.num_columns();

    let mut data = Vec::with_capacity(rows * cols);
    for column in table.columns() {
        data.extend_from_slice(column.as_f32()?);
    }

    let flat = DataTable::new(vec![Column::new("data", data)])?;
    let result = kmeans(&flat, 256, iterations, rng)?;

    let mut codebook = result.centroids.column(0).as_f32()?.to_vec();
    let mut labels = result.labels;

    // order the codebook smallest to largest and remap labels through the
    // inverse permutation
    let mut order: Vec<usize> = (0..codebook.len()).collect();
    order.sort_by(|&a, &b| codebook[a].partial_cmp(&codebook[b]).unwrap_or(std::cmp::Ordering::Equal));

    let sorted: Vec<f32> = order.iter().map(|&i| codebook[i]).collect();
    let mut inverse = vec![0u32; order.len()];
    for (new_index, &old_index) in order.iter().enumerate() {
        inverse[old_index] = new_index as u32;
    }
    for label in &mut labels {
        *label = inverse[*label as usize];
    }
    codebook = sorted;

    let mut label_columns = Vec::with_capacity(cols);
    for (j, column) in table.columns().iter().enumerate() {
        let slice = &labels[j * rows..(j + 1) * rows];
        let bytes: Vec<u8> = slice.iter().map(|&l| l as u8).collect();
        label_columns.push(Column::new(column.name.clone(), bytes));
    }

    Ok((codebook, DataTable::new(label_columns)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1234)
    }

    #[test]
    fn fewer_rows_than_clusters_returns_identity() {
        let table = DataTable::new(vec![Column::new("v", vec![5.0f32, 1.0, 3.0])]).unwrap();
        let result = kmeans(&table, 8, 4, &mut rng()).unwrap();
        assert_eq!(result.labels, vec![0, 1, 2]);
        assert_eq!(result.centroids.num_rows(), 3);
    }

    #[test]
    fn separated_clusters_are_found() {
        // two tight groups far apart; k = 2 must recover them
        let mut xs: Vec<f32> = Vec::new();
        let mut ys: Vec<f32> = Vec::new();
        for i in 0..50 {
            xs.push(0.0 + (i % 5) as f32 * 0.01);
            ys.push(0.0);
        }
        for i in 0..50 {
            xs.push(100.0 + (i % 5) as f32 * 0.01);
            ys.push(100.0);
        }
        let table =
            DataTable::new(vec![Column::new("x", xs), Column::new("y", ys)]).unwrap();
        let result = kmeans(&table, 2, 10, &mut rng()).unwrap();

        assert_eq!(result.labels.len(), 100);
        let first = result.labels[0];
        assert!(result.labels[..50].iter().all(|&l| l == first));
        let second = result.labels[50];
        assert_ne!(first, second);
        assert!(result.labels[50..].iter().all(|&l| l == second));
    }

    #[test]
    fn one_dimensional_seeding_spans_range() {
        let values: Vec<f32> = (0..1000).map(|i| (i % 97) as f32).collect();
        let table = DataTable::new(vec![Column::new("v", values)]).unwrap();
        let result = kmeans(&table, 16, 4, &mut rng()).unwrap();
        assert_eq!(result.centroids.num_rows(), 16);
        let c = result.centroids.column(0).as_f32().unwrap();
        assert!(c.iter().all(|v| (0.0..=96.0).contains(v)));
    }

    #[test]
    fn cluster_1d_codebook_is_sorted_and_labels_remapped() {
        let mut r = rng();
        let a: Vec<f32> = (0..400).map(|i| ((i * 31) % 256) as f32).collect();
        let b: Vec<f32> = (0..400).map(|i| ((i * 17) % 256) as f32).collect();
        let c: Vec<f32> = (0..400).map(|i| ((i * 7) % 256) as f32).collect();
        let table = DataTable::new(vec![
            Column::new("scale_0", a.clone()),
            Column::new("scale_1", b.clone()),
            Column::new("scale_2", c.clone()),
        ])
        .unwrap();

        let (codebook, labels) = cluster_1d(&table, 8, &mut r).unwrap();

        // non-decreasing codebook
        assert!(codebook.windows(2).all(|w| w[0] <= w[1]));

        // labels reshape back to the input's columns
        assert_eq!(labels.num_columns(), 3);
        assert_eq!(labels.num_rows(), 400);
        assert_eq!(labels.column(0).name, "scale_0");

        // reconstruction through the codebook lands near the input
        let l0 = labels.column(0).as_u8().unwrap();
        for i in 0..400 {
            let rec = codebook[l0[i] as usize];
            assert!((rec - a[i]).abs() < 16.0, "reconstruction too far off");
        }
    }
}
