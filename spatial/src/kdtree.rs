//! Balanced k-d tree over a table of centroids.
//!
//! The table's column count is the dimension. Levels rotate through the
//! axes; each node holds the median row of its subrange.

use gsplat_core::{DataTable, Result};

pub struct KdTree<'a> {
    columns: Vec<&'a [f32]>,
    root: Option<Box<Node>>,
}

struct Node {
    index: u32,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

struct Search<'q, 'f> {
    point: &'q [f32],
    filter: Option<&'f dyn Fn(u32) -> bool>,
    best_dist2: f32,
    best_index: Option<u32>,
    visited: usize,
}

impl<'a> KdTree<'a> {
    pub fn new(centroids: &'a DataTable) -> Result<KdTree<'a>> {
        let columns: Vec<&[f32]> = centroids
            .columns()
            .iter()
            .map(|c| c.as_f32())
            .collect::<Result<_>>()?;

        let mut indices: Vec<u32> = (0..centroids.num_rows() as u32).collect();
        let root = Self::build(&columns, &mut indices, 0);
        Ok(KdTree { columns, root })
    }

    fn build(columns: &[&[f32]], indices: &mut [u32], depth: usize) -> Option<Box<Node>> {
        if indices.is_empty() {
            return None;
        }
        let axis = depth % columns.len();
        let values = columns[axis];
        indices.sort_by(|&a, &b| {
            values[a as usize]
                .partial_cmp(&values[b as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = indices.len() >> 1;
        let index = indices[mid];
        let (left_half, right_half) = indices.split_at_mut(mid);
        let left = Self::build(columns, left_half, depth + 1);
        let right = Self::build(columns, &mut right_half[1..], depth + 1);

        Some(Box::new(Node { index, left, right }))
    }

    fn distance2(&self, index: u32, point: &[f32]) -> f32 {
        self.columns
            .iter()
            .zip(point)
            .map(|(col, &p)| {
                let d = col[index as usize] - p;
                d * d
            })
            .sum()
    }

    /// Nearest centroid to `point`, optionally restricted to rows accepted
    /// by `filter`. Returns `(row index, squared distance, visited count)`;
    /// the index is `None` when the tree is empty or everything is filtered.
    pub fn find_nearest(
        &self,
        point: &[f32],
        filter: Option<&dyn Fn(u32) -> bool>,
    ) -> (Option<u32>, f32, usize) {
        let mut search = Search {
            point,
            filter,
            best_dist2: f32::INFINITY,
            best_index: None,
            visited: 0,
        };
        if let Some(root) = &self.root {
            self.recurse(root, 0, &mut search);
        }
        (search.best_index, search.best_dist2, search.visited)
    }

    fn recurse(&self, node: &Node, depth: usize, search: &mut Search) {
        let axis = depth % self.columns.len();
        let split_value = self.columns[axis][node.index as usize];
        let axis_dist = search.point[axis] - split_value;

        search.visited += 1;

        // descend the side the query point lies on first
        let (near, far) = if axis_dist > 0.0 {
            (&node.right, &node.left)
        } else {
            (&node.left, &node.right)
        };

        if let Some(child) = near {
            self.recurse(child, depth + 1, search);
        }

        if search.filter.map_or(true, |f| f(node.index)) {
            let d2 = self.distance2(node.index, search.point);
            if d2 < search.best_dist2 {
                search.best_dist2 = d2;
                search.best_index = Some(node.index);
            }
        }

        // the far side can only help if the splitting plane is closer than
        // the best match so far
        if axis_dist * axis_dist < search.best_dist2 {
            if let Some(child) = far {
                self.recurse(child, depth + 1, search);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsplat_core::Column;

    fn centroid_table(points: &[[f32; 3]]) -> DataTable {
        DataTable::new(vec![
            Column::new("x", points.iter().map(|p| p[0]).collect::<Vec<_>>()),
            Column::new("y", points.iter().map(|p| p[1]).collect::<Vec<_>>()),
            Column::new("z", points.iter().map(|p| p[2]).collect::<Vec<_>>()),
        ])
        .unwrap()
    }

    fn brute_force(points: &[[f32; 3]], q: &[f32; 3]) -> (u32, f32) {
        let mut best = (0u32, f32::INFINITY);
        for (i, p) in points.iter().enumerate() {
            let d2 = (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2);
            if d2 < best.1 {
                best = (i as u32, d2);
            }
        }
        best
    }

    #[test]
    fn nearest_matches_brute_force() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<[f32; 3]> = (0..200)
            .map(|_| [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)])
            .collect();
        let table = centroid_table(&points);
        let tree = KdTree::new(&table).unwrap();

        for _ in 0..50 {
            let q = [
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-6.0..6.0),
                rng.gen_range(-6.0..6.0),
            ];
            let (idx, d2, visited) = tree.find_nearest(&q, None);
            let (want_idx, want_d2) = brute_force(&points, &q);
            assert_eq!(idx, Some(want_idx));
            assert!((d2 - want_d2).abs() < 1e-5);
            assert!(visited <= points.len());
        }
    }

    #[test]
    fn filter_skips_rejected_rows() {
        let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let table = centroid_table(&points);
        let tree = KdTree::new(&table).unwrap();

        let (idx, _, _) = tree.find_nearest(&[0.1, 0.0, 0.0], None);
        assert_eq!(idx, Some(0));

        let reject_zero = |i: u32| i != 0;
        let (idx, d2, _) = tree.find_nearest(&[0.1, 0.0, 0.0], Some(&reject_zero));
        assert_eq!(idx, Some(1));
        assert!((d2 - 0.81).abs() < 1e-6);
    }

    #[test]
    fn empty_tree() {
        let table = centroid_table(&[]);
        let tree = KdTree::new(&table).unwrap();
        let (idx, d2, visited) = tree.find_nearest(&[0.0, 0.0, 0.0], None);
        assert_eq!(idx, None);
        assert!(d2.is_infinite());
        assert_eq!(visited, 0);
    }
}
