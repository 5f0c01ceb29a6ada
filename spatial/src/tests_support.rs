//! Shared helpers for this crate's tests.

use gsplat_core::{Column, DataTable};

/// Minimal splat table from `(position, rotation wxyz, log-scale)` rows.
pub fn splat_table(rows: &[([f32; 3], [f32; 4], [f32; 3])]) -> DataTable {
    let col = |f: &dyn Fn(&([f32; 3], [f32; 4], [f32; 3])) -> f32| -> Vec<f32> {
        rows.iter().map(f).collect()
    };
    DataTable::new(vec![
        Column::new("x", col(&|r| r.0[0])),
        Column::new("y", col(&|r| r.0[1])),
        Column::new("z", col(&|r| r.0[2])),
        Column::new("rot_0", col(&|r| r.1[0])),
        Column::new("rot_1", col(&|r| r.1[1])),
        Column::new("rot_2", col(&|r| r.1[2])),
        Column::new("rot_3", col(&|r| r.1[3])),
        Column::new("scale_0", col(&|r| r.2[0])),
        Column::new("scale_1", col(&|r| r.2[1])),
        Column::new("scale_2", col(&|r| r.2[2])),
    ])
    .unwrap()
}
