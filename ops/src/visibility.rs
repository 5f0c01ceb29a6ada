//! Visibility ordering.
//!
//! A splat's visual weight is its linear opacity times the volume of its
//! one-sigma ellipsoid. Sorting descending puts the splats that dominate a
//! rendered frame first, which is how coarse detail levels get picked.

use gsplat_core::{DataTable, Result};
use gsplat_maths::sigmoid;

/// Reorder `indices` so the most visible splats come first.
pub fn sort_by_visibility(table: &DataTable, indices: &mut [u32]) -> Result<()> {
    if indices.is_empty() {
        return Ok(());
    }

    let opacity = table.column_by_name("opacity")?.as_f32()?;
    let scale_0 = table.column_by_name("scale_0")?.as_f32()?;
    let scale_1 = table.column_by_name("scale_1")?.as_f32()?;
    let scale_2 = table.column_by_name("scale_2")?.as_f32()?;

    let scores: Vec<f32> = indices
        .iter()
        .map(|&ri| {
            let i = ri as usize;
            // volume of the scale ellipsoid up to a constant factor:
            // exp(s0) * exp(s1) * exp(s2)
            let volume = (scale_0[i] + scale_1[i] + scale_2[i]).exp();
            sigmoid(opacity[i]) * volume
        })
        .collect();

    let mut order: Vec<u32> = (0..indices.len() as u32).collect();
    order.sort_by(|&a, &b| {
        scores[b as usize]
            .partial_cmp(&scores[a as usize])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let sorted: Vec<u32> = order.iter().map(|&i| indices[i as usize]).collect();
    indices.copy_from_slice(&sorted);
    Ok(())
}
