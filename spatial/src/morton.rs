//! Morton (Z-order) reordering.
//!
//! Sorting row indices by a bit-interleaved quantization of their position
//! clusters spatially close splats, which is what makes the quantizing
//! writer's per-texture locality work.

use gsplat_core::{DataTable, Result};

/// Spread the low 10 bits of `x` so they occupy every third bit.
fn part_1_by_2(mut x: u32) -> u32 {
    x &= 0x0000_03ff;
    x = (x ^ (x << 16)) & 0xff00_00ff;
    x = (x ^ (x << 8)) & 0x0300_f00f;
    x = (x ^ (x << 4)) & 0x030c_30c3;
    x = (x ^ (x << 2)) & 0x0924_9249;
    x
}

/// 30-bit Morton code; bit layout `…z2y2x2 z1y1x1 z0y0x0`.
fn encode_morton3(x: u32, y: u32, z: u32) -> u32 {
    (part_1_by_2(z) << 2) | (part_1_by_2(y) << 1) | part_1_by_2(x)
}

/// Reorder `indices` (row indices into `x`/`y`/`z`) into Morton order.
///
/// The sort is stable: equal codes keep their pre-sort order. Runs of more
/// than 256 identical codes are recursively reordered over their own bounds,
/// which recovers locality inside dense cells. Non-finite or all-zero
/// extents leave the indices untouched.
pub fn sort_morton_order(x: &[f32], y: &[f32], z: &[f32], indices: &mut [u32]) {
    if indices.is_empty() {
        return;
    }

    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for &ri in indices.iter() {
        let p = [x[ri as usize], y[ri as usize], z[ri as usize]];
        for axis in 0..3 {
            if p[axis] < min[axis] {
                min[axis] = p[axis];
            }
            if p[axis] > max[axis] {
                max[axis] = p[axis];
            }
        }
    }

    let len = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
    if !len.iter().all(|e| e.is_finite()) {
        return;
    }
    if len.iter().all(|&e| e == 0.0) {
        return;
    }

    // zero-extent axes contribute zero bits
    let mul: Vec<f32> = len
        .iter()
        .map(|&e| if e == 0.0 { 0.0 } else { 1024.0 / e })
        .collect();

    let quantize = |v: f32, axis: usize| -> u32 {
        ((v - min[axis]) * mul[axis]).max(0.0).min(1023.0) as u32
    };

    let codes: Vec<u32> = indices
        .iter()
        .map(|&ri| {
            let i = ri as usize;
            encode_morton3(quantize(x[i], 0), quantize(y[i], 1), quantize(z[i], 2))
        })
        .collect();

    let mut order: Vec<u32> = (0..indices.len() as u32).collect();
    order.sort_by_key(|&i| codes[i as usize]);

    let sorted: Vec<u32> = order.iter().map(|&i| indices[i as usize]).collect();
    indices.copy_from_slice(&sorted);

    // refine dense cells whose quantized code collapsed
    let mut start = 0usize;
    while start < indices.len() {
        let code = codes[order[start] as usize];
        let mut end = start + 1;
        while end < indices.len() && codes[order[end] as usize] == code {
            end += 1;
        }
        if end - start > 256 {
            sort_morton_order(x, y, z, &mut indices[start..end]);
        }
        start = end;
    }
}

/// [`sort_morton_order`] reading positions from a table's `x`/`y`/`z`.
pub fn sort_morton_order_table(table: &DataTable, indices: &mut [u32]) -> Result<()> {
    let x = table.column_by_name("x")?.as_f32()?;
    let y = table.column_by_name("y")?.as_f32()?;
    let z = table.column_by_name("z")?.as_f32()?;
    sort_morton_order(x, y, z, indices);
    Ok(())
}

/// Spread the low 17 bits of `x` over every third bit of a u64.
fn part_1_by_2_wide(mut x: u64) -> u64 {
    x &= 0x1_ffff;
    x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

fn compact_1_by_2_wide(mut x: u64) -> u64 {
    x &= 0x1249_2492_4924_9249;
    x = (x ^ (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x ^ (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x ^ (x >> 8)) & 0x001f_0000_ff00_00ff;
    x = (x ^ (x >> 16)) & 0x001f_0000_0000_ffff;
    x = (x ^ (x >> 32)) & 0x1_ffff;
    x
}

/// Stateless block-coordinate codec: 17 bits per axis interleaved into a u64.
pub fn xyz_to_morton(x: u32, y: u32, z: u32) -> u64 {
    (part_1_by_2_wide(z as u64) << 2) | (part_1_by_2_wide(y as u64) << 1)
        | part_1_by_2_wide(x as u64)
}

/// Inverse of [`xyz_to_morton`].
pub fn morton_to_xyz(morton: u64) -> (u32, u32, u32) {
    (
        compact_1_by_2_wide(morton) as u32,
        compact_1_by_2_wide(morton >> 1) as u32,
        compact_1_by_2_wide(morton >> 2) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_a_permutation() {
        let x: Vec<f32> = (0..100).map(|i| ((i * 37) % 100) as f32).collect();
        let y: Vec<f32> = (0..100).map(|i| ((i * 11) % 100) as f32).collect();
        let z: Vec<f32> = (0..100).map(|i| ((i * 7) % 100) as f32).collect();
        let mut indices: Vec<u32> = (0..100).collect();
        sort_morton_order(&x, &y, &z, &mut indices);

        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn stable_for_equal_codes() {
        // all points identical: zero extents on every axis, order untouched
        let x = vec![1.0f32; 8];
        let y = vec![2.0f32; 8];
        let z = vec![3.0f32; 8];
        let mut indices: Vec<u32> = vec![5, 3, 1, 7, 0, 2, 4, 6];
        let original = indices.clone();
        sort_morton_order(&x, &y, &z, &mut indices);
        assert_eq!(indices, original);
    }

    #[test]
    fn stable_within_shared_cells() {
        // two groups, each of which collapses to a single Morton cell;
        // relative order within a group must be preserved
        let x = vec![0.0f32, 0.0, 1000.0, 1000.0];
        let y = vec![0.0f32; 4];
        let z = vec![0.0f32; 4];
        let mut indices: Vec<u32> = vec![3, 1, 2, 0];
        sort_morton_order(&x, &y, &z, &mut indices);
        assert_eq!(indices, vec![1, 0, 3, 2]);
    }

    #[test]
    fn non_finite_extent_is_a_no_op() {
        let x = vec![0.0f32, f32::NAN];
        let y = vec![0.0f32, 1.0];
        let z = vec![0.0f32, 1.0];
        let mut indices: Vec<u32> = vec![1, 0];
        sort_morton_order(&x, &y, &z, &mut indices);
        assert_eq!(indices, vec![1, 0]);
    }

    #[test]
    fn neighbors_sort_near_each_other() {
        // a line of points along x must come out in coordinate order
        let x: Vec<f32> = (0..32).map(|i| i as f32).collect();
        let y = vec![0.0f32; 32];
        let z = vec![0.0f32; 32];
        let mut indices: Vec<u32> = (0..32).rev().collect();
        sort_morton_order(&x, &y, &z, &mut indices);
        assert_eq!(indices, (0..32).collect::<Vec<u32>>());
    }

    #[test]
    fn block_codec_round_trips() {
        for &(x, y, z) in &[(0, 0, 0), (1, 2, 3), (131071, 0, 131071), (12345, 54321, 99999)] {
            assert_eq!(morton_to_xyz(xyz_to_morton(x, y, z)), (x, y, z));
        }
    }

    #[test]
    fn block_codec_bit_layout() {
        assert_eq!(xyz_to_morton(1, 0, 0), 0b001);
        assert_eq!(xyz_to_morton(0, 1, 0), 0b010);
        assert_eq!(xyz_to_morton(0, 0, 1), 0b100);
        assert_eq!(xyz_to_morton(2, 0, 0), 0b001000);
    }
}
