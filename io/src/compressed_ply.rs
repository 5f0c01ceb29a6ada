//! The compressed PLY variant: 256-vertex chunks with packed attributes.
//!
//! Each chunk stores per-axis min/max for position, log-scale and DC color
//! as 18 floats; vertices pack into four u32 words (11/10/11 position,
//! 2+10+10+10 largest-component rotation, 11/10/11 scale, 8/8/8/8 color
//! with sigmoid opacity). An optional `sh` element carries the higher-band
//! coefficients as u8.

use std::path::Path;

use gsplat_core::{detect_sh_bands, sh_coeffs_for_bands, Column, ColumnType, DataTable, SH_C0};
use gsplat_maths::{inverse_sigmoid, sigmoid};
use gsplat_spatial::sort_morton_order_table;

use crate::ply::{write_ply, PlyData, PlyElementData};
use crate::{IoError, Result};

const CHUNK_SIZE: usize = 256;
const SQRT_HALF: f32 = std::f32::consts::FRAC_1_SQRT_2;

const CHUNK_PROPERTIES: [&str; 18] = [
    "min_x",
    "min_y",
    "min_z",
    "max_x",
    "max_y",
    "max_z",
    "min_scale_x",
    "min_scale_y",
    "min_scale_z",
    "max_scale_x",
    "max_scale_y",
    "max_scale_z",
    "min_r",
    "min_g",
    "min_b",
    "max_r",
    "max_g",
    "max_b",
];

const VERTEX_PROPERTIES: [&str; 4] = [
    "packed_position",
    "packed_rotation",
    "packed_scale",
    "packed_color",
];

fn has_shape(table: &DataTable, names: &[&str], ty: ColumnType) -> bool {
    names.iter().all(|name| {
        table
            .column_by_name(name)
            .map(|c| c.ty() == ty)
            .unwrap_or(false)
    })
}

/// True when the PLY carries the chunked compressed layout.
pub fn is_compressed_ply(ply: &PlyData) -> bool {
    let Some(chunk) = ply.element("chunk") else {
        return false;
    };
    let Some(vertex) = ply.element("vertex") else {
        return false;
    };
    if !has_shape(&chunk.table, &CHUNK_PROPERTIES, ColumnType::F32) {
        return false;
    }
    if !has_shape(&vertex.table, &VERTEX_PROPERTIES, ColumnType::U32) {
        return false;
    }
    let expected_chunks = vertex.table.num_rows().div_ceil(CHUNK_SIZE);
    if expected_chunks != chunk.table.num_rows() {
        return false;
    }
    if let Some(sh) = ply.element("sh") {
        if sh.table.num_rows() != vertex.table.num_rows() {
            return false;
        }
        if !sh
            .table
            .columns()
            .iter()
            .all(|c| c.name.starts_with("f_rest_") && c.ty() == ColumnType::U8)
        {
            return false;
        }
    }
    true
}

fn normalize(x: f32, min: f32, max: f32) -> f32 {
    if x <= min {
        return 0.0;
    }
    if x >= max {
        return 1.0;
    }
    let range = max - min;
    if range < 1e-5 {
        0.0
    } else {
        (x - min) / range
    }
}

fn lerp(min: f32, max: f32, t: f32) -> f32 {
    min + (max - min) * t
}

fn pack_unorm(value: f32, bits: u32) -> u32 {
    let t = (1u32 << bits) - 1;
    ((value * t as f32 + 0.5).floor()).clamp(0.0, t as f32) as u32
}

fn pack_111011(x: f32, y: f32, z: f32) -> u32 {
    (pack_unorm(x, 11) << 21) | (pack_unorm(y, 10) << 11) | pack_unorm(z, 11)
}

fn pack_8888(x: f32, y: f32, z: f32, w: f32) -> u32 {
    (pack_unorm(x, 8) << 24) | (pack_unorm(y, 8) << 16) | (pack_unorm(z, 8) << 8) | pack_unorm(w, 8)
}

/// Largest-component quaternion packing: two tag bits then three 10-bit
/// fields holding the remaining components scaled by `sqrt(1/2)`.
fn pack_rotation(w: f32, x: f32, y: f32, z: f32) -> u32 {
    let mut a = [x, y, z, w];
    let len = (a.iter().map(|v| v * v).sum::<f32>()).sqrt();
    if len > 0.0 {
        for v in &mut a {
            *v /= len;
        }
    }

    let mut largest = 0usize;
    for i in 1..4 {
        if a[i].abs() > a[largest].abs() {
            largest = i;
        }
    }
    if a[largest] < 0.0 {
        for v in &mut a {
            *v = -*v;
        }
    }

    let mut result = largest as u32;
    for (i, &v) in a.iter().enumerate() {
        if i != largest {
            result = (result << 10) | pack_unorm(v * SQRT_HALF + 0.5, 10);
        }
    }
    result
}

fn unpack_rotation(packed: u32) -> (f32, f32, f32, f32) {
    let largest = (packed >> 30) as usize;
    let fields = [
        ((packed >> 20) & 0x3ff) as f32,
        ((packed >> 10) & 0x3ff) as f32,
        (packed & 0x3ff) as f32,
    ];

    let mut a = [0.0f32; 4];
    let mut f = 0usize;
    for (i, slot) in a.iter_mut().enumerate() {
        if i != largest {
            *slot = (fields[f] / 1023.0 - 0.5) / SQRT_HALF;
            f += 1;
        }
    }
    let t = 1.0 - a.iter().map(|v| v * v).sum::<f32>();
    a[largest] = t.max(0.0).sqrt();

    (a[3], a[0], a[1], a[2])
}

fn min_max(values: &[f32]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    if values.is_empty() {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// Expand a compressed PLY back into the canonical splat table.
pub fn decompress_ply(ply: &PlyData) -> Result<DataTable> {
    let chunk = ply
        .element("chunk")
        .ok_or_else(|| IoError::InvalidData("missing 'chunk' element".into()))?;
    let vertex = ply
        .element("vertex")
        .ok_or_else(|| IoError::InvalidData("missing 'vertex' element".into()))?;

    fn f32_col<'t>(table: &'t DataTable, name: &str) -> Result<&'t [f32]> {
        Ok(table.column_by_name(name)?.as_f32()?)
    }
    let min_x = f32_col(&chunk.table, "min_x")?;
    let min_y = f32_col(&chunk.table, "min_y")?;
    let min_z = f32_col(&chunk.table, "min_z")?;
    let max_x = f32_col(&chunk.table, "max_x")?;
    let max_y = f32_col(&chunk.table, "max_y")?;
    let max_z = f32_col(&chunk.table, "max_z")?;
    let min_sx = f32_col(&chunk.table, "min_scale_x")?;
    let min_sy = f32_col(&chunk.table, "min_scale_y")?;
    let min_sz = f32_col(&chunk.table, "min_scale_z")?;
    let max_sx = f32_col(&chunk.table, "max_scale_x")?;
    let max_sy = f32_col(&chunk.table, "max_scale_y")?;
    let max_sz = f32_col(&chunk.table, "max_scale_z")?;
    let min_r = f32_col(&chunk.table, "min_r")?;
    let min_g = f32_col(&chunk.table, "min_g")?;
    let min_b = f32_col(&chunk.table, "min_b")?;
    let max_r = f32_col(&chunk.table, "max_r")?;
    let max_g = f32_col(&chunk.table, "max_g")?;
    let max_b = f32_col(&chunk.table, "max_b")?;

    let packed_position = vertex.table.column_by_name("packed_position")?.as_u32()?;
    let packed_rotation = vertex.table.column_by_name("packed_rotation")?.as_u32()?;
    let packed_scale = vertex.table.column_by_name("packed_scale")?.as_u32()?;
    let packed_color = vertex.table.column_by_name("packed_color")?.as_u32()?;

    let n = vertex.table.num_rows();
    let mut columns: Vec<Column> = [
        "x", "y", "z", "rot_0", "rot_1", "rot_2", "rot_3", "scale_0", "scale_1", "scale_2",
        "f_dc_0", "f_dc_1", "f_dc_2", "opacity",
    ]
    .iter()
    .map(|name| Column::zeros(*name, ColumnType::F32, n))
    .collect();

    let unpack_111011 = |p: u32| -> (f32, f32, f32) {
        (
            ((p >> 21) & 0x7ff) as f32 / 2047.0,
            ((p >> 11) & 0x3ff) as f32 / 1023.0,
            (p & 0x7ff) as f32 / 2047.0,
        )
    };

    for i in 0..n {
        let ci = i / CHUNK_SIZE;

        let (px, py, pz) = unpack_111011(packed_position[i]);
        columns[0].set(i, lerp(min_x[ci], max_x[ci], px))?;
        columns[1].set(i, lerp(min_y[ci], max_y[ci], py))?;
        columns[2].set(i, lerp(min_z[ci], max_z[ci], pz))?;

        let (qw, qx, qy, qz) = unpack_rotation(packed_rotation[i]);
        columns[3].set(i, qw)?;
        columns[4].set(i, qx)?;
        columns[5].set(i, qy)?;
        columns[6].set(i, qz)?;

        let (sx, sy, sz) = unpack_111011(packed_scale[i]);
        columns[7].set(i, lerp(min_sx[ci], max_sx[ci], sx))?;
        columns[8].set(i, lerp(min_sy[ci], max_sy[ci], sy))?;
        columns[9].set(i, lerp(min_sz[ci], max_sz[ci], sz))?;

        let p = packed_color[i];
        let cr = lerp(min_r[ci], max_r[ci], ((p >> 24) & 0xff) as f32 / 255.0);
        let cg = lerp(min_g[ci], max_g[ci], ((p >> 16) & 0xff) as f32 / 255.0);
        let cb = lerp(min_b[ci], max_b[ci], ((p >> 8) & 0xff) as f32 / 255.0);
        columns[10].set(i, (cr - 0.5) / SH_C0)?;
        columns[11].set(i, (cg - 0.5) / SH_C0)?;
        columns[12].set(i, (cb - 0.5) / SH_C0)?;
        columns[13].set(i, inverse_sigmoid((p & 0xff) as f32 / 255.0))?;
    }

    let mut table = DataTable::new(columns)?;

    if let Some(sh) = ply.element("sh") {
        for column in sh.table.columns() {
            let bytes = column.as_u8()?;
            let values: Vec<f32> = bytes
                .iter()
                .map(|&v| (v as f32 / 255.0 - 0.5) * 8.0)
                .collect();
            table.add_column(Column::new(column.name.clone(), values))?;
        }
    }

    Ok(table)
}

/// Write the table in the compressed chunked layout. Rows are Morton
/// ordered first so chunks stay spatially coherent.
pub fn write_compressed_ply(path: &Path, table: &DataTable) -> Result<()> {
    let n = table.num_rows();
    let mut indices: Vec<u32> = (0..n as u32).collect();
    sort_morton_order_table(table, &mut indices)?;

    let x = table.column_by_name("x")?.as_f32()?;
    let y = table.column_by_name("y")?.as_f32()?;
    let z = table.column_by_name("z")?.as_f32()?;
    let s0 = table.column_by_name("scale_0")?.as_f32()?;
    let s1 = table.column_by_name("scale_1")?.as_f32()?;
    let s2 = table.column_by_name("scale_2")?.as_f32()?;
    let r0 = table.column_by_name("rot_0")?.as_f32()?;
    let r1 = table.column_by_name("rot_1")?.as_f32()?;
    let r2 = table.column_by_name("rot_2")?.as_f32()?;
    let r3 = table.column_by_name("rot_3")?.as_f32()?;
    let dc0 = table.column_by_name("f_dc_0")?.as_f32()?;
    let dc1 = table.column_by_name("f_dc_1")?.as_f32()?;
    let dc2 = table.column_by_name("f_dc_2")?.as_f32()?;
    let opacity = table.column_by_name("opacity")?.as_f32()?;

    let num_chunks = n.div_ceil(CHUNK_SIZE);
    let mut chunk_columns: Vec<Vec<f32>> = vec![Vec::with_capacity(num_chunks); 18];
    let mut packed_position = Vec::with_capacity(n);
    let mut packed_rotation = Vec::with_capacity(n);
    let mut packed_scale = Vec::with_capacity(n);
    let mut packed_color = Vec::with_capacity(n);

    for chunk_rows in indices.chunks(CHUNK_SIZE) {
        let gather = |src: &[f32]| -> Vec<f32> {
            chunk_rows.iter().map(|&i| src[i as usize]).collect()
        };
        let cx = gather(x);
        let cy = gather(y);
        let cz = gather(z);
        let csx: Vec<f32> = gather(s0).iter().map(|v| v.clamp(-20.0, 20.0)).collect();
        let csy: Vec<f32> = gather(s1).iter().map(|v| v.clamp(-20.0, 20.0)).collect();
        let csz: Vec<f32> = gather(s2).iter().map(|v| v.clamp(-20.0, 20.0)).collect();
        let col = |src: &[f32]| -> Vec<f32> {
            chunk_rows
                .iter()
                .map(|&i| src[i as usize] * SH_C0 + 0.5)
                .collect()
        };
        let cr = col(dc0);
        let cg = col(dc1);
        let cb = col(dc2);

        let (px_min, px_max) = min_max(&cx);
        let (py_min, py_max) = min_max(&cy);
        let (pz_min, pz_max) = min_max(&cz);
        let (sx_min, sx_max) = min_max(&csx);
        let (sy_min, sy_max) = min_max(&csy);
        let (sz_min, sz_max) = min_max(&csz);
        let (cr_min, cr_max) = min_max(&cr);
        let (cg_min, cg_max) = min_max(&cg);
        let (cb_min, cb_max) = min_max(&cb);

        let chunk_values = [
            px_min, py_min, pz_min, px_max, py_max, pz_max, sx_min, sy_min, sz_min, sx_max,
            sy_max, sz_max, cr_min, cg_min, cb_min, cr_max, cg_max, cb_max,
        ];
        for (column, value) in chunk_columns.iter_mut().zip(chunk_values) {
            column.push(value);
        }

        for (r, &row) in chunk_rows.iter().enumerate() {
            let row = row as usize;
            packed_position.push(pack_111011(
                normalize(cx[r], px_min, px_max),
                normalize(cy[r], py_min, py_max),
                normalize(cz[r], pz_min, pz_max),
            ));
            packed_rotation.push(pack_rotation(r0[row], r1[row], r2[row], r3[row]));
            packed_scale.push(pack_111011(
                normalize(csx[r], sx_min, sx_max),
                normalize(csy[r], sy_min, sy_max),
                normalize(csz[r], sz_min, sz_max),
            ));
            packed_color.push(pack_8888(
                normalize(cr[r], cr_min, cr_max),
                normalize(cg[r], cg_min, cg_max),
                normalize(cb[r], cb_min, cb_max),
                sigmoid(opacity[row]),
            ));
        }
    }

    let chunk_table = DataTable::new(
        CHUNK_PROPERTIES
            .iter()
            .zip(chunk_columns)
            .map(|(name, values)| Column::new(*name, values))
            .collect(),
    )?;

    let vertex_table = DataTable::new(vec![
        Column::new("packed_position", packed_position),
        Column::new("packed_rotation", packed_rotation),
        Column::new("packed_scale", packed_scale),
        Column::new("packed_color", packed_color),
    ])?;

    let mut elements = vec![
        PlyElementData {
            name: "chunk".to_string(),
            table: chunk_table,
        },
        PlyElementData {
            name: "vertex".to_string(),
            table: vertex_table,
        },
    ];

    let bands = detect_sh_bands(table)?;
    let coeffs = sh_coeffs_for_bands(bands.band_count());
    if coeffs > 0 {
        let mut sh_columns = Vec::with_capacity(coeffs);
        for c in 0..coeffs {
            let name = format!("f_rest_{c}");
            let src = table.column_by_name(&name)?.as_f32()?;
            let packed: Vec<u8> = indices
                .iter()
                .map(|&i| {
                    ((src[i as usize] / 8.0 + 0.5) * 255.0)
                        .round()
                        .clamp(0.0, 255.0) as u8
                })
                .collect();
            sh_columns.push(Column::new(name, packed));
        }
        elements.push(PlyElementData {
            name: "sh".to_string(),
            table: DataTable::new(sh_columns)?,
        });
    }

    let file = std::fs::File::create(path)?;
    write_ply(
        std::io::BufWriter::new(file),
        &PlyData {
            comments: Vec::new(),
            elements,
        },
    )
}
