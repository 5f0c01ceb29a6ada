//! Reader for the flat `.splat` format: 32 bytes per splat.
//!
//! Layout: position f32x3, linear scale f32x3, RGBA color u8x4, rotation
//! quaternion u8x4. Scales convert to natural log, colors to SH DC terms,
//! opacity to a logit, and quaternions renormalize to unit length.

use std::io::Read;
use std::path::Path;

use gsplat_core::{Column, ColumnType, DataTable, SH_C0};

use crate::{IoError, Result};

const BYTES_PER_SPLAT: usize = 32;
const ROW_CHUNK: usize = 1024;

pub fn read_splat(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path)?;
    let file_size = file.metadata()?.len() as usize;

    if file_size % BYTES_PER_SPLAT != 0 {
        return Err(IoError::InvalidData(format!(
            "invalid .splat file '{}': size is not a multiple of 32 bytes",
            path.display()
        )));
    }
    let num_splats = file_size / BYTES_PER_SPLAT;
    if num_splats == 0 {
        return Err(IoError::InvalidData(format!(
            "invalid .splat file '{}': file is empty",
            path.display()
        )));
    }

    let names = [
        "x", "y", "z", "scale_0", "scale_1", "scale_2", "f_dc_0", "f_dc_1", "f_dc_2", "opacity",
        "rot_0", "rot_1", "rot_2", "rot_3",
    ];
    let mut columns: Vec<Column> = names
        .iter()
        .map(|name| Column::zeros(*name, ColumnType::F32, num_splats))
        .collect();

    let mut reader = std::io::BufReader::new(file);
    let mut chunk = vec![0u8; ROW_CHUNK * BYTES_PER_SPLAT];
    let mut row = 0usize;

    while row < num_splats {
        let rows = ROW_CHUNK.min(num_splats - row);
        let bytes = &mut chunk[..rows * BYTES_PER_SPLAT];
        reader.read_exact(bytes)?;

        for r in 0..rows {
            let i = row + r;
            let record = &bytes[r * BYTES_PER_SPLAT..(r + 1) * BYTES_PER_SPLAT];
            let f = |o: usize| f32::from_le_bytes([record[o], record[o + 1], record[o + 2], record[o + 3]]);

            columns[0].set(i, f(0))?;
            columns[1].set(i, f(4))?;
            columns[2].set(i, f(8))?;

            // scales are stored linear; the table wants natural log
            columns[3].set(i, f(12).ln())?;
            columns[4].set(i, f(16).ln())?;
            columns[5].set(i, f(20).ln())?;

            columns[6].set(i, (record[24] as f32 / 255.0 - 0.5) / SH_C0)?;
            columns[7].set(i, (record[25] as f32 / 255.0 - 0.5) / SH_C0)?;
            columns[8].set(i, (record[26] as f32 / 255.0 - 0.5) / SH_C0)?;
            columns[9].set(i, gsplat_maths::inverse_sigmoid(record[27] as f32 / 255.0))?;

            let q: Vec<f32> = record[28..32]
                .iter()
                .map(|&b| b as f32 / 255.0 * 2.0 - 1.0)
                .collect();
            let len = q.iter().map(|v| v * v).sum::<f32>().sqrt();
            if len > 0.0 {
                for (c, &v) in q.iter().enumerate() {
                    columns[10 + c].set(i, v / len)?;
                }
            } else {
                columns[10].set(i, 0.0f32)?;
                columns[11].set(i, 0.0f32)?;
                columns[12].set(i, 0.0f32)?;
                columns[13].set(i, 1.0f32)?;
            }
        }
        row += rows;
    }

    Ok(DataTable::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_one_record() {
        let mut record = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 0.5, 0.5, 0.5] {
            record.extend_from_slice(&v.to_le_bytes());
        }
        record.extend_from_slice(&[255, 128, 0, 255]); // color + opacity
        record.extend_from_slice(&[255, 127, 127, 127]); // quaternion

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.splat");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&record)
            .unwrap();

        let table = read_splat(&path).unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column_by_name("x").unwrap().as_f32().unwrap(), &[1.0]);
        let s = table.column_by_name("scale_0").unwrap().as_f32().unwrap();
        assert!((s[0] - 0.5f32.ln()).abs() < 1e-6);
        // opacity 255 saturates the logit high
        let o = table.column_by_name("opacity").unwrap().as_f32().unwrap();
        assert!(o[0] > 5.0);
    }

    #[test]
    fn rejects_bad_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.splat");
        std::fs::write(&path, [0u8; 33]).unwrap();
        assert!(matches!(read_splat(&path), Err(IoError::InvalidData(_))));
    }

    #[test]
    fn rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.splat");
        std::fs::write(&path, []).unwrap();
        assert!(matches!(read_splat(&path), Err(IoError::InvalidData(_))));
    }
}
