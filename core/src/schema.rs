//! The Gaussian splat row schema.
//!
//! A table is a splat scene iff it carries `x, y, z`, `rot_0..rot_3`
//! (w, x, y, z), `scale_0..scale_2` (natural-log sigma), `f_dc_0..f_dc_2`
//! and `opacity` (logit), all f32. Optional `f_rest_*` columns carry the
//! higher spherical-harmonic bands, laid out band-major with the channels
//! interleaved per band: L1 occupies indices 0..9 (3 per channel, R then G
//! then B), L2 occupies 9..24 (5 per channel), L3 occupies 24..45
//! (7 per channel). An optional f32 `lod` column tags detail levels;
//! `lod == -1` marks environment splats.

use crate::{ColumnType, DataTable, Error, Result};

/// `Y_0^0` normalization constant; linear color is `f_dc * SH_C0 + 0.5`.
pub const SH_C0: f32 = 0.28209479177387814;

pub const REQUIRED_COLUMNS: [&str; 14] = [
    "x", "y", "z", "rot_0", "rot_1", "rot_2", "rot_3", "scale_0", "scale_1", "scale_2", "f_dc_0",
    "f_dc_1", "f_dc_2", "opacity",
];

/// Spherical harmonic band count carried by a table's `f_rest_*` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShBands {
    None,
    L1,
    L2,
    L3,
}

impl ShBands {
    /// Coefficients per color channel, DC excluded.
    pub fn coeffs_per_channel(self) -> usize {
        match self {
            ShBands::None => 0,
            ShBands::L1 => 3,
            ShBands::L2 => 8,
            ShBands::L3 => 15,
        }
    }

    /// Total `f_rest_*` column count.
    pub fn total_coeffs(self) -> usize {
        self.coeffs_per_channel() * 3
    }

    pub fn band_count(self) -> usize {
        match self {
            ShBands::None => 0,
            ShBands::L1 => 1,
            ShBands::L2 => 2,
            ShBands::L3 => 3,
        }
    }

    pub fn from_band_count(bands: usize) -> ShBands {
        match bands {
            0 => ShBands::None,
            1 => ShBands::L1,
            2 => ShBands::L2,
            _ => ShBands::L3,
        }
    }
}

/// Total `f_rest_*` columns for a band count (0, 9, 24 or 45).
pub fn sh_coeffs_for_bands(bands: usize) -> usize {
    ShBands::from_band_count(bands).total_coeffs()
}

/// `f_rest_*` column index of channel `channel`'s coefficient `coeff`
/// (0-based, DC excluded) under the band-major layout.
pub fn sh_coeff_column(channel: usize, coeff: usize) -> usize {
    debug_assert!(channel < 3);
    if coeff < 3 {
        channel * 3 + coeff
    } else if coeff < 8 {
        9 + channel * 5 + (coeff - 3)
    } else {
        24 + channel * 7 + (coeff - 8)
    }
}

/// True when the table satisfies the Gaussian splat schema.
pub fn is_gaussian_table(table: &DataTable) -> bool {
    REQUIRED_COLUMNS.iter().all(|name| {
        table
            .column_by_name(name)
            .map(|c| c.ty() == ColumnType::F32)
            .unwrap_or(false)
    })
}

/// Detect the SH band count from which `f_rest_*` columns exist.
///
/// No `f_rest_0` means no bands; a first missing index of 9 or 24 means one
/// or two bands; all 45 present means three. Any other prefix is a
/// non-canonical subset and is rejected.
pub fn detect_sh_bands(table: &DataTable) -> Result<ShBands> {
    let mut first_missing = None;
    for i in 0..45 {
        if !table.has_column(&format!("f_rest_{i}")) {
            first_missing = Some(i);
            break;
        }
    }
    match first_missing {
        None => Ok(ShBands::L3),
        Some(0) => Ok(ShBands::None),
        Some(9) => Ok(ShBands::L1),
        Some(24) => Ok(ShBands::L2),
        Some(n) => Err(Error::PartialShColumns(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Column;

    fn splat_table(sh_columns: usize) -> DataTable {
        let mut table = DataTable::default();
        for name in REQUIRED_COLUMNS {
            table.add_column(Column::new(name, vec![0.0f32; 2])).unwrap();
        }
        for i in 0..sh_columns {
            table
                .add_column(Column::new(format!("f_rest_{i}"), vec![0.0f32; 2]))
                .unwrap();
        }
        table
    }

    #[test]
    fn schema_requires_all_columns() {
        let mut table = splat_table(0);
        assert!(is_gaussian_table(&table));
        table.remove_column("opacity");
        assert!(!is_gaussian_table(&table));
    }

    #[test]
    fn schema_requires_f32() {
        let mut table = splat_table(0);
        table.remove_column("opacity");
        table
            .add_column(Column::new("opacity", vec![0u8; 2]))
            .unwrap();
        assert!(!is_gaussian_table(&table));
    }

    #[test]
    fn band_detection() {
        assert_eq!(detect_sh_bands(&splat_table(0)).unwrap(), ShBands::None);
        assert_eq!(detect_sh_bands(&splat_table(9)).unwrap(), ShBands::L1);
        assert_eq!(detect_sh_bands(&splat_table(24)).unwrap(), ShBands::L2);
        assert_eq!(detect_sh_bands(&splat_table(45)).unwrap(), ShBands::L3);
        assert!(detect_sh_bands(&splat_table(12)).is_err());
    }

    #[test]
    fn band_major_column_layout() {
        // L1: three coefficients per channel, channels in R, G, B blocks
        assert_eq!(sh_coeff_column(0, 0), 0);
        assert_eq!(sh_coeff_column(1, 0), 3);
        assert_eq!(sh_coeff_column(2, 2), 8);
        // L2 starts at 9
        assert_eq!(sh_coeff_column(0, 3), 9);
        assert_eq!(sh_coeff_column(2, 7), 23);
        // L3 starts at 24
        assert_eq!(sh_coeff_column(0, 8), 24);
        assert_eq!(sh_coeff_column(2, 14), 44);
    }
}
