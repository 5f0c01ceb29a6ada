//! Columnar data model for Gaussian splat scenes.
//!
//! A scene is held as a [`DataTable`]: an ordered list of named, typed
//! columns of equal length. Readers produce tables, the processing pipeline
//! mutates them, writers consume them. Spatial indices borrow tables and
//! never outlive them.

pub mod column;
pub mod schema;
pub mod table;

pub use column::{Column, ColumnData, ColumnType};
pub use schema::{
    detect_sh_bands, is_gaussian_table, sh_coeff_column, sh_coeffs_for_bands, ShBands, SH_C0,
};
pub use table::{combine, DataTable, Row};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{name}' has {len} rows, table has {rows}")]
    LengthMismatch {
        name: String,
        len: usize,
        rows: usize,
    },

    #[error("row index {index} out of range ({rows} rows)")]
    RowOutOfRange { index: usize, rows: usize },

    #[error("value {value} out of range for {ty:?} column '{column}'")]
    ValueOutOfRange {
        column: String,
        value: f64,
        ty: ColumnType,
    },

    #[error("non-integer value {value} cannot be stored in {ty:?} column '{column}'")]
    NotAnInteger {
        column: String,
        value: f64,
        ty: ColumnType,
    },

    #[error("cannot parse '{text}' as {ty:?} for column '{column}'")]
    Parse {
        column: String,
        text: String,
        ty: ColumnType,
    },

    #[error("column '{column}' is not {expected:?} (found {found:?})")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    #[error("permutation index {index} out of range ({rows} rows)")]
    BadPermutation { index: u32, rows: usize },

    #[error("table does not match the Gaussian splat schema: missing '{0}'")]
    SchemaMismatch(String),

    #[error("non-canonical spherical harmonic columns: f_rest_* ends at {0}")]
    PartialShColumns(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
