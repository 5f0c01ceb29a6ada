//! Splat file I/O.
//!
//! Readers produce the canonical columnar table; writers consume it:
//! - PLY (binary little-endian), including the compressed chunk variant
//! - `.splat` fixed 32-byte records
//! - CSV
//! - SOG texture bundles (WebP + JSON manifest, optionally zipped)
//! - LOD trees of SOG chunks

pub mod compressed_ply;
pub mod csv;
pub mod lod;
pub mod ply;
pub mod sog;
pub mod splat_file;
pub mod voxel;

pub use compressed_ply::{decompress_ply, is_compressed_ply, write_compressed_ply};
pub use csv::write_csv;
pub use lod::{write_lod, LodOptions};
pub use ply::{read_ply, read_ply_splats, write_ply, PlyData, PlyElementData};
pub use sog::{read_sog, write_sog, SogOptions};
pub use splat_file::read_splat;
pub use voxel::{read_voxel, write_voxel};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Core(#[from] gsplat_core::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("texture codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
