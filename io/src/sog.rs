//! SOG texture bundles: the quantized splat container.
//!
//! Every attribute is packed into fixed-format lossless WebP textures in
//! Morton order, with per-field codebooks recorded in a `meta.json`
//! manifest. A `.sog` target wraps the files in a store-mode ZIP archive;
//! a `meta.json` target writes them alongside it in a directory.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use gsplat_core::{detect_sh_bands, sh_coeff_column, Column, ColumnType, DataTable};
use gsplat_maths::{
    cluster_1d, inverse_log_transform, inverse_sigmoid, kmeans, log_transform, sigmoid,
};
use gsplat_spatial::sort_morton_order_table;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::{IoError, Result};

/// Channel order for the three stored quaternion components, indexed by the
/// largest component (rot_0 = w first).
const QUAT_ORDER: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

const SQRT_2: f32 = std::f32::consts::SQRT_2;

#[derive(Debug, Clone)]
pub struct SogOptions {
    /// Write a `.sog` ZIP bundle instead of a directory of files.
    pub bundle: bool,
    /// K-means iteration count for the codebooks.
    pub iterations: usize,
    /// Morton-reorder rows before packing. The LOD packer pre-orders its
    /// sub-tables and turns this off.
    pub reorder: bool,
}

impl Default for SogOptions {
    fn default() -> Self {
        SogOptions {
            bundle: true,
            iterations: 10,
            reorder: true,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct AssetMeta {
    pub generator: String,
}

#[derive(Serialize, Deserialize)]
pub struct MeansMeta {
    pub mins: Vec<f32>,
    pub maxs: Vec<f32>,
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CodebookMeta {
    pub codebook: Vec<f32>,
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FilesMeta {
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ShnMeta {
    pub count: usize,
    pub bands: usize,
    pub codebook: Vec<f32>,
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SogMeta {
    pub version: u32,
    pub asset: AssetMeta,
    pub count: usize,
    pub means: MeansMeta,
    pub scales: CodebookMeta,
    pub quats: FilesMeta,
    pub sh0: CodebookMeta,
    #[serde(rename = "shN")]
    pub sh_n: Option<ShnMeta>,
}

enum Sink {
    Zip(zip::ZipWriter<std::io::BufWriter<std::fs::File>>),
    Dir(PathBuf),
}

impl Sink {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        match self {
            Sink::Zip(writer) => {
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored);
                writer.start_file(name, options)?;
                writer.write_all(data)?;
                Ok(())
            }
            Sink::Dir(dir) => {
                std::fs::write(dir.join(name), data)?;
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<()> {
        if let Sink::Zip(writer) = self {
            writer.finish()?;
        }
        Ok(())
    }
}

fn encode_webp(rgba: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);
    encoder.encode(
        rgba,
        width as u32,
        height as u32,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

fn decode_webp(bytes: &[u8]) -> Result<(Vec<u8>, usize, usize)> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::WebP)?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok((rgba.into_raw(), w as usize, h as usize))
}

/// RGBA buffer of the canonical grid: black, alpha 255.
fn texture_buffer(width: usize, height: usize) -> Vec<u8> {
    let mut buf = vec![0u8; width * height * 4];
    for px in buf.chunks_exact_mut(4) {
        px[3] = 255;
    }
    buf
}

/// Write the splat table as a SOG bundle or directory.
pub fn write_sog(output: &Path, table: &DataTable, options: &SogOptions) -> Result<()> {
    let n = table.num_rows();
    if n == 0 {
        return Err(IoError::InvalidData("no splats to write".into()));
    }

    let mut rng = StdRng::seed_from_u64(0x5eed_cafe);

    let mut indices: Vec<u32> = (0..n as u32).collect();
    if options.reorder {
        sort_morton_order_table(table, &mut indices)?;
    }

    // 4-aligned texture grid; excess pixels stay black with alpha 255
    let width = (((n as f64).sqrt() / 4.0).ceil() as usize).max(1) * 4;
    let height = n.div_ceil(4 * width) * 4;

    let mut sink = if options.bundle {
        let file = std::fs::File::create(output)?;
        Sink::Zip(zip::ZipWriter::new(std::io::BufWriter::new(file)))
    } else {
        let dir = output.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Sink::Dir(dir)
    };

    // -- means: log-transformed positions split into two 16-bit textures
    let x = table.column_by_name("x")?.as_f32()?;
    let y = table.column_by_name("y")?.as_f32()?;
    let z = table.column_by_name("z")?.as_f32()?;
    let axes = [x, y, z];

    let mut mins = vec![f32::INFINITY; 3];
    let mut maxs = vec![f32::NEG_INFINITY; 3];
    for (axis, data) in axes.iter().enumerate() {
        for &v in *data {
            let t = log_transform(v);
            if t < mins[axis] {
                mins[axis] = t;
            }
            if t > maxs[axis] {
                maxs[axis] = t;
            }
        }
    }

    let mut means_l = texture_buffer(width, height);
    let mut means_u = texture_buffer(width, height);
    for (i, &row) in indices.iter().enumerate() {
        for axis in 0..3 {
            let range = maxs[axis] - mins[axis];
            let q = if range > 0.0 {
                ((log_transform(axes[axis][row as usize]) - mins[axis]) / range * 65535.0)
                    .round()
                    .clamp(0.0, 65535.0) as u16
            } else {
                0
            };
            means_l[i * 4 + axis] = (q & 0xff) as u8;
            means_u[i * 4 + axis] = (q >> 8) as u8;
        }
    }
    sink.write("means_l.webp", &encode_webp(&means_l, width, height)?)?;
    sink.write("means_u.webp", &encode_webp(&means_u, width, height)?)?;

    // -- quats: largest component dropped, the rest scaled by sqrt(2)
    let qw = table.column_by_name("rot_0")?.as_f32()?;
    let qx = table.column_by_name("rot_1")?.as_f32()?;
    let qy = table.column_by_name("rot_2")?.as_f32()?;
    let qz = table.column_by_name("rot_3")?.as_f32()?;

    let mut quats = texture_buffer(width, height);
    for (i, &row) in indices.iter().enumerate() {
        let r = row as usize;
        let mut q = [qw[r], qx[r], qy[r], qz[r]];
        let len = q.iter().map(|v| v * v).sum::<f32>().sqrt();
        if len > 0.0 {
            for v in &mut q {
                *v /= len;
            }
        }
        let mut largest = 0usize;
        for c in 1..4 {
            if q[c].abs() > q[largest].abs() {
                largest = c;
            }
        }
        if q[largest] < 0.0 {
            for v in &mut q {
                *v = -*v;
            }
        }
        for (channel, &component) in QUAT_ORDER[largest].iter().enumerate() {
            let v = q[component] * SQRT_2;
            quats[i * 4 + channel] = ((0.5 * v + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        quats[i * 4 + 3] = 252 + largest as u8;
    }
    sink.write("quats.webp", &encode_webp(&quats, width, height)?)?;

    // -- scales: one 256-entry codebook over all three axes
    let scale_table = table.clone_subset(&["scale_0", "scale_1", "scale_2"])?;
    let (scales_codebook, scale_labels) = cluster_1d(&scale_table, options.iterations, &mut rng)?;

    let scale_label_cols: Vec<&[u8]> = (0..3)
        .map(|c| scale_labels.column(c).as_u8())
        .collect::<gsplat_core::Result<_>>()?;
    let mut scales_tex = texture_buffer(width, height);
    for (i, &row) in indices.iter().enumerate() {
        for c in 0..3 {
            scales_tex[i * 4 + c] = scale_label_cols[c][row as usize];
        }
    }
    sink.write("scales.webp", &encode_webp(&scales_tex, width, height)?)?;

    // -- sh0: DC color codebook labels plus linear opacity in alpha
    let dc_table = table.clone_subset(&["f_dc_0", "f_dc_1", "f_dc_2"])?;
    let (sh0_codebook, dc_labels) = cluster_1d(&dc_table, options.iterations, &mut rng)?;
    let opacity = table.column_by_name("opacity")?.as_f32()?;

    let dc_label_cols: Vec<&[u8]> = (0..3)
        .map(|c| dc_labels.column(c).as_u8())
        .collect::<gsplat_core::Result<_>>()?;
    let mut sh0_tex = texture_buffer(width, height);
    for (i, &row) in indices.iter().enumerate() {
        let r = row as usize;
        for c in 0..3 {
            sh0_tex[i * 4 + c] = dc_label_cols[c][r];
        }
        sh0_tex[i * 4 + 3] = (sigmoid(opacity[r]) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    sink.write("sh0.webp", &encode_webp(&sh0_tex, width, height)?)?;

    // -- shN: palette of full coefficient vectors plus a value codebook
    let bands = detect_sh_bands(table)?;
    let coeffs = bands.coeffs_per_channel();
    let sh_n = if coeffs > 0 {
        let names: Vec<String> = (0..coeffs * 3).map(|i| format!("f_rest_{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let sh_table = table.clone_subset(&name_refs)?;

        let palette_size = ((n as f64 / 1024.0).log2().floor().exp2().min(64.0) * 1024.0)
            .max(1.0) as usize;
        let clustered = kmeans(&sh_table, palette_size, options.iterations, &mut rng)?;
        let palette_count = clustered.centroids.num_rows();

        let (codebook, centroid_labels) =
            cluster_1d(&clustered.centroids, options.iterations, &mut rng)?;

        // centroid texture: palette entry p, coefficient j, one channel per
        // RGB component; pixel (p % 64)*k + j on row p / 64
        let centroids_width = 64 * coeffs;
        let centroids_height = palette_count.div_ceil(64);
        let centroid_label_cols: Vec<&[u8]> = (0..coeffs * 3)
            .map(|c| centroid_labels.column(c).as_u8())
            .collect::<gsplat_core::Result<_>>()?;
        let mut centroids_tex = texture_buffer(centroids_width, centroids_height);
        for p in 0..palette_count {
            for j in 0..coeffs {
                for channel in 0..3 {
                    let column = centroid_label_cols[sh_coeff_column(channel, j)];
                    centroids_tex[(p * coeffs + j) * 4 + channel] = column[p];
                }
            }
        }
        sink.write(
            "shN_centroids.webp",
            &encode_webp(&centroids_tex, centroids_width, centroids_height)?,
        )?;

        // label texture: 16-bit palette index split into R (low) and G (high)
        let mut labels_tex = texture_buffer(width, height);
        for (i, &row) in indices.iter().enumerate() {
            let label = clustered.labels[row as usize];
            labels_tex[i * 4] = (label & 0xff) as u8;
            labels_tex[i * 4 + 1] = ((label >> 8) & 0xff) as u8;
            labels_tex[i * 4 + 2] = 0;
        }
        sink.write("shN_labels.webp", &encode_webp(&labels_tex, width, height)?)?;

        Some(ShnMeta {
            count: palette_count,
            bands: bands.band_count(),
            codebook,
            files: vec!["shN_centroids.webp".to_string(), "shN_labels.webp".to_string()],
        })
    } else {
        None
    };

    let meta = SogMeta {
        version: 2,
        asset: AssetMeta {
            generator: format!("gsplat v{}", env!("CARGO_PKG_VERSION")),
        },
        count: n,
        means: MeansMeta {
            mins,
            maxs,
            files: vec!["means_l.webp".to_string(), "means_u.webp".to_string()],
        },
        scales: CodebookMeta {
            codebook: scales_codebook,
            files: vec!["scales.webp".to_string()],
        },
        quats: FilesMeta {
            files: vec!["quats.webp".to_string()],
        },
        sh0: CodebookMeta {
            codebook: sh0_codebook,
            files: vec!["sh0.webp".to_string()],
        },
        sh_n,
    };

    sink.write("meta.json", &serde_json::to_vec(&meta)?)?;
    sink.finish()
}

/// Read a SOG bundle (`.sog`) or directory (`meta.json`) back into the
/// canonical splat table.
pub fn read_sog(path: &Path) -> Result<DataTable> {
    let is_bundle = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("sog"))
        .unwrap_or(false);

    let mut entries: HashMap<String, Vec<u8>> = HashMap::new();
    if is_bundle {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            std::io::copy(&mut entry, &mut data)?;
            entries.insert(entry.name().to_string(), data);
        }
    }
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let load = |name: &str| -> Result<Vec<u8>> {
        if let Some(data) = entries.get(name) {
            return Ok(data.clone());
        }
        if is_bundle {
            return Err(IoError::InvalidData(format!(
                "missing '{name}' in archive '{}'",
                path.display()
            )));
        }
        Ok(std::fs::read(dir.join(name))?)
    };

    let meta: SogMeta = serde_json::from_slice(&load("meta.json")?)?;
    let count = meta.count;

    let mut columns: Vec<Column> = [
        "x", "y", "z", "scale_0", "scale_1", "scale_2", "f_dc_0", "f_dc_1", "f_dc_2", "opacity",
        "rot_0", "rot_1", "rot_2", "rot_3",
    ]
    .iter()
    .map(|name| Column::zeros(*name, ColumnType::F32, count))
    .collect();

    // means
    let (lo, lw, lh) = decode_webp(&load(&meta.means.files[0])?)?;
    let (hi, _, _) = decode_webp(&load(&meta.means.files[1])?)?;
    if lw * lh < count {
        return Err(IoError::InvalidData("means texture too small".into()));
    }
    for i in 0..count {
        let o = i * 4;
        for axis in 0..3 {
            let q = lo[o + axis] as u16 | ((hi[o + axis] as u16) << 8);
            let range = meta.means.maxs[axis] - meta.means.mins[axis];
            let range = if range != 0.0 { range } else { 1.0 };
            let v = meta.means.mins[axis] + range * (q as f32 / 65535.0);
            columns[axis].set(i, inverse_log_transform(v))?;
        }
    }

    // quats
    let (q, qw_, qh_) = decode_webp(&load(&meta.quats.files[0])?)?;
    if qw_ * qh_ < count {
        return Err(IoError::InvalidData("quats texture too small".into()));
    }
    for i in 0..count {
        let o = i * 4;
        let tag = q[o + 3];
        if !(252..=255).contains(&tag) {
            columns[10].set(i, 1.0f32)?;
            continue;
        }
        let largest = (tag - 252) as usize;
        let mut comps = [0.0f32; 4];
        for (channel, &component) in QUAT_ORDER[largest].iter().enumerate() {
            comps[component] = (q[o + channel] as f32 / 255.0 * 2.0 - 1.0) / SQRT_2;
        }
        let t = 1.0 - comps.iter().map(|v| v * v).sum::<f32>();
        comps[largest] = t.max(0.0).sqrt();
        for c in 0..4 {
            columns[10 + c].set(i, comps[c])?;
        }
    }

    // scales
    let (s, sw, sh) = decode_webp(&load(&meta.scales.files[0])?)?;
    if sw * sh < count {
        return Err(IoError::InvalidData("scales texture too small".into()));
    }
    for i in 0..count {
        let o = i * 4;
        for c in 0..3 {
            columns[3 + c].set(i, meta.scales.codebook[s[o + c] as usize])?;
        }
    }

    // sh0 + opacity
    let (c0, cw, chh) = decode_webp(&load(&meta.sh0.files[0])?)?;
    if cw * chh < count {
        return Err(IoError::InvalidData("sh0 texture too small".into()));
    }
    for i in 0..count {
        let o = i * 4;
        for c in 0..3 {
            columns[6 + c].set(i, meta.sh0.codebook[c0[o + c] as usize])?;
        }
        columns[9].set(i, inverse_sigmoid(c0[o + 3] as f32 / 255.0))?;
    }

    let mut table = DataTable::new(columns)?;

    // higher bands
    if let Some(sh_n) = &meta.sh_n {
        let coeffs = [0usize, 3, 8, 15][sh_n.bands.min(3)];
        if coeffs > 0 {
            let (centroids, cw, _ch) = decode_webp(&load(&sh_n.files[0])?)?;
            let (labels, lw2, lh2) = decode_webp(&load(&sh_n.files[1])?)?;
            if lw2 * lh2 < count {
                return Err(IoError::InvalidData("shN labels texture too small".into()));
            }

            let mut rest: Vec<Vec<f32>> = vec![vec![0.0f32; count]; coeffs * 3];
            for i in 0..count {
                let o = i * 4;
                let label = labels[o] as usize | ((labels[o + 1] as usize) << 8);
                for j in 0..coeffs {
                    let px = (label % 64) * coeffs + j;
                    let py = label / 64;
                    let idx = (py * cw + px) * 4;
                    for channel in 0..3 {
                        let code = centroids[idx + channel] as usize;
                        rest[sh_coeff_column(channel, j)][i] = sh_n.codebook[code];
                    }
                }
            }
            for (j, values) in rest.into_iter().enumerate() {
                table.add_column(Column::new(format!("f_rest_{j}"), values))?;
            }
        }
    }

    Ok(table)
}
