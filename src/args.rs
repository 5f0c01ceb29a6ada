//! Command-line interface.
//!
//! Global flags parse with clap; the remaining token stream alternates
//! between file paths and per-file action flags, where a flag always
//! attaches to the path before it:
//!
//! ```text
//! gsplat [GLOBAL] input [ACTIONS] ... output [ACTIONS]
//! ```

use clap::Parser;
use gsplat_ops::{Action, Comparator};
use nalgebra::Vector3;

#[derive(Parser, Debug)]
#[command(
    name = "gsplat",
    version,
    about = "Transform and filter Gaussian splat scenes",
    override_usage = "gsplat [GLOBAL] input [ACTIONS] ... output [ACTIONS]"
)]
pub struct Cli {
    /// Overwrite output file if it exists
    #[arg(long)]
    pub overwrite: bool,

    /// Suppress non-error output
    #[arg(long)]
    pub quiet: bool,

    /// Iterations for SOG SH compression (more=better)
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,

    /// List available GPU adapters and exit
    #[arg(long = "list-gpus")]
    pub list_gpus: bool,

    /// Select device for SOG compression: GPU adapter index | 'cpu'
    #[arg(long, default_value = "-1")]
    pub gpu: String,

    /// HTML viewer settings JSON file
    #[arg(long = "viewer-settings")]
    pub viewer_settings: Option<String>,

    /// Generate unbundled output with separate files
    #[arg(long)]
    pub unbundled: bool,

    /// Comma-separated LOD levels to read from LCC input
    #[arg(long = "lod-select", value_delimiter = ',')]
    pub lod_select: Vec<i32>,

    /// Approximate number of Gaussians per LOD chunk in K
    #[arg(long = "lod-chunk-count", default_value_t = 512)]
    pub lod_chunk_count: usize,

    /// Approximate size of an LOD chunk in world units (m)
    #[arg(long = "lod-chunk-extent", default_value_t = 16.0)]
    pub lod_chunk_extent: f32,

    /// Voxel size in world units for .voxel.json output
    #[arg(long = "voxel-resolution", default_value_t = 0.05)]
    pub voxel_resolution: f64,

    /// Opacity threshold below which voxels stay empty
    #[arg(long = "voxel-cutoff", default_value_t = 0.5)]
    pub voxel_cutoff: f32,

    /// input files, the output file, and their action flags
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub files: Vec<String>,
}

/// Device selection for SOG compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Auto,
    Cpu,
    Gpu(u32),
}

impl Cli {
    pub fn device(&self) -> Result<Device, String> {
        if self.gpu == "cpu" {
            return Ok(Device::Cpu);
        }
        match self.gpu.parse::<i64>() {
            Ok(-1) => Ok(Device::Auto),
            Ok(n) if n >= 0 => Ok(Device::Gpu(n as u32)),
            _ => Err(format!("invalid --gpu value '{}'", self.gpu)),
        }
    }
}

/// A path plus the actions attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpec {
    pub path: String,
    pub actions: Vec<Action>,
}

fn parse_f32(text: &str, flag: &str) -> Result<f32, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("invalid number '{text}' for {flag}"))
}

fn parse_vec3(text: &str, flag: &str) -> Result<Vector3<f32>, String> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("{flag} expects x,y,z (got '{text}')"));
    }
    Ok(Vector3::new(
        parse_f32(parts[0], flag)?,
        parse_f32(parts[1], flag)?,
        parse_f32(parts[2], flag)?,
    ))
}

/// Box corners; empty entries or `-` mean unbounded on that side.
fn parse_box(text: &str) -> Result<(Vector3<f32>, Vector3<f32>), String> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 6 {
        return Err(format!("--filter-box expects x,y,z,X,Y,Z (got '{text}')"));
    }
    let parse = |p: &str, default: f32| -> Result<f32, String> {
        let p = p.trim();
        if p.is_empty() || p == "-" {
            Ok(default)
        } else {
            parse_f32(p, "--filter-box")
        }
    };
    let min = Vector3::new(
        parse(parts[0], f32::NEG_INFINITY)?,
        parse(parts[1], f32::NEG_INFINITY)?,
        parse(parts[2], f32::NEG_INFINITY)?,
    );
    let max = Vector3::new(
        parse(parts[3], f32::INFINITY)?,
        parse(parts[4], f32::INFINITY)?,
        parse(parts[5], f32::INFINITY)?,
    );
    Ok((min, max))
}

/// Walk the trailing tokens into file specs. A token starting with `-`
/// attaches as an action to the file before it.
pub fn parse_files(tokens: &[String]) -> Result<Vec<FileSpec>, String> {
    let mut files: Vec<FileSpec> = Vec::new();
    let mut iter = tokens.iter().peekable();

    let mut next_value = |iter: &mut std::iter::Peekable<std::slice::Iter<String>>,
                          flag: &str|
     -> Result<String, String> {
        iter.next()
            .cloned()
            .ok_or_else(|| format!("{flag} expects a value"))
    };

    while let Some(token) = iter.next() {
        if !token.starts_with('-') {
            files.push(FileSpec {
                path: token.clone(),
                actions: Vec::new(),
            });
            continue;
        }

        let current = files
            .last_mut()
            .ok_or_else(|| format!("action '{token}' must follow a file path"))?;

        let action = match token.as_str() {
            "-t" | "--translate" => {
                Action::Translate(parse_vec3(&next_value(&mut iter, token)?, token)?)
            }
            "-r" | "--rotate" => Action::Rotate(parse_vec3(&next_value(&mut iter, token)?, token)?),
            "-s" | "--scale" => {
                let value = parse_f32(&next_value(&mut iter, token)?, token)?;
                if value <= 0.0 {
                    return Err(format!("--scale must be positive (got {value})"));
                }
                Action::Scale(value)
            }
            "-H" | "--filter-harmonics" => {
                let value = next_value(&mut iter, token)?;
                let bands: u32 = value
                    .parse()
                    .ok()
                    .filter(|b| *b <= 3)
                    .ok_or_else(|| format!("--filter-harmonics expects 0..3 (got '{value}')"))?;
                Action::FilterBands(bands)
            }
            "-N" | "--filter-nan" => Action::FilterNan,
            "-B" | "--filter-box" => {
                let (min, max) = parse_box(&next_value(&mut iter, token)?)?;
                Action::FilterBox { min, max }
            }
            "-S" | "--filter-sphere" => {
                let value = next_value(&mut iter, token)?;
                let parts: Vec<&str> = value.split(',').collect();
                if parts.len() != 4 {
                    return Err(format!("--filter-sphere expects x,y,z,r (got '{value}')"));
                }
                Action::FilterSphere {
                    center: Vector3::new(
                        parse_f32(parts[0], token)?,
                        parse_f32(parts[1], token)?,
                        parse_f32(parts[2], token)?,
                    ),
                    radius: parse_f32(parts[3], token)?,
                }
            }
            "-V" | "--filter-value" => {
                let value = next_value(&mut iter, token)?;
                let parts: Vec<&str> = value.split(',').collect();
                if parts.len() != 3 {
                    return Err(format!(
                        "--filter-value expects name,comparator,value (got '{value}')"
                    ));
                }
                let comparator = Comparator::parse(parts[1])
                    .ok_or_else(|| format!("unknown comparator '{}'", parts[1]))?;
                Action::FilterByValue {
                    column: parts[0].to_string(),
                    comparator,
                    value: parse_f32(parts[2], token)?,
                }
            }
            "-p" | "--params" => {
                let value = next_value(&mut iter, token)?;
                for pair in value.split(',') {
                    let (key, val) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("--params expects key=value (got '{pair}')"))?;
                    current.actions.push(Action::Param {
                        key: key.to_string(),
                        value: val.to_string(),
                    });
                }
                continue;
            }
            "-l" | "--lod" => {
                let value = next_value(&mut iter, token)?;
                let level: u32 = value
                    .parse()
                    .map_err(|_| format!("--lod expects n >= 0 (got '{value}')"))?;
                Action::Lod(level)
            }
            other => return Err(format!("unknown action flag '{other}'")),
        };
        current.actions.push(action);
    }

    Ok(files)
}
