//! Driver: read inputs, validate, process, combine, write.

mod args;
mod gpu;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{Cli, FileSpec};
use gsplat_core::{combine, is_gaussian_table, DataTable};
use gsplat_io::{LodOptions, SogOptions};
use gsplat_ops::{process, split_environment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Lod,
    SogBundle,
    SogDir,
    CompressedPly,
    Ply,
    Voxel,
}

fn output_format(filename: &str) -> Result<OutputFormat, String> {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        Ok(OutputFormat::Csv)
    } else if lower.ends_with("lod-meta.json") {
        Ok(OutputFormat::Lod)
    } else if lower.ends_with(".sog") {
        Ok(OutputFormat::SogBundle)
    } else if lower.ends_with(".voxel.json") {
        Ok(OutputFormat::Voxel)
    } else if lower.ends_with("meta.json") {
        Ok(OutputFormat::SogDir)
    } else if lower.ends_with(".compressed.ply") {
        Ok(OutputFormat::CompressedPly)
    } else if lower.ends_with(".ply") {
        Ok(OutputFormat::Ply)
    } else {
        Err(format!("Unsupported output file type: {filename}"))
    }
}

fn read_input(path: &Path) -> Result<DataTable, String> {
    let lower = path.to_string_lossy().to_ascii_lowercase();
    let result = if lower.ends_with(".ply") {
        gsplat_io::read_ply_splats(path)
    } else if lower.ends_with(".splat") {
        gsplat_io::read_splat(path)
    } else if lower.ends_with(".sog") || lower.ends_with("meta.json") {
        gsplat_io::read_sog(path)
    } else {
        return Err(format!(
            "Unsupported input file type: {}",
            path.display()
        ));
    };
    result.map_err(|e| format!("{}: {e}", path.display()))
}

fn write_output(
    format: OutputFormat,
    path: &Path,
    table: &DataTable,
    env_table: Option<&DataTable>,
    cli: &Cli,
) -> Result<(), String> {
    let describe = |e: gsplat_io::IoError| format!("{}: {e}", path.display());
    match format {
        OutputFormat::Csv => gsplat_io::write_csv(path, table).map_err(describe),
        OutputFormat::Ply => gsplat_io::ply::write_ply_file(path, table).map_err(describe),
        OutputFormat::CompressedPly => {
            gsplat_io::write_compressed_ply(path, table).map_err(describe)
        }
        OutputFormat::SogBundle | OutputFormat::SogDir => gsplat_io::write_sog(
            path,
            table,
            &SogOptions {
                bundle: format == OutputFormat::SogBundle,
                iterations: cli.iterations,
                reorder: true,
            },
        )
        .map_err(describe),
        OutputFormat::Lod => {
            // the packer bins by detail level; untagged scenes are level 0
            let mut table = table.deep_clone();
            if !table.has_column("lod") {
                let rows = table.num_rows();
                table
                    .add_column(gsplat_core::Column::new("lod", vec![0.0f32; rows]))
                    .map_err(|e| e.to_string())?;
            }
            gsplat_io::write_lod(
                path,
                &table,
                env_table,
                &LodOptions {
                    bundle: !cli.unbundled,
                    iterations: cli.iterations,
                    chunk_count: cli.lod_chunk_count,
                    chunk_extent: cli.lod_chunk_extent,
                },
            )
            .map_err(describe)
        }
        OutputFormat::Voxel => {
            let voxelized = gsplat_spatial::voxelize_gaussians(
                table,
                cli.voxel_resolution,
                cli.voxel_cutoff,
            )
            .map_err(|e| e.to_string())?;
            let octree = gsplat_spatial::build_sparse_octree(
                &gsplat_spatial::filter_and_fill_blocks(&voxelized.accumulator),
                voxelized.grid_bounds,
                voxelized.scene_bounds,
                cli.voxel_resolution,
            );
            gsplat_io::write_voxel(path, &octree).map_err(describe)
        }
    }
}

fn check_splat_table(table: &DataTable, path: &str) -> Result<(), String> {
    if table.num_rows() == 0 || !is_gaussian_table(table) {
        return Err(format!("Unsupported data in file: {path}"));
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), String> {
    let files = args::parse_files(&cli.files)?;
    if files.len() < 2 {
        return Err("expected at least one input file and one output file".to_string());
    }

    let device = cli.device()?;
    tracing::debug!(?device, lod_select = ?cli.lod_select, viewer_settings = ?cli.viewer_settings);

    let (inputs, output) = files.split_at(files.len() - 1);
    let output = &output[0];
    let output_path = PathBuf::from(&output.path);
    let format = output_format(&output.path)?;

    if cli.overwrite {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create directory: {e}"))?;
        }
    } else if output_path.exists() {
        return Err(format!(
            "File '{}' already exists. Use --overwrite to replace it.",
            output_path.display()
        ));
    }

    let mut env_tables: Vec<DataTable> = Vec::new();
    let mut main_tables: Vec<DataTable> = Vec::new();

    for FileSpec { path, actions } in inputs {
        let table = read_input(Path::new(path))?;
        check_splat_table(&table, path)?;

        let table = process(table, actions).map_err(|e| format!("{path}: {e}"))?;
        tracing::info!(path = %path, rows = table.num_rows(), "loaded");

        let (env, main) = split_environment(table).map_err(|e| format!("{path}: {e}"))?;
        env_tables.extend(env);
        main_tables.extend(main);
    }

    let main_table = combine(main_tables)
        .map_err(|e| e.to_string())?
        .map(|t| process(t, &output.actions))
        .transpose()
        .map_err(|e| e.to_string())?;

    let Some(main_table) = main_table.filter(|t| t.num_rows() > 0) else {
        return Err("No splats to write".to_string());
    };

    let env_table = combine(env_tables)
        .map_err(|e| e.to_string())?
        .map(|t| process(t, &output.actions))
        .transpose()
        .map_err(|e| e.to_string())?;

    tracing::info!(rows = main_table.num_rows(), output = %output_path.display(), "writing");
    write_output(format, &output_path, &main_table, env_table.as_ref(), cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsplat_core::Column;

    #[test]
    fn output_format_by_extension() {
        assert_eq!(output_format("a.csv").unwrap(), OutputFormat::Csv);
        assert_eq!(output_format("a.PLY").unwrap(), OutputFormat::Ply);
        assert_eq!(
            output_format("a.compressed.ply").unwrap(),
            OutputFormat::CompressedPly
        );
        assert_eq!(output_format("scene.sog").unwrap(), OutputFormat::SogBundle);
        assert_eq!(output_format("out/meta.json").unwrap(), OutputFormat::SogDir);
        assert_eq!(
            output_format("out/lod-meta.json").unwrap(),
            OutputFormat::Lod
        );
        assert_eq!(
            output_format("scene.voxel.json").unwrap(),
            OutputFormat::Voxel
        );
        assert!(output_format("a.html").is_err());
        assert!(output_format("a.xyz").is_err());
    }

    #[test]
    fn schema_mismatch_names_the_file() {
        let table = DataTable::new(vec![
            Column::new("x", vec![0.0f32]),
            Column::new("y", vec![0.0f32]),
            Column::new("z", vec![0.0f32]),
        ])
        .unwrap();
        let err = check_splat_table(&table, "points.ply").unwrap_err();
        assert!(err.contains("Unsupported data in file"));
        assert!(err.contains("points.ply"));
    }

    #[test]
    fn empty_table_is_rejected() {
        let table = DataTable::default();
        assert!(check_splat_table(&table, "empty.ply").is_err());
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // single worker in debug builds, hardware concurrency in release
    let threads = if cfg!(debug_assertions) { Some(1) } else { None };
    if let Err(e) = gsplat::init_thread_pool(threads) {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    if cli.list_gpus {
        let adapters = gpu::enumerate_adapters();
        if adapters.is_empty() {
            println!("No GPU adapters found.");
        } else {
            for adapter in adapters {
                println!(
                    "[{}] {} ({}, {})",
                    adapter.index, adapter.name, adapter.backend, adapter.device_type
                );
            }
        }
        return;
    }

    let start = Instant::now();
    match run(&cli) {
        Ok(()) => {
            tracing::info!("done in {:.3}s", start.elapsed().as_secs_f64());
        }
        Err(message) => {
            tracing::error!("{message}");
            std::process::exit(1);
        }
    }
}
