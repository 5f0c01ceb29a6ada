//! File-level round trips through the writers and readers.

use gsplat_core::{Column, DataTable};
use gsplat_io::{
    read_ply_splats, read_sog, write_compressed_ply, write_lod, write_sog, LodOptions, SogOptions,
};

/// Deterministic scene: positions on a jittered grid, varied rotations and
/// colors, optionally with one SH band.
fn test_scene(n: usize, sh_bands: usize) -> DataTable {
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    let mut rot = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    let mut dc = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    let mut opacity = Vec::with_capacity(n);

    let palette = [-0.8f32, -0.3, 0.0, 0.4, 0.9, 1.5];
    for i in 0..n {
        let gx = (i % 10) as f32;
        let gy = ((i / 10) % 10) as f32;
        let gz = (i / 100) as f32;
        x.push(gx * 2.0 + (i as f32 * 0.37).sin() * 0.2);
        y.push(gy * 2.0 + (i as f32 * 0.51).cos() * 0.2);
        z.push(gz * 2.0 + (i as f32 * 0.73).sin() * 0.2);

        let a = i as f32 * 0.61;
        let q = [(a.cos()) * 0.8 + 0.2, a.sin() * 0.5, (a * 0.5).sin() * 0.3, 0.1];
        let len = q.iter().map(|v| v * v).sum::<f32>().sqrt();
        for c in 0..4 {
            rot[c].push(q[c] / len);
        }

        for c in 0..3 {
            dc[c].push(palette[(i * (c + 1)) % palette.len()]);
        }
        opacity.push(((i % 7) as f32 - 3.0) * 0.8);
    }

    let mut table = DataTable::new(vec![
        Column::new("x", x),
        Column::new("y", y),
        Column::new("z", z),
        Column::new("rot_0", rot[0].clone()),
        Column::new("rot_1", rot[1].clone()),
        Column::new("rot_2", rot[2].clone()),
        Column::new("rot_3", rot[3].clone()),
        Column::new("scale_0", vec![-2.0f32; n]),
        Column::new("scale_1", vec![-2.3f32; n]),
        Column::new("scale_2", vec![-1.7f32; n]),
        Column::new("f_dc_0", dc[0].clone()),
        Column::new("f_dc_1", dc[1].clone()),
        Column::new("f_dc_2", dc[2].clone()),
        Column::new("opacity", opacity),
    ])
    .unwrap();

    let coeffs = [0usize, 9, 24, 45][sh_bands];
    for j in 0..coeffs {
        let values: Vec<f32> = (0..n).map(|i| ((i + j) as f32 * 0.13).sin() * 0.5).collect();
        table
            .add_column(Column::new(format!("f_rest_{j}"), values))
            .unwrap();
    }
    table
}

#[test]
fn ply_identity_round_trip() {
    let table = test_scene(10, 0);
    let dir = tempfile::tempdir().unwrap();

    let first = dir.path().join("first.ply");
    gsplat_io::ply::write_ply_file(&first, &table).unwrap();

    let read_back = read_ply_splats(&first).unwrap();
    let second = dir.path().join("second.ply");
    gsplat_io::ply::write_ply_file(&second, &read_back).unwrap();

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert_eq!(a, b, "read-then-write must be byte identical");
}

#[test]
fn compressed_ply_round_trip_within_quantization() {
    let table = test_scene(600, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.compressed.ply");

    write_compressed_ply(&path, &table).unwrap();
    let restored = read_ply_splats(&path).unwrap();
    assert_eq!(restored.num_rows(), 600);
    assert!(restored.has_column("f_rest_8"));

    // rows are morton-reordered; match by nearest position
    let ox = table.column_by_name("x").unwrap().as_f32().unwrap();
    let oy = table.column_by_name("y").unwrap().as_f32().unwrap();
    let oz = table.column_by_name("z").unwrap().as_f32().unwrap();
    let rx = restored.column_by_name("x").unwrap().as_f32().unwrap();
    let ry = restored.column_by_name("y").unwrap().as_f32().unwrap();
    let rz = restored.column_by_name("z").unwrap().as_f32().unwrap();

    let mut total_error = 0.0f64;
    for i in 0..600 {
        let mut best = f32::INFINITY;
        for j in 0..600 {
            let d = (ox[i] - rx[j]).powi(2) + (oy[i] - ry[j]).powi(2) + (oz[i] - rz[j]).powi(2);
            if d < best {
                best = d;
            }
        }
        total_error += best.sqrt() as f64;
    }
    // chunk-local 11-bit quantization keeps positions tight
    assert!(total_error / 600.0 < 0.05, "mean error {}", total_error / 600.0);
}

#[test]
fn sog_round_trip_sanity() {
    let n = 100;
    let table = test_scene(n, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.sog");

    write_sog(
        &path,
        &table,
        &SogOptions {
            bundle: true,
            iterations: 20,
            reorder: true,
        },
    )
    .unwrap();

    let restored = read_sog(&path).unwrap();
    assert_eq!(restored.num_rows(), n);
    for j in 0..9 {
        assert!(restored.has_column(&format!("f_rest_{j}")));
    }

    let col = |t: &DataTable, name: &str| t.column_by_name(name).unwrap().as_f32().unwrap().to_vec();
    let (ox, oy, oz) = (col(&table, "x"), col(&table, "y"), col(&table, "z"));
    let (rx, ry, rz) = (col(&restored, "x"), col(&restored, "y"), col(&restored, "z"));

    // scene diagonal for the error budget
    let diag = {
        let min_max = |v: &[f32]| {
            v.iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
                    (lo.min(x), hi.max(x))
                })
        };
        let (x0, x1) = min_max(&ox);
        let (y0, y1) = min_max(&oy);
        let (z0, z1) = min_max(&oz);
        ((x1 - x0).powi(2) + (y1 - y0).powi(2) + (z1 - z0).powi(2)).sqrt()
    };

    // match rows by nearest position (the writer reorders by Morton code)
    let mut position_error = 0.0f64;
    let mut matches = Vec::with_capacity(n);
    for i in 0..n {
        let mut best = (0usize, f32::INFINITY);
        for j in 0..n {
            let d = (ox[i] - rx[j]).powi(2) + (oy[i] - ry[j]).powi(2) + (oz[i] - rz[j]).powi(2);
            if d < best.1 {
                best = (j, d);
            }
        }
        matches.push(best.0);
        position_error += best.1.sqrt() as f64;
    }
    assert!(
        position_error / (n as f64) < position_error_budget(diag),
        "mean position error {} vs diagonal {diag}",
        position_error / (n as f64)
    );

    // quaternions agree up to sign
    let q = |t: &DataTable, c: usize| {
        t.column_by_name(["rot_0", "rot_1", "rot_2", "rot_3"][c])
            .unwrap()
            .as_f32()
            .unwrap()
            .to_vec()
    };
    let (ow, oxq, oyq, ozq) = (q(&table, 0), q(&table, 1), q(&table, 2), q(&table, 3));
    let (rw, rxq, ryq, rzq) = (q(&restored, 0), q(&restored, 1), q(&restored, 2), q(&restored, 3));
    for i in 0..n {
        let j = matches[i];
        let dot = (ow[i] * rw[j] + oxq[i] * rxq[j] + oyq[i] * ryq[j] + ozq[i] * rzq[j]).abs();
        assert!(dot > 0.999, "quaternion dot {dot}");
    }

    // DC colors land on nearby codebook entries
    for name in ["f_dc_0", "f_dc_1", "f_dc_2"] {
        let original = col(&table, name);
        let reconstructed = col(&restored, name);
        for i in 0..n {
            let delta = (original[i] - reconstructed[matches[i]]).abs();
            assert!(delta < 2.0 / 255.0 / gsplat_core::SH_C0, "dc delta {delta}");
        }
    }
}

fn position_error_budget(diag: f32) -> f64 {
    (diag as f64) * 1e-3
}

#[test]
fn sog_unbundled_writes_directory() {
    let table = test_scene(50, 0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("meta.json");

    write_sog(
        &path,
        &table,
        &SogOptions {
            bundle: false,
            iterations: 4,
            reorder: true,
        },
    )
    .unwrap();

    assert!(path.exists());
    assert!(dir.path().join("out").join("means_l.webp").exists());
    assert!(dir.path().join("out").join("quats.webp").exists());

    let restored = read_sog(&path).unwrap();
    assert_eq!(restored.num_rows(), 50);
}

#[test]
fn lod_chunking_unit_counts() {
    // 6 * 1024 splats over three detail levels with an effectively
    // unbounded chunk extent: unit splitting is by count alone
    let n = 6 * 1024;
    let mut table = test_scene(n, 0);
    let lods: Vec<f32> = (0..n).map(|i| (i % 3) as f32).collect();
    table.add_column(Column::new("lod", lods)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let meta_path = dir.path().join("lod-meta.json");

    write_lod(
        &meta_path,
        &table,
        None,
        &LodOptions {
            bundle: true,
            iterations: 2,
            chunk_count: 1,
            chunk_extent: 1e9,
        },
    )
    .unwrap();

    let meta: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
    assert_eq!(meta["lodLevels"], 3);
    assert!(meta["environment"].is_null());

    let filenames: Vec<String> = meta["filenames"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(filenames.len(), 6, "expected 6 file units, got {filenames:?}");

    // every unit respects the cap and the rows add back up
    let mut total = 0usize;
    for name in &filenames {
        let unit = read_sog(&dir.path().join(name)).unwrap();
        assert!(unit.num_rows() <= 1024, "unit {name} has {} rows", unit.num_rows());
        total += unit.num_rows();
    }
    assert_eq!(total, n);
}

#[test]
fn lod_environment_is_written_separately() {
    let n = 512;
    let mut table = test_scene(n, 0);
    table
        .add_column(Column::new("lod", vec![0.0f32; n]))
        .unwrap();
    let env = test_scene(64, 0);

    let dir = tempfile::tempdir().unwrap();
    let meta_path = dir.path().join("lod-meta.json");
    write_lod(
        &meta_path,
        &table,
        Some(&env),
        &LodOptions {
            bundle: true,
            iterations: 2,
            chunk_count: 1,
            chunk_extent: 1e9,
        },
    )
    .unwrap();

    let meta: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
    assert_eq!(meta["environment"], "env.sog");

    let env_restored = read_sog(&dir.path().join("env.sog")).unwrap();
    assert_eq!(env_restored.num_rows(), 64);
}

#[test]
fn lod_tree_references_valid_files() {
    let n = 4096;
    let mut table = test_scene(n, 0);
    table
        .add_column(Column::new("lod", vec![0.0f32; n]))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let meta_path = dir.path().join("lod-meta.json");
    write_lod(
        &meta_path,
        &table,
        None,
        &LodOptions {
            bundle: true,
            iterations: 2,
            chunk_count: 1,
            chunk_extent: 4.0,
        },
    )
    .unwrap();

    let meta: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
    let filenames = meta["filenames"].as_array().unwrap().len();

    // every leaf's lod reference points into the filenames list and its
    // bound is a well-formed box
    fn walk(node: &serde_json::Value, filenames: usize, leaves: &mut usize) {
        let bound = &node["bound"];
        for axis in 0..3 {
            let min = bound["min"][axis].as_f64().unwrap();
            let max = bound["max"][axis].as_f64().unwrap();
            assert!(min <= max);
        }
        if let Some(children) = node["children"].as_array() {
            for child in children {
                walk(child, filenames, leaves);
            }
        } else {
            *leaves += 1;
            for (_, entry) in node["lods"].as_object().unwrap() {
                let file = entry["file"].as_u64().unwrap() as usize;
                assert!(file < filenames);
                assert!(entry["count"].as_u64().unwrap() > 0);
            }
        }
    }
    let mut leaves = 0usize;
    walk(&meta["tree"], filenames, &mut leaves);
    assert!(leaves > 1, "extent 4.0 must split the scene spatially");
}
