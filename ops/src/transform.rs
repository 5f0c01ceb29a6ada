//! Rigid transform of a splat table: positions, orientations, log-scales
//! and spherical-harmonic coefficients.

use gsplat_core::{detect_sh_bands, sh_coeff_column, DataTable, Result};
use gsplat_maths::ShRotation;
use nalgebra::{UnitQuaternion, Vector3};

/// Apply one translate/rotate/scale to every row.
///
/// Positions map through `p' = R * (s * p) + t`; quaternions compose as
/// `q' = r * q` (renormalized, `rot_0` is w); log-scales gain `ln s`; SH
/// coefficients above DC rotate band-wise with the closed-form matrices.
pub fn transform(
    table: &mut DataTable,
    t: Vector3<f32>,
    r: UnitQuaternion<f32>,
    s: f32,
) -> Result<()> {
    let rows = table.num_rows();
    let rot = r.to_rotation_matrix().into_inner();

    let has_position =
        table.has_column("x") && table.has_column("y") && table.has_column("z");
    let has_rotation = table.has_column("rot_0")
        && table.has_column("rot_1")
        && table.has_column("rot_2")
        && table.has_column("rot_3");
    let has_scale = table.has_column("scale_0")
        && table.has_column("scale_1")
        && table.has_column("scale_2");

    let bands = detect_sh_bands(table)?;
    let coeffs_per_channel = bands.coeffs_per_channel();
    if coeffs_per_channel > 0 {
        tracing::debug!(
            bands = bands.band_count(),
            coeffs_per_channel,
            "rotating spherical harmonics"
        );
    }

    if has_position {
        let mut xs = table.column_by_name("x")?.as_f32()?.to_vec();
        let mut ys = table.column_by_name("y")?.as_f32()?.to_vec();
        let mut zs = table.column_by_name("z")?.as_f32()?.to_vec();
        for i in 0..rows {
            let p = rot * (Vector3::new(xs[i], ys[i], zs[i]) * s) + t;
            xs[i] = p.x;
            ys[i] = p.y;
            zs[i] = p.z;
        }
        table.column_by_name_mut("x")?.as_f32_mut()?.copy_from_slice(&xs);
        table.column_by_name_mut("y")?.as_f32_mut()?.copy_from_slice(&ys);
        table.column_by_name_mut("z")?.as_f32_mut()?.copy_from_slice(&zs);
    }

    if has_rotation {
        let mut qw = table.column_by_name("rot_0")?.as_f32()?.to_vec();
        let mut qx = table.column_by_name("rot_1")?.as_f32()?.to_vec();
        let mut qy = table.column_by_name("rot_2")?.as_f32()?.to_vec();
        let mut qz = table.column_by_name("rot_3")?.as_f32()?.to_vec();
        for i in 0..rows {
            let q = nalgebra::Quaternion::new(qw[i], qx[i], qy[i], qz[i]);
            let combined = UnitQuaternion::from_quaternion(r.into_inner() * q);
            qw[i] = combined.w;
            qx[i] = combined.i;
            qy[i] = combined.j;
            qz[i] = combined.k;
        }
        table.column_by_name_mut("rot_0")?.as_f32_mut()?.copy_from_slice(&qw);
        table.column_by_name_mut("rot_1")?.as_f32_mut()?.copy_from_slice(&qx);
        table.column_by_name_mut("rot_2")?.as_f32_mut()?.copy_from_slice(&qy);
        table.column_by_name_mut("rot_3")?.as_f32_mut()?.copy_from_slice(&qz);
    }

    if has_scale && s != 1.0 {
        let log_s = s.ln();
        for name in ["scale_0", "scale_1", "scale_2"] {
            for v in table.column_by_name_mut(name)?.as_f32_mut()? {
                *v += log_s;
            }
        }
    }

    if coeffs_per_channel > 0 {
        let sh_rotation = ShRotation::new(&rot);
        let mut coeffs = vec![0.0f32; coeffs_per_channel];

        for channel in 0..3 {
            let names: Vec<String> = (0..coeffs_per_channel)
                .map(|j| format!("f_rest_{}", sh_coeff_column(channel, j)))
                .collect();

            let mut columns: Vec<Vec<f32>> = Vec::with_capacity(coeffs_per_channel);
            for name in &names {
                columns.push(table.column_by_name(name)?.as_f32()?.to_vec());
            }

            for i in 0..rows {
                for (j, col) in columns.iter().enumerate() {
                    coeffs[j] = col[i];
                }
                sh_rotation.apply(&mut coeffs);
                for (j, col) in columns.iter_mut().enumerate() {
                    col[i] = coeffs[j];
                }
            }

            for (name, col) in names.iter().zip(&columns) {
                table.column_by_name_mut(name)?.as_f32_mut()?.copy_from_slice(col);
            }
        }
    }

    Ok(())
}
