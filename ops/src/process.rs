//! Applies an ordered action list to a table.
//!
//! Filters build a keep mask and permute the surviving rows into a fresh
//! table; transforms mutate in place; band filtering removes columns.

use gsplat_core::{sh_coeffs_for_bands, Column, DataTable, Result};
use nalgebra::{UnitQuaternion, Vector3};

use crate::actions::Action;
use crate::transform::transform;

fn filter_rows(table: &DataTable, keep: impl Fn(usize) -> bool) -> Result<DataTable> {
    let indices: Vec<u32> = (0..table.num_rows())
        .filter(|&i| keep(i))
        .map(|i| i as u32)
        .collect();
    table.permute_rows(&indices)
}

/// Column names checked by the NaN filter.
fn finite_checked_columns(table: &DataTable) -> Vec<usize> {
    table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let n = c.name.as_str();
            matches!(n, "x" | "y" | "z" | "opacity")
                || n.starts_with("rot_")
                || n.starts_with("scale_")
                || n.starts_with("f_dc_")
                || n.starts_with("f_rest_")
        })
        .map(|(i, _)| i)
        .collect()
}

/// Euler angles in degrees, XYZ intrinsic, to a quaternion.
pub fn euler_to_quat(degrees: Vector3<f32>) -> UnitQuaternion<f32> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), degrees.x.to_radians());
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), degrees.y.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), degrees.z.to_radians());
    rx * ry * rz
}

/// Run the action list left to right and return the resulting table.
pub fn process(mut table: DataTable, actions: &[Action]) -> Result<DataTable> {
    for action in actions {
        match action {
            Action::Translate(v) => {
                transform(&mut table, *v, UnitQuaternion::identity(), 1.0)?;
            }
            Action::Rotate(euler) => {
                transform(&mut table, Vector3::zeros(), euler_to_quat(*euler), 1.0)?;
            }
            Action::Scale(s) => {
                transform(&mut table, Vector3::zeros(), UnitQuaternion::identity(), *s)?;
            }
            Action::FilterNan => {
                let checked = finite_checked_columns(&table);
                let slices: Vec<&[f32]> = checked
                    .iter()
                    .map(|&i| table.column(i).as_f32())
                    .collect::<Result<_>>()?;
                let keep: Vec<bool> = (0..table.num_rows())
                    .map(|i| slices.iter().all(|s| s[i].is_finite()))
                    .collect();
                table = filter_rows(&table, |i| keep[i])?;
            }
            Action::FilterByValue {
                column,
                comparator,
                value,
            } => {
                let col = table.column_by_name(column)?;
                let keep: Vec<bool> = (0..table.num_rows())
                    .map(|i| col.get::<f32>(i).map(|v| comparator.test(v, *value)))
                    .collect::<Result<_>>()?;
                table = filter_rows(&table, |i| keep[i])?;
            }
            Action::FilterBands(bands) => {
                let keep = sh_coeffs_for_bands(*bands as usize);
                for i in keep..45 {
                    table.remove_column(&format!("f_rest_{i}"));
                }
            }
            Action::FilterBox { min, max } => {
                let x = table.column_by_name("x")?.as_f32()?;
                let y = table.column_by_name("y")?.as_f32()?;
                let z = table.column_by_name("z")?.as_f32()?;
                let keep: Vec<bool> = (0..table.num_rows())
                    .map(|i| {
                        x[i] >= min.x
                            && x[i] <= max.x
                            && y[i] >= min.y
                            && y[i] <= max.y
                            && z[i] >= min.z
                            && z[i] <= max.z
                    })
                    .collect();
                table = filter_rows(&table, |i| keep[i])?;
            }
            Action::FilterSphere { center, radius } => {
                let x = table.column_by_name("x")?.as_f32()?;
                let y = table.column_by_name("y")?.as_f32()?;
                let z = table.column_by_name("z")?.as_f32()?;
                let r2 = radius * radius;
                let keep: Vec<bool> = (0..table.num_rows())
                    .map(|i| {
                        let d = Vector3::new(x[i] - center.x, y[i] - center.y, z[i] - center.z);
                        d.norm_squared() <= r2
                    })
                    .collect();
                table = filter_rows(&table, |i| keep[i])?;
            }
            Action::Param { key, value } => {
                tracing::debug!(key, value, "generator parameter");
            }
            Action::Lod(level) => {
                let value = *level as f32;
                if table.has_column("lod") {
                    table
                        .column_by_name_mut("lod")?
                        .as_f32_mut()?
                        .fill(value);
                } else {
                    let rows = table.num_rows();
                    table.add_column(Column::new("lod", vec![value; rows]))?;
                }
            }
        }
    }
    Ok(table)
}

/// Split the environment rows (`lod == -1`) from the rest.
///
/// Returns `(environment, main)`; either side is `None` when empty. Tables
/// without a `lod` column are entirely non-environment.
pub fn split_environment(table: DataTable) -> Result<(Option<DataTable>, Option<DataTable>)> {
    if !table.has_column("lod") {
        return Ok((None, Some(table)));
    }

    let lod = table.column_by_name("lod")?.as_f32()?;
    let is_env: Vec<bool> = lod.iter().map(|&v| (v + 1.0).abs() < 1e-10).collect();
    let env_count = is_env.iter().filter(|&&e| e).count();

    if env_count == 0 {
        return Ok((None, Some(table)));
    }
    if env_count == table.num_rows() {
        return Ok((Some(table), None));
    }

    let env = filter_rows(&table, |i| is_env[i])?;
    let main = filter_rows(&table, |i| !is_env[i])?;
    Ok((Some(env), Some(main)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsplat_core::Column;

    fn splat_table(positions: &[[f32; 3]]) -> DataTable {
        let n = positions.len();
        let mut t = DataTable::default();
        t.add_column(Column::new("x", positions.iter().map(|p| p[0]).collect::<Vec<_>>()))
            .unwrap();
        t.add_column(Column::new("y", positions.iter().map(|p| p[1]).collect::<Vec<_>>()))
            .unwrap();
        t.add_column(Column::new("z", positions.iter().map(|p| p[2]).collect::<Vec<_>>()))
            .unwrap();
        t.add_column(Column::new("rot_0", vec![1.0f32; n])).unwrap();
        for name in ["rot_1", "rot_2", "rot_3", "scale_0", "scale_1", "scale_2", "opacity"] {
            t.add_column(Column::new(name, vec![0.0f32; n])).unwrap();
        }
        for name in ["f_dc_0", "f_dc_1", "f_dc_2"] {
            t.add_column(Column::new(name, vec![0.5f32; n])).unwrap();
        }
        t
    }

    #[test]
    fn scale_then_translate_composes() {
        let table = splat_table(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let out = process(
            table,
            &[
                Action::Scale(2.0),
                Action::Translate(Vector3::new(10.0, 0.0, 0.0)),
            ],
        )
        .unwrap();

        assert_eq!(out.column_by_name("x").unwrap().as_f32().unwrap(), &[10.0, 12.0]);
        let s = out.column_by_name("scale_0").unwrap().as_f32().unwrap();
        assert!((s[0] - 2.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn filter_bands_removes_trailing_columns() {
        let mut table = splat_table(&[[0.0; 3], [1.0; 3]]);
        for i in 0..45 {
            table
                .add_column(Column::new(format!("f_rest_{i}"), vec![0.1f32; 2]))
                .unwrap();
        }
        let out = process(table, &[Action::FilterBands(1)]).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert!(out.has_column("f_rest_8"));
        assert!(!out.has_column("f_rest_9"));
        assert!(!out.has_column("f_rest_44"));
    }

    #[test]
    fn filter_nan_drops_bad_rows() {
        let mut table = splat_table(&[[0.0; 3], [1.0; 3], [2.0; 3]]);
        table.column_by_name_mut("opacity").unwrap().as_f32_mut().unwrap()[1] = f32::NAN;
        let out = process(table, &[Action::FilterNan]).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column_by_name("x").unwrap().as_f32().unwrap(), &[0.0, 2.0]);
    }

    #[test]
    fn filter_box_and_sphere() {
        let table = splat_table(&[[0.0; 3], [5.0, 0.0, 0.0], [100.0, 0.0, 0.0]]);
        let out = process(
            table,
            &[Action::FilterBox {
                min: Vector3::new(-1.0, f32::NEG_INFINITY, f32::NEG_INFINITY),
                max: Vector3::new(10.0, f32::INFINITY, f32::INFINITY),
            }],
        )
        .unwrap();
        assert_eq!(out.num_rows(), 2);

        let out = process(
            out,
            &[Action::FilterSphere {
                center: Vector3::zeros(),
                radius: 1.0,
            }],
        )
        .unwrap();
        assert_eq!(out.num_rows(), 1);
    }

    #[test]
    fn filter_by_value_comparators() {
        let mut table = splat_table(&[[0.0; 3], [1.0; 3], [2.0; 3]]);
        table
            .add_column(Column::new("lod", vec![0.0f32, 1.0, 2.0]))
            .unwrap();
        let out = process(
            table,
            &[Action::FilterByValue {
                column: "lod".to_string(),
                comparator: crate::Comparator::Gte,
                value: 1.0,
            }],
        )
        .unwrap();
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn lod_action_creates_and_overwrites() {
        let table = splat_table(&[[0.0; 3], [1.0; 3]]);
        let out = process(table, &[Action::Lod(2)]).unwrap();
        assert_eq!(out.column_by_name("lod").unwrap().as_f32().unwrap(), &[2.0, 2.0]);
        let out = process(out, &[Action::Lod(0)]).unwrap();
        assert_eq!(out.column_by_name("lod").unwrap().as_f32().unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn environment_split_by_lod() {
        let mut table = splat_table(&[[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3]]);
        table
            .add_column(Column::new("lod", vec![-1.0f32, 0.0, -1.0, 1.0]))
            .unwrap();
        let (env, main) = split_environment(table).unwrap();
        let env = env.unwrap();
        let main = main.unwrap();

        assert_eq!(env.num_rows(), 2);
        assert!(env.column_by_name("lod").unwrap().every(-1.0));
        assert_eq!(main.num_rows(), 2);
        assert!(!main.column_by_name("lod").unwrap().some(-1.0));
        assert_eq!(env.column_by_name("x").unwrap().as_f32().unwrap(), &[0.0, 2.0]);
        assert_eq!(main.column_by_name("x").unwrap().as_f32().unwrap(), &[1.0, 3.0]);
    }

    #[test]
    fn split_without_lod_column_is_all_main() {
        let table = splat_table(&[[0.0; 3]]);
        let (env, main) = split_environment(table).unwrap();
        assert!(env.is_none());
        assert_eq!(main.unwrap().num_rows(), 1);
    }
}
