//! Closed-form rotation of spherical-harmonic coefficients, bands 1 to 3.
//!
//! Band k rotates by a fixed (2k+1)x(2k+1) matrix derived from the 3x3
//! rotation; band 2 is built from products of band-1 entries and band 3
//! from products of band-1 and band-2 entries (Kostelec/Rose recurrence).
//! Coefficients are laid out per channel: 3 for L1, then 5 for L2, then 7
//! for L3 (15 in total), with the DC term excluded.

use nalgebra::Matrix3;

pub struct ShRotation {
    sh1: [[f32; 3]; 3],
    sh2: [[f32; 5]; 5],
    sh3: [[f32; 7]; 7],
}

impl ShRotation {
    pub fn new(mat: &Matrix3<f32>) -> ShRotation {
        let k_sqrt_01_04: f32 = (1.0f32 / 4.0).sqrt(); // sqrt(1/4)
        let k_sqrt_03_02: f32 = (3.0f32 / 2.0).sqrt();
        let k_sqrt_01_03: f32 = (1.0f32 / 3.0).sqrt();
        let k_sqrt_02_03: f32 = (2.0f32 / 3.0).sqrt();
        let k_sqrt_04_03: f32 = (4.0f32 / 3.0).sqrt();
        let k_sqrt_03_04: f32 = (3.0f32 / 4.0).sqrt();
        let k_sqrt_01_05: f32 = (1.0f32 / 5.0).sqrt();
        let k_sqrt_03_05: f32 = (3.0f32 / 5.0).sqrt();
        let k_sqrt_06_05: f32 = (6.0f32 / 5.0).sqrt();
        let k_sqrt_08_05: f32 = (8.0f32 / 5.0).sqrt();
        let k_sqrt_09_05: f32 = (9.0f32 / 5.0).sqrt();
        let k_sqrt_01_06: f32 = (1.0f32 / 6.0).sqrt();
        let k_sqrt_05_06: f32 = (5.0f32 / 6.0).sqrt();
        let k_sqrt_05_08: f32 = (5.0f32 / 8.0).sqrt();
        let k_sqrt_03_08: f32 = (3.0f32 / 8.0).sqrt();
        let k_sqrt_09_08: f32 = (9.0f32 / 8.0).sqrt();
        let k_sqrt_05_09: f32 = (5.0f32 / 9.0).sqrt();
        let k_sqrt_08_09: f32 = (8.0f32 / 9.0).sqrt();
        let k_sqrt_01_10: f32 = (1.0f32 / 10.0).sqrt();
        let k_sqrt_03_10: f32 = (3.0f32 / 10.0).sqrt();
        let k_sqrt_01_12: f32 = (1.0f32 / 12.0).sqrt();
        let k_sqrt_04_15: f32 = (4.0f32 / 15.0).sqrt();
        let k_sqrt_01_16: f32 = (1.0f32 / 16.0).sqrt();
        let k_sqrt_15_16: f32 = (15.0f32 / 16.0).sqrt();
        let k_sqrt_01_18: f32 = (1.0f32 / 18.0).sqrt();
        let k_sqrt_01_60: f32 = (1.0f32 / 60.0).sqrt();

        let r = |i: usize, j: usize| mat[(i, j)];

        let mut sh1 = [[0.0f32; 3]; 3];
        sh1[0][0] = r(1, 1);
        sh1[0][1] = -r(1, 2);
        sh1[0][2] = r(1, 0);
        sh1[1][0] = -r(2, 1);
        sh1[1][1] = r(2, 2);
        sh1[1][2] = -r(2, 0);
        sh1[2][0] = r(0, 1);
        sh1[2][1] = -r(0, 2);
        sh1[2][2] = r(0, 0);

        let mut sh2 = [[0.0f32; 5]; 5];
        sh2[0][0] = k_sqrt_01_04
            * ((sh1[2][2] * sh1[0][0] + sh1[2][0] * sh1[0][2])
                + (sh1[0][2] * sh1[2][0] + sh1[0][0] * sh1[2][2]));
        sh2[0][1] = sh1[2][1] * sh1[0][0] + sh1[0][1] * sh1[2][0];
        sh2[0][2] = k_sqrt_03_04 * (sh1[2][1] * sh1[0][1] + sh1[0][1] * sh1[2][1]);
        sh2[0][3] = sh1[2][1] * sh1[0][2] + sh1[0][1] * sh1[2][2];
        sh2[0][4] = k_sqrt_01_04
            * ((sh1[2][2] * sh1[0][2] - sh1[2][0] * sh1[0][0])
                + (sh1[0][2] * sh1[2][2] - sh1[0][0] * sh1[2][0]));

        sh2[1][0] = k_sqrt_01_04
            * ((sh1[1][2] * sh1[0][0] + sh1[1][0] * sh1[0][2])
                + (sh1[0][2] * sh1[1][0] + sh1[0][0] * sh1[1][2]));
        sh2[1][1] = sh1[1][1] * sh1[0][0] + sh1[0][1] * sh1[1][0];
        sh2[1][2] = k_sqrt_03_04 * (sh1[1][1] * sh1[0][1] + sh1[0][1] * sh1[1][1]);
        sh2[1][3] = sh1[1][1] * sh1[0][2] + sh1[0][1] * sh1[1][2];
        sh2[1][4] = k_sqrt_01_04
            * ((sh1[1][2] * sh1[0][2] - sh1[1][0] * sh1[0][0])
                + (sh1[0][2] * sh1[1][2] - sh1[0][0] * sh1[1][0]));

        sh2[2][0] = k_sqrt_01_03 * (sh1[1][2] * sh1[1][0] + sh1[1][0] * sh1[1][2])
            - k_sqrt_01_12
                * ((sh1[2][2] * sh1[2][0] + sh1[2][0] * sh1[2][2])
                    + (sh1[0][2] * sh1[0][0] + sh1[0][0] * sh1[0][2]));
        sh2[2][1] = k_sqrt_04_03 * sh1[1][1] * sh1[1][0]
            - k_sqrt_01_03 * (sh1[2][1] * sh1[2][0] + sh1[0][1] * sh1[0][0]);
        sh2[2][2] = sh1[1][1] * sh1[1][1]
            - k_sqrt_01_04 * (sh1[2][1] * sh1[2][1] + sh1[0][1] * sh1[0][1]);
        sh2[2][3] = k_sqrt_04_03 * sh1[1][1] * sh1[1][2]
            - k_sqrt_01_03 * (sh1[2][1] * sh1[2][2] + sh1[0][1] * sh1[0][2]);
        sh2[2][4] = k_sqrt_01_03 * (sh1[1][2] * sh1[1][2] - sh1[1][0] * sh1[1][0])
            - k_sqrt_01_12
                * ((sh1[2][2] * sh1[2][2] - sh1[2][0] * sh1[2][0])
                    + (sh1[0][2] * sh1[0][2] - sh1[0][0] * sh1[0][0]));

        sh2[3][0] = k_sqrt_01_04
            * ((sh1[1][2] * sh1[2][0] + sh1[1][0] * sh1[2][2])
                + (sh1[2][2] * sh1[1][0] + sh1[2][0] * sh1[1][2]));
        sh2[3][1] = sh1[1][1] * sh1[2][0] + sh1[2][1] * sh1[1][0];
        sh2[3][2] = k_sqrt_03_04 * (sh1[1][1] * sh1[2][1] + sh1[2][1] * sh1[1][1]);
        sh2[3][3] = sh1[1][1] * sh1[2][2] + sh1[2][1] * sh1[1][2];
        sh2[3][4] = k_sqrt_01_04
            * ((sh1[1][2] * sh1[2][2] - sh1[1][0] * sh1[2][0])
                + (sh1[2][2] * sh1[1][2] - sh1[2][0] * sh1[1][0]));

        sh2[4][0] = k_sqrt_01_04
            * ((sh1[2][2] * sh1[2][0] + sh1[2][0] * sh1[2][2])
                - (sh1[0][2] * sh1[0][0] + sh1[0][0] * sh1[0][2]));
        sh2[4][1] = sh1[2][1] * sh1[2][0] - sh1[0][1] * sh1[0][0];
        sh2[4][2] = k_sqrt_03_04 * (sh1[2][1] * sh1[2][1] - sh1[0][1] * sh1[0][1]);
        sh2[4][3] = sh1[2][1] * sh1[2][2] - sh1[0][1] * sh1[0][2];
        sh2[4][4] = k_sqrt_01_04
            * ((sh1[2][2] * sh1[2][2] - sh1[2][0] * sh1[2][0])
                - (sh1[0][2] * sh1[0][2] - sh1[0][0] * sh1[0][0]));

        let mut sh3 = [[0.0f32; 7]; 7];
        sh3[0][0] = k_sqrt_01_04
            * ((sh1[2][2] * sh2[0][0] + sh1[2][0] * sh2[0][4])
                + (sh1[0][2] * sh2[4][0] + sh1[0][0] * sh2[4][4]));
        sh3[0][1] = k_sqrt_03_02 * (sh1[2][1] * sh2[0][0] + sh1[0][1] * sh2[4][0]);
        sh3[0][2] = k_sqrt_15_16 * (sh1[2][1] * sh2[0][1] + sh1[0][1] * sh2[4][1]);
        sh3[0][3] = k_sqrt_05_06 * (sh1[2][1] * sh2[0][2] + sh1[0][1] * sh2[4][2]);
        sh3[0][4] = k_sqrt_15_16 * (sh1[2][1] * sh2[0][3] + sh1[0][1] * sh2[4][3]);
        sh3[0][5] = k_sqrt_03_02 * (sh1[2][1] * sh2[0][4] + sh1[0][1] * sh2[4][4]);
        sh3[0][6] = k_sqrt_01_04
            * ((sh1[2][2] * sh2[0][4] - sh1[2][0] * sh2[0][0])
                + (sh1[0][2] * sh2[4][4] - sh1[0][0] * sh2[4][0]));

        sh3[1][0] = k_sqrt_01_06 * (sh1[1][2] * sh2[0][0] + sh1[1][0] * sh2[0][4])
            + k_sqrt_01_06
                * ((sh1[2][2] * sh2[1][0] + sh1[2][0] * sh2[1][4])
                    + (sh1[0][2] * sh2[3][0] + sh1[0][0] * sh2[3][4]));
        sh3[1][1] = sh1[1][1] * sh2[0][0] + (sh1[2][1] * sh2[1][0] + sh1[0][1] * sh2[3][0]);
        sh3[1][2] = k_sqrt_05_08 * sh1[1][1] * sh2[0][1]
            + k_sqrt_05_08 * (sh1[2][1] * sh2[1][1] + sh1[0][1] * sh2[3][1]);
        sh3[1][3] = k_sqrt_05_09 * sh1[1][1] * sh2[0][2]
            + k_sqrt_05_09 * (sh1[2][1] * sh2[1][2] + sh1[0][1] * sh2[3][2]);
        sh3[1][4] = k_sqrt_05_08 * sh1[1][1] * sh2[0][3]
            + k_sqrt_05_08 * (sh1[2][1] * sh2[1][3] + sh1[0][1] * sh2[3][3]);
        sh3[1][5] = sh1[1][1] * sh2[0][4] + (sh1[2][1] * sh2[1][4] + sh1[0][1] * sh2[3][4]);
        sh3[1][6] = k_sqrt_01_06 * (sh1[1][2] * sh2[0][4] - sh1[1][0] * sh2[0][0])
            + k_sqrt_01_06
                * ((sh1[2][2] * sh2[1][4] - sh1[2][0] * sh2[1][0])
                    + (sh1[0][2] * sh2[3][4] - sh1[0][0] * sh2[3][0]));

        sh3[2][0] = k_sqrt_04_15 * (sh1[1][2] * sh2[1][0] + sh1[1][0] * sh2[1][4])
            + k_sqrt_01_05 * (sh1[0][2] * sh2[2][0] + sh1[0][0] * sh2[2][4])
            - k_sqrt_01_60
                * ((sh1[2][2] * sh2[0][0] + sh1[2][0] * sh2[0][4])
                    - (sh1[0][2] * sh2[4][0] + sh1[0][0] * sh2[4][4]));
        sh3[2][1] = k_sqrt_08_05 * sh1[1][1] * sh2[1][0] + k_sqrt_06_05 * sh1[0][1] * sh2[2][0]
            - k_sqrt_01_10 * (sh1[2][1] * sh2[0][0] - sh1[0][1] * sh2[4][0]);
        sh3[2][2] = sh1[1][1] * sh2[1][1] + k_sqrt_03_04 * sh1[0][1] * sh2[2][1]
            - k_sqrt_01_16 * (sh1[2][1] * sh2[0][1] - sh1[0][1] * sh2[4][1]);
        sh3[2][3] = k_sqrt_08_09 * sh1[1][1] * sh2[1][2] + k_sqrt_02_03 * sh1[0][1] * sh2[2][2]
            - k_sqrt_01_18 * (sh1[2][1] * sh2[0][2] - sh1[0][1] * sh2[4][2]);
        sh3[2][4] = sh1[1][1] * sh2[1][3] + k_sqrt_03_04 * sh1[0][1] * sh2[2][3]
            - k_sqrt_01_16 * (sh1[2][1] * sh2[0][3] - sh1[0][1] * sh2[4][3]);
        sh3[2][5] = k_sqrt_08_05 * sh1[1][1] * sh2[1][4] + k_sqrt_06_05 * sh1[0][1] * sh2[2][4]
            - k_sqrt_01_10 * (sh1[2][1] * sh2[0][4] - sh1[0][1] * sh2[4][4]);
        sh3[2][6] = k_sqrt_04_15 * (sh1[1][2] * sh2[1][4] - sh1[1][0] * sh2[1][0])
            + k_sqrt_01_05 * (sh1[0][2] * sh2[2][4] - sh1[0][0] * sh2[2][0])
            - k_sqrt_01_60
                * ((sh1[2][2] * sh2[0][4] - sh1[2][0] * sh2[0][0])
                    - (sh1[0][2] * sh2[4][4] - sh1[0][0] * sh2[4][0]));

        sh3[3][0] = k_sqrt_03_10 * (sh1[1][2] * sh2[2][0] + sh1[1][0] * sh2[2][4])
            - k_sqrt_01_10
                * ((sh1[2][2] * sh2[3][0] + sh1[2][0] * sh2[3][4])
                    + (sh1[0][2] * sh2[1][0] + sh1[0][0] * sh2[1][4]));
        sh3[3][1] = k_sqrt_09_05 * sh1[1][1] * sh2[2][0]
            - k_sqrt_03_05 * (sh1[2][1] * sh2[3][0] + sh1[0][1] * sh2[1][0]);
        sh3[3][2] = k_sqrt_09_08 * sh1[1][1] * sh2[2][1]
            - k_sqrt_03_08 * (sh1[2][1] * sh2[3][1] + sh1[0][1] * sh2[1][1]);
        sh3[3][3] = sh1[1][1] * sh2[2][2]
            - k_sqrt_01_03 * (sh1[2][1] * sh2[3][2] + sh1[0][1] * sh2[1][2]);
        sh3[3][4] = k_sqrt_09_08 * sh1[1][1] * sh2[2][3]
            - k_sqrt_03_08 * (sh1[2][1] * sh2[3][3] + sh1[0][1] * sh2[1][3]);
        sh3[3][5] = k_sqrt_09_05 * sh1[1][1] * sh2[2][4]
            - k_sqrt_03_05 * (sh1[2][1] * sh2[3][4] + sh1[0][1] * sh2[1][4]);
        sh3[3][6] = k_sqrt_03_10 * (sh1[1][2] * sh2[2][4] - sh1[1][0] * sh2[2][0])
            - k_sqrt_01_10
                * ((sh1[2][2] * sh2[3][4] - sh1[2][0] * sh2[3][0])
                    + (sh1[0][2] * sh2[1][4] - sh1[0][0] * sh2[1][0]));

        sh3[4][0] = k_sqrt_04_15 * (sh1[1][2] * sh2[3][0] + sh1[1][0] * sh2[3][4])
            + k_sqrt_01_05 * (sh1[2][2] * sh2[2][0] + sh1[2][0] * sh2[2][4])
            - k_sqrt_01_60
                * ((sh1[2][2] * sh2[4][0] + sh1[2][0] * sh2[4][4])
                    + (sh1[0][2] * sh2[0][0] + sh1[0][0] * sh2[0][4]));
        sh3[4][1] = k_sqrt_08_05 * sh1[1][1] * sh2[3][0] + k_sqrt_06_05 * sh1[2][1] * sh2[2][0]
            - k_sqrt_01_10 * (sh1[2][1] * sh2[4][0] + sh1[0][1] * sh2[0][0]);
        sh3[4][2] = sh1[1][1] * sh2[3][1] + k_sqrt_03_04 * sh1[2][1] * sh2[2][1]
            - k_sqrt_01_16 * (sh1[2][1] * sh2[4][1] + sh1[0][1] * sh2[0][1]);
        sh3[4][3] = k_sqrt_08_09 * sh1[1][1] * sh2[3][2] + k_sqrt_02_03 * sh1[2][1] * sh2[2][2]
            - k_sqrt_01_18 * (sh1[2][1] * sh2[4][2] + sh1[0][1] * sh2[0][2]);
        sh3[4][4] = sh1[1][1] * sh2[3][3] + k_sqrt_03_04 * sh1[2][1] * sh2[2][3]
            - k_sqrt_01_16 * (sh1[2][1] * sh2[4][3] + sh1[0][1] * sh2[0][3]);
        sh3[4][5] = k_sqrt_08_05 * sh1[1][1] * sh2[3][4] + k_sqrt_06_05 * sh1[2][1] * sh2[2][4]
            - k_sqrt_01_10 * (sh1[2][1] * sh2[4][4] + sh1[0][1] * sh2[0][4]);
        sh3[4][6] = k_sqrt_04_15 * (sh1[1][2] * sh2[3][4] - sh1[1][0] * sh2[3][0])
            + k_sqrt_01_05 * (sh1[2][2] * sh2[2][4] - sh1[2][0] * sh2[2][0])
            - k_sqrt_01_60
                * ((sh1[2][2] * sh2[4][4] - sh1[2][0] * sh2[4][0])
                    + (sh1[0][2] * sh2[0][4] - sh1[0][0] * sh2[0][0]));

        sh3[5][0] = k_sqrt_01_06 * (sh1[1][2] * sh2[4][0] + sh1[1][0] * sh2[4][4])
            + k_sqrt_01_06
                * ((sh1[2][2] * sh2[3][0] + sh1[2][0] * sh2[3][4])
                    - (sh1[0][2] * sh2[1][0] + sh1[0][0] * sh2[1][4]));
        sh3[5][1] = sh1[1][1] * sh2[4][0] + (sh1[2][1] * sh2[3][0] - sh1[0][1] * sh2[1][0]);
        sh3[5][2] = k_sqrt_05_08 * sh1[1][1] * sh2[4][1]
            + k_sqrt_05_08 * (sh1[2][1] * sh2[3][1] - sh1[0][1] * sh2[1][1]);
        sh3[5][3] = k_sqrt_05_09 * sh1[1][1] * sh2[4][2]
            + k_sqrt_05_09 * (sh1[2][1] * sh2[3][2] - sh1[0][1] * sh2[1][2]);
        sh3[5][4] = k_sqrt_05_08 * sh1[1][1] * sh2[4][3]
            + k_sqrt_05_08 * (sh1[2][1] * sh2[3][3] - sh1[0][1] * sh2[1][3]);
        sh3[5][5] = sh1[1][1] * sh2[4][4] + (sh1[2][1] * sh2[3][4] - sh1[0][1] * sh2[1][4]);
        sh3[5][6] = k_sqrt_01_06 * (sh1[1][2] * sh2[4][4] - sh1[1][0] * sh2[4][0])
            + k_sqrt_01_06
                * ((sh1[2][2] * sh2[3][4] - sh1[2][0] * sh2[3][0])
                    - (sh1[0][2] * sh2[1][4] - sh1[0][0] * sh2[1][0]));

        sh3[6][0] = k_sqrt_01_04
            * ((sh1[2][2] * sh2[4][0] + sh1[2][0] * sh2[4][4])
                - (sh1[0][2] * sh2[0][0] + sh1[0][0] * sh2[0][4]));
        sh3[6][1] = k_sqrt_03_02 * (sh1[2][1] * sh2[4][0] - sh1[0][1] * sh2[0][0]);
        sh3[6][2] = k_sqrt_15_16 * (sh1[2][1] * sh2[4][1] - sh1[0][1] * sh2[0][1]);
        sh3[6][3] = k_sqrt_05_06 * (sh1[2][1] * sh2[4][2] - sh1[0][1] * sh2[0][2]);
        sh3[6][4] = k_sqrt_15_16 * (sh1[2][1] * sh2[4][3] - sh1[0][1] * sh2[0][3]);
        sh3[6][5] = k_sqrt_03_02 * (sh1[2][1] * sh2[4][4] - sh1[0][1] * sh2[0][4]);
        sh3[6][6] = k_sqrt_01_04
            * ((sh1[2][2] * sh2[4][4] - sh1[2][0] * sh2[4][0])
                - (sh1[0][2] * sh2[0][4] - sh1[0][0] * sh2[0][0]));

        ShRotation { sh1, sh2, sh3 }
    }

    /// Rotate one channel's coefficients in place. `coeffs` holds 3, 8 or
    /// 15 values (bands 1, 1-2 or 1-3).
    pub fn apply(&self, coeffs: &mut [f32]) {
        if coeffs.len() < 3 {
            return;
        }
        let mut src = [0.0f32; 15];
        src[..coeffs.len()].copy_from_slice(coeffs);

        for i in 0..3 {
            coeffs[i] = dot(&src[0..3], &self.sh1[i]);
        }
        if coeffs.len() >= 8 {
            for i in 0..5 {
                coeffs[3 + i] = dot(&src[3..8], &self.sh2[i]);
            }
        }
        if coeffs.len() >= 15 {
            for i in 0..7 {
                coeffs[8 + i] = dot(&src[8..15], &self.sh3[i]);
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    fn rotation(axis: [f32; 3], angle: f32) -> Matrix3<f32> {
        Rotation3::from_axis_angle(
            &nalgebra::Unit::new_normalize(Vector3::new(axis[0], axis[1], axis[2])),
            angle,
        )
        .into_inner()
    }

    fn sample_coeffs() -> [f32; 15] {
        let mut c = [0.0f32; 15];
        for (i, v) in c.iter_mut().enumerate() {
            *v = ((i as f32) * 0.37 - 1.0).sin();
        }
        c
    }

    #[test]
    fn identity_rotation_is_a_no_op() {
        let rot = ShRotation::new(&Matrix3::identity());
        let mut coeffs = sample_coeffs();
        let original = coeffs;
        rot.apply(&mut coeffs);
        for (a, b) in coeffs.iter().zip(&original) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn rotation_preserves_per_band_norm() {
        let rot = ShRotation::new(&rotation([0.3, -0.8, 0.5], 1.1));
        let mut coeffs = sample_coeffs();
        let original = coeffs;
        rot.apply(&mut coeffs);

        let norm = |s: &[f32]| s.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm(&coeffs[0..3]) - norm(&original[0..3])).abs() < 1e-4);
        assert!((norm(&coeffs[3..8]) - norm(&original[3..8])).abs() < 1e-4);
        assert!((norm(&coeffs[8..15]) - norm(&original[8..15])).abs() < 1e-4);
    }

    #[test]
    fn composition_is_a_homomorphism() {
        let r1 = rotation([0.0, 1.0, 0.2], 0.7);
        let r2 = rotation([1.0, 0.1, -0.4], -1.3);

        let mut sequential = sample_coeffs();
        ShRotation::new(&r1).apply(&mut sequential);
        ShRotation::new(&r2).apply(&mut sequential);

        let mut combined = sample_coeffs();
        ShRotation::new(&(r2 * r1)).apply(&mut combined);

        for (a, b) in sequential.iter().zip(&combined) {
            let scale = b.abs().max(1.0);
            assert!(
                (a - b).abs() / scale < 1e-5,
                "sequential {a} vs combined {b}"
            );
        }
    }

    #[test]
    fn band_one_only_slice() {
        let rot = ShRotation::new(&rotation([0.0, 0.0, 1.0], 0.5));
        let mut coeffs = [1.0f32, 0.5, -0.25];
        rot.apply(&mut coeffs);
        // band-1 rotation is orthogonal: the norm survives
        let norm: f32 = coeffs.iter().map(|v| v * v).sum::<f32>().sqrt();
        let expect = (1.0f32 + 0.25 + 0.0625).sqrt();
        assert!((norm - expect).abs() < 1e-5);
    }
}
