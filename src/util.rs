use crate::types::Rotation;

// All times inside the engine are f64 seconds. Inputs arrive in internal
// units (microseconds scaled by a display factor) and are converted once.

/// Time accuracy of the integration grid: points closer than `TACC / 2`
/// are merged into one.
pub(crate) const TACC: f64 = 1e-10;

/// Snap a time point to the grid accuracy. Non-finite values pass through
/// and are filtered by the callers.
pub(crate) fn round_acc(sec: f64) -> f64 {
    if !sec.is_finite() {
        return sec;
    }
    TACC * (sec / TACC).round()
}

pub(crate) fn clamp_non_negative(sec: f64) -> f64 {
    if sec < 0.0 {
        0.0
    } else {
        sec
    }
}

/// Convert a time from internal units to seconds. A zero factor means the
/// value already is in seconds.
pub(crate) fn internal_to_seconds(value: f64, t_factor: f64) -> f64 {
    if t_factor == 0.0 {
        value
    } else {
        value / t_factor * 1e-6
    }
}

/// 3x3 rotation matrix, built once per evaluation point from a block's
/// rotation quaternion.
pub(crate) struct RotationMatrix([[f64; 3]; 3]);

impl RotationMatrix {
    pub fn from_quaternion(rotation: &Rotation) -> Self {
        let [w, x, y, z] = rotation.quat;
        Self([
            [
                1.0 - 2.0 * y * y - 2.0 * z * z,
                2.0 * x * y - 2.0 * w * z,
                2.0 * x * z + 2.0 * w * y,
            ],
            [
                2.0 * x * y + 2.0 * w * z,
                1.0 - 2.0 * x * x - 2.0 * z * z,
                2.0 * y * z - 2.0 * w * x,
            ],
            [
                2.0 * x * z - 2.0 * w * y,
                2.0 * y * z + 2.0 * w * x,
                1.0 - 2.0 * x * x - 2.0 * y * y,
            ],
        ])
    }

    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn random_unit_quaternion() -> Rotation {
        loop {
            let q: [f64; 4] = [
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
            ];
            let norm = q.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 1e-3 {
                return Rotation {
                    quat: [q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm],
                };
            }
        }
    }

    #[test]
    fn identity_quaternion() {
        let m = RotationMatrix::from_quaternion(&Rotation {
            quat: [1.0, 0.0, 0.0, 0.0],
        });
        let v = [1.25, -3.5, 0.75];
        check!(m.apply(v) == v);
    }

    #[test]
    fn rotation_preserves_norm() {
        for _ in 0..1000 {
            let m = RotationMatrix::from_quaternion(&random_unit_quaternion());
            let v = [
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
            ];
            let r = m.apply(v);
            let n0 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            let n1 = r.iter().map(|x| x * x).sum::<f64>().sqrt();
            check!((n0 - n1).abs() < 1e-9);
        }
    }

    #[test]
    fn quarter_turn_about_z() {
        // 90 degrees about z maps x onto y
        let half = std::f64::consts::FRAC_PI_4;
        let m = RotationMatrix::from_quaternion(&Rotation {
            quat: [half.cos(), 0.0, 0.0, half.sin()],
        });
        let r = m.apply([1.0, 0.0, 0.0]);
        check!((r[0] - 0.0).abs() < 1e-12);
        check!((r[1] - 1.0).abs() < 1e-12);
        check!((r[2] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn rounding_snaps_to_grid() {
        check!(round_acc(1.00000000004e-3) == 1e-3);
        check!(round_acc(0.0) == 0.0);
        check!(round_acc(f64::NAN).is_nan());
    }

    #[test]
    fn internal_unit_conversion() {
        // t_factor of 1: internal units are microseconds
        check!(internal_to_seconds(1000.0, 1.0) == 1e-3);
        // t_factor of 0: values already are seconds
        check!(internal_to_seconds(0.5, 0.0) == 0.5);
        check!((internal_to_seconds(2000.0, 2.0) - 1e-3).abs() < 1e-15);
    }
}
