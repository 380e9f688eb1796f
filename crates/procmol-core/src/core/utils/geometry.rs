use nalgebra::{Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Rotation about x followed by rotation about y, both in degrees.
pub fn rotation_xy(x_degrees: f64, y_degrees: f64) -> Rotation3<f64> {
    rotation_from_axis_angle(&Vector3::y(), y_degrees) * rotation_from_axis_angle(&Vector3::x(), x_degrees)
}

/// Volume of the spherical shell between radii `inner` and `outer`.
pub fn spherical_shell_volume(inner: f64, outer: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * (outer.powi(3) - inner.powi(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_xy_with_zero_angles_is_identity() {
        let r = rotation_xy(0.0, 0.0);
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert!((r * v - v).norm() < 1e-12);
    }

    #[test]
    fn quarter_turn_about_x_maps_y_to_z() {
        let r = rotation_xy(90.0, 0.0);
        assert!((r * Vector3::y() - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn shell_volume_of_unit_sphere() {
        let v = spherical_shell_volume(0.0, 1.0);
        assert!((v - 4.0 / 3.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
