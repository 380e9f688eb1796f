use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

const ANGLE_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    NonPeriodic,
    Cubic,
    Orthorhombic,
    Triclinic,
}

#[derive(Debug, Error, PartialEq)]
pub enum BoxError {
    #[error("Box lengths must be finite and positive (got {0:?})")]
    InvalidLength([f64; 3]),
    #[error("Box angles {0:?} do not describe a valid cell")]
    InvalidAngles([f64; 3]),
}

/// The simulation cell of a configuration.
///
/// Axes are stored as the columns of a matrix so that `axes * fractional` yields a Cartesian
/// position. A non-periodic box still carries a pseudo-cell (used for fractional coordinates
/// and voxel scans) but never wraps distances.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBox {
    kind: BoxKind,
    lengths: Vector3<f64>,
    angles: Vector3<f64>,
    axes: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Default for SimBox {
    fn default() -> Self {
        Self {
            kind: BoxKind::Cubic,
            lengths: Vector3::repeat(1.0),
            angles: Vector3::repeat(90.0),
            axes: Matrix3::identity(),
            inverse: Matrix3::identity(),
        }
    }
}

impl SimBox {
    /// Creates a periodic cell from axis lengths (Å) and angles (degrees, alpha/beta/gamma).
    ///
    /// The box kind is inferred: all right angles give an orthorhombic cell (cubic when all
    /// three lengths agree), anything else is triclinic.
    pub fn new(lengths: Vector3<f64>, angles: Vector3<f64>) -> Result<Self, BoxError> {
        let orthogonal = angles.iter().all(|a| (a - 90.0).abs() < ANGLE_TOLERANCE);
        let kind = if !orthogonal {
            BoxKind::Triclinic
        } else if lengths.x == lengths.y && lengths.y == lengths.z {
            BoxKind::Cubic
        } else {
            BoxKind::Orthorhombic
        };
        Self::build(kind, lengths, angles)
    }

    pub fn cubic(length: f64) -> Result<Self, BoxError> {
        Self::new(Vector3::repeat(length), Vector3::repeat(90.0))
    }

    pub fn non_periodic(lengths: Vector3<f64>) -> Result<Self, BoxError> {
        Self::build(BoxKind::NonPeriodic, lengths, Vector3::repeat(90.0))
    }

    fn build(kind: BoxKind, lengths: Vector3<f64>, angles: Vector3<f64>) -> Result<Self, BoxError> {
        if lengths.iter().any(|l| !(l.is_finite() && *l > 0.0)) {
            return Err(BoxError::InvalidLength([lengths.x, lengths.y, lengths.z]));
        }
        let invalid_angles = || BoxError::InvalidAngles([angles.x, angles.y, angles.z]);
        if angles.iter().any(|a| !(*a > 0.0 && *a < 180.0)) {
            return Err(invalid_angles());
        }

        let axes = if kind == BoxKind::Triclinic {
            let (alpha, beta, gamma) = (
                angles.x.to_radians(),
                angles.y.to_radians(),
                angles.z.to_radians(),
            );
            let a = Vector3::new(lengths.x, 0.0, 0.0);
            let b = Vector3::new(lengths.y * gamma.cos(), lengths.y * gamma.sin(), 0.0);
            let cx = beta.cos();
            let cy = (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
            let cz_squared = 1.0 - cx * cx - cy * cy;
            if cz_squared <= 0.0 {
                return Err(invalid_angles());
            }
            let c = Vector3::new(cx, cy, cz_squared.sqrt()) * lengths.z;
            Matrix3::from_columns(&[a, b, c])
        } else {
            Matrix3::from_diagonal(&lengths)
        };
        let inverse = axes.try_inverse().ok_or_else(invalid_angles)?;

        Ok(Self {
            kind,
            lengths,
            angles,
            axes,
            inverse,
        })
    }

    pub fn kind(&self) -> BoxKind {
        self.kind
    }

    pub fn is_periodic(&self) -> bool {
        self.kind != BoxKind::NonPeriodic
    }

    pub fn lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn angles(&self) -> &Vector3<f64> {
        &self.angles
    }

    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    pub fn volume(&self) -> f64 {
        self.axes.determinant().abs()
    }

    pub fn to_fractional(&self, r: &Point3<f64>) -> Vector3<f64> {
        self.inverse * r.coords
    }

    pub fn to_cartesian(&self, fractional: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.axes * fractional)
    }

    /// Returns the shortest vector from `from` to `to`, honouring periodicity.
    pub fn minimum_vector(&self, from: &Point3<f64>, to: &Point3<f64>) -> Vector3<f64> {
        let delta = to - from;
        if !self.is_periodic() {
            return delta;
        }
        let mut fractional = self.inverse * delta;
        fractional.iter_mut().for_each(|f| *f -= f.round());
        self.axes * fractional
    }

    pub fn minimum_distance_squared(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_vector(a, b).norm_squared()
    }

    pub fn minimum_distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_distance_squared(a, b).sqrt()
    }

    /// Returns the image of `r` closest to `reference`.
    pub fn minimum_image(&self, reference: &Point3<f64>, r: &Point3<f64>) -> Point3<f64> {
        reference + self.minimum_vector(reference, r)
    }

    /// Wraps a position back into the primary cell. Non-periodic boxes leave it untouched.
    pub fn fold(&self, r: &Point3<f64>) -> Point3<f64> {
        if !self.is_periodic() {
            return *r;
        }
        let mut fractional = self.to_fractional(r);
        fractional.iter_mut().for_each(|f| *f -= f.floor());
        self.to_cartesian(&fractional)
    }

    /// Angle i-j-k in degrees, using minimum-image vectors from the central point `j`.
    pub fn angle_in_degrees(&self, i: &Point3<f64>, j: &Point3<f64>, k: &Point3<f64>) -> f64 {
        let ji = self.minimum_vector(j, i);
        let jk = self.minimum_vector(j, k);
        let denominator = ji.norm() * jk.norm();
        if denominator == 0.0 {
            return 0.0;
        }
        (ji.dot(&jk) / denominator).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// Per-axis factors that take the current volume to `required_volume`, spreading the change
    /// evenly over the scalable axes.
    ///
    /// # Panics
    ///
    /// Panics if no axis is scalable; callers validate the axis flags before asking.
    pub fn scale_factors(&self, required_volume: f64, scalable: [bool; 3]) -> Vector3<f64> {
        let n_scalable = scalable.iter().filter(|s| **s).count();
        assert!(
            n_scalable > 0,
            "volume scaling requested on a box with no scalable axes"
        );
        let factor = (required_volume / self.volume()).powf(1.0 / n_scalable as f64);
        Vector3::from_fn(|i, _| if scalable[i] { factor } else { 1.0 })
    }

    /// Returns a copy of this box with each axis multiplied by the matching factor.
    pub fn scaled(&self, factors: &Vector3<f64>) -> Self {
        let lengths = self.lengths.component_mul(factors);
        let scale = Matrix3::from_diagonal(factors);
        let inverse_scale = Matrix3::from_diagonal(&factors.map(|f| 1.0 / f));
        let kind = match self.kind {
            BoxKind::Cubic | BoxKind::Orthorhombic => {
                if lengths.x == lengths.y && lengths.y == lengths.z {
                    BoxKind::Cubic
                } else {
                    BoxKind::Orthorhombic
                }
            }
            other => other,
        };
        Self {
            kind,
            lengths,
            angles: self.angles,
            axes: self.axes * scale,
            inverse: inverse_scale * self.inverse,
        }
    }
}
