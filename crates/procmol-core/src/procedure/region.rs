use super::random::RandomSource;
use crate::core::models::configuration::Configuration;
use crate::core::models::simbox::SimBox;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Decides whether a point in a configuration belongs to a region.
///
/// Kernels never modify the configuration and may be queried from several threads at once.
pub trait VoxelKernel: Sync {
    fn is_valid(&self, configuration: &Configuration, point: &Point3<f64>) -> bool;
}

/// Upper bound on the number of voxels a single region may scan.
pub const MAX_VOXELS: usize = 1 << 24;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegionError {
    #[error("Voxel size {voxel_size} needs more than {MAX_VOXELS} voxels to cover the box")]
    TooManyVoxels { voxel_size: f64 },
}

/// A voxelised map of the valid space in a simulation box.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    simulation_box: SimBox,
    n_voxels: [usize; 3],
    valid: Vec<bool>,
    free: Vec<usize>,
}

impl Region {
    /// Scans every voxel centre of the configuration's box with `kernel`.
    ///
    /// The box is split into whole voxels along each axis, so the actual voxel edge is never
    /// larger than `voxel_size`. Fails when the grid would exceed [`MAX_VOXELS`].
    pub fn generate(
        configuration: &Configuration,
        voxel_size: f64,
        kernel: &dyn VoxelKernel,
    ) -> Result<Self, RegionError> {
        let simulation_box = configuration.simulation_box().clone();
        let lengths = simulation_box.lengths();
        let n_voxels = [0, 1, 2].map(|i| ((lengths[i] / voxel_size).floor() as usize).max(1));
        let total = n_voxels
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&total| total <= MAX_VOXELS)
            .ok_or(RegionError::TooManyVoxels { voxel_size })?;

        let indices = 0..total;

        #[cfg(feature = "parallel")]
        let indices = indices.into_par_iter();

        let valid: Vec<bool> = indices
            .map(|index| {
                let centre = voxel_centre(&simulation_box, n_voxels, index);
                kernel.is_valid(configuration, &centre)
            })
            .collect();
        let free = valid
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.then_some(i))
            .collect();

        Ok(Self {
            simulation_box,
            n_voxels,
            valid,
            free,
        })
    }

    pub fn n_voxels(&self) -> [usize; 3] {
        self.n_voxels
    }

    /// Whether the region contains any free space at all.
    pub fn is_valid(&self) -> bool {
        !self.free.is_empty()
    }

    pub fn free_voxel_fraction(&self) -> f64 {
        if self.valid.is_empty() {
            0.0
        } else {
            self.free.len() as f64 / self.valid.len() as f64
        }
    }

    /// Whether the voxel containing `point` is valid.
    ///
    /// Periodic boxes fold the point into the cell first; points outside a non-periodic box are
    /// never contained.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        let periodic = self.simulation_box.is_periodic();
        let point = self.simulation_box.fold(point);
        let fractional = self.simulation_box.to_fractional(&point);
        let mut index = 0;
        for axis in 0..3 {
            let f = fractional[axis];
            if !periodic && !(0.0..1.0).contains(&f) {
                return false;
            }
            let n = self.n_voxels[axis];
            let bin = ((f * n as f64) as usize).min(n - 1);
            index = index * n + bin;
        }
        self.valid[index]
    }

    /// A uniformly random point inside a uniformly chosen free voxel.
    pub fn random_coordinate(&self, random: &mut RandomSource) -> Option<Point3<f64>> {
        if self.free.is_empty() {
            return None;
        }
        let pick = random.integer(0, self.free.len() as i64 - 1) as usize;
        let voxel = voxel_indices(self.n_voxels, self.free[pick]);
        let fractional = Vector3::from_fn(|i, _| {
            (voxel[i] as f64 + random.uniform()) / self.n_voxels[i] as f64
        });
        Some(self.simulation_box.to_cartesian(&fractional))
    }
}

fn voxel_indices(n_voxels: [usize; 3], index: usize) -> [usize; 3] {
    let z = index % n_voxels[2];
    let y = (index / n_voxels[2]) % n_voxels[1];
    let x = index / (n_voxels[1] * n_voxels[2]);
    [x, y, z]
}

fn voxel_centre(simulation_box: &SimBox, n_voxels: [usize; 3], index: usize) -> Point3<f64> {
    let voxel = voxel_indices(n_voxels, index);
    let fractional = Vector3::from_fn(|i, _| (voxel[i] as f64 + 0.5) / n_voxels[i] as f64);
    simulation_box.to_cartesian(&fractional)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LowerHalf;

    impl VoxelKernel for LowerHalf {
        fn is_valid(&self, configuration: &Configuration, point: &Point3<f64>) -> bool {
            configuration.simulation_box().to_fractional(point).x < 0.5
        }
    }

    struct Nowhere;

    impl VoxelKernel for Nowhere {
        fn is_valid(&self, _configuration: &Configuration, _point: &Point3<f64>) -> bool {
            false
        }
    }

    struct Everywhere;

    impl VoxelKernel for Everywhere {
        fn is_valid(&self, _configuration: &Configuration, _point: &Point3<f64>) -> bool {
            true
        }
    }

    fn configuration() -> Configuration {
        let mut configuration = Configuration::new("Box");
        configuration.set_box(SimBox::cubic(10.0).unwrap());
        configuration
    }

    #[test]
    fn voxel_counts_follow_box_lengths() {
        let region = Region::generate(&configuration(), 2.0, &LowerHalf).unwrap();
        assert_eq!(region.n_voxels(), [5, 5, 5]);
        assert!(region.is_valid());
        assert!((region.free_voxel_fraction() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn containment_tracks_the_kernel() {
        let region = Region::generate(&configuration(), 1.0, &LowerHalf).unwrap();
        assert!(region.contains(&Point3::new(2.5, 5.0, 5.0)));
        assert!(!region.contains(&Point3::new(7.5, 5.0, 5.0)));
        assert!(region.contains(&Point3::new(12.5, 5.0, 5.0)));
    }

    #[test]
    fn random_coordinates_fall_in_free_space() {
        let region = Region::generate(&configuration(), 1.0, &LowerHalf).unwrap();
        let mut random = RandomSource::seeded(11);
        for _ in 0..50 {
            let point = region.random_coordinate(&mut random).unwrap();
            assert!(point.x >= 0.0 && point.x < 5.0);
            assert!(region.contains(&point));
        }
    }

    #[test]
    fn an_empty_region_has_no_coordinates() {
        let region = Region::generate(&configuration(), 2.0, &Nowhere).unwrap();
        assert!(!region.is_valid());
        assert_eq!(region.random_coordinate(&mut RandomSource::seeded(1)), None);
    }

    #[test]
    fn tiny_voxels_are_rejected_instead_of_overflowing() {
        let err = Region::generate(&configuration(), 1.0e-7, &Everywhere).unwrap_err();
        assert_eq!(err, RegionError::TooManyVoxels { voxel_size: 1.0e-7 });
        assert!(Region::generate(&configuration(), 0.1, &Everywhere).is_ok());
    }

    #[test]
    fn points_just_below_zero_wrap_into_the_cell() {
        let region = Region::generate(&configuration(), 1.0, &Everywhere).unwrap();
        assert_eq!(region.free_voxel_fraction(), 1.0);
        assert!(region.contains(&Point3::new(-1e-17, 5.0, 5.0)));
        assert!(region.contains(&Point3::new(5.0, -1e-17, -1e-17)));
    }

    #[test]
    fn non_periodic_boxes_exclude_outside_points() {
        let mut configuration = Configuration::new("Open");
        configuration.set_box(SimBox::non_periodic(Vector3::repeat(10.0)).unwrap());
        let region = Region::generate(&configuration, 1.0, &Everywhere).unwrap();
        assert!(region.contains(&Point3::new(0.5, 5.0, 5.0)));
        assert!(!region.contains(&Point3::new(-0.5, 5.0, 5.0)));
        assert!(!region.contains(&Point3::new(10.5, 5.0, 5.0)));
    }
}
