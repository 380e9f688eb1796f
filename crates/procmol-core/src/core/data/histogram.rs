use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Invalid axis range [{min}, {max}) with bin width {width}")]
    InvalidAxis { min: f64, max: f64, width: f64 },
    #[error("Data has {values} values but its axes describe {expected} points")]
    ShapeMismatch { values: usize, expected: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A regular binning axis covering `[min, max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    min: f64,
    max: f64,
    bin_width: f64,
    n_bins: usize,
}

impl Axis {
    /// Creates an axis; `max` is extended if needed so the range is a whole number of bins.
    pub fn new(min: f64, max: f64, bin_width: f64) -> Result<Self, DataError> {
        if !(bin_width > 0.0 && max > min && min.is_finite() && max.is_finite()) {
            return Err(DataError::InvalidAxis {
                min,
                max,
                width: bin_width,
            });
        }
        let n_bins = (((max - min) / bin_width) - 1.0e-9).ceil().max(1.0) as usize;
        Ok(Self {
            min,
            max: min + n_bins as f64 * bin_width,
            bin_width,
            n_bins,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if !(value >= self.min && value < self.max) {
            return None;
        }
        let index = ((value - self.min) / self.bin_width) as usize;
        Some(index.min(self.n_bins - 1))
    }

    pub fn bin_edges(&self, index: usize) -> (f64, f64) {
        let lower = self.min + index as f64 * self.bin_width;
        (lower, lower + self.bin_width)
    }

    pub fn centres(&self) -> Vec<f64> {
        (0..self.n_bins)
            .map(|i| self.min + (i as f64 + 0.5) * self.bin_width)
            .collect()
    }
}

/// A 1-, 2- or 3-dimensional histogram of raw counts, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    axes: Vec<Axis>,
    counts: Vec<f64>,
    n_binned: u64,
    n_missed: u64,
}

impl Histogram {
    pub fn new(axes: Vec<Axis>) -> Self {
        let size = axes.iter().map(Axis::n_bins).product();
        Self {
            axes,
            counts: vec![0.0; size],
            n_binned: 0,
            n_missed: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn n_binned(&self) -> u64 {
        self.n_binned
    }

    pub fn n_missed(&self) -> u64 {
        self.n_missed
    }

    /// Adds one count at `values`. Returns `false` (and counts a miss) if any coordinate
    /// falls outside its axis.
    pub fn bin(&mut self, values: &[f64]) -> bool {
        if values.len() != self.axes.len() {
            self.n_missed += 1;
            return false;
        }
        let mut index = 0;
        for (axis, value) in self.axes.iter().zip(values) {
            match axis.bin_of(*value) {
                Some(bin) => index = index * axis.n_bins() + bin,
                None => {
                    self.n_missed += 1;
                    return false;
                }
            }
        }
        self.counts[index] += 1.0;
        self.n_binned += 1;
        true
    }

    pub fn zero(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0.0);
        self.n_binned = 0;
        self.n_missed = 0;
    }

    /// Average counts per pass as a plain dataset.
    pub fn to_data(&self, passes: u64) -> Data {
        let divisor = passes.max(1) as f64;
        Data {
            axes: self.axes.iter().map(Axis::centres).collect(),
            values: self.counts.iter().map(|c| c / divisor).collect(),
        }
    }
}

/// Gridded values with bin-centre coordinates along each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    axes: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl Data {
    pub fn new(axes: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self, DataError> {
        let expected = axes.iter().map(Vec::len).product();
        if values.len() != expected {
            return Err(DataError::ShapeMismatch {
                values: values.len(),
                expected,
            });
        }
        Ok(Self { axes, values })
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Axis coordinates of the point at `index`; unused dimensions are zero.
    pub fn point(&self, index: usize) -> [f64; 3] {
        let mut point = [0.0; 3];
        let mut remainder = index;
        for (dim, axis) in self.axes.iter().enumerate().rev() {
            let n = axis.len().max(1);
            point[dim] = axis.get(remainder % n).copied().unwrap_or(0.0);
            remainder /= n;
        }
        point
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    pub fn integral(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Writes one row per point: axis coordinates followed by the value.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), DataError> {
        let mut csv = csv::Writer::from_writer(writer);
        let mut header: Vec<&str> = ["x", "y", "z"].into_iter().take(self.rank()).collect();
        header.push("value");
        csv.write_record(&header)?;
        for (index, value) in self.values.iter().enumerate() {
            let point = self.point(index);
            let mut record: Vec<String> = point[..self.rank()].iter().map(f64::to_string).collect();
            record.push(value.to_string());
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_rounds_range_to_whole_bins() {
        let axis = Axis::new(0.0, 1.05, 0.1).unwrap();
        assert_eq!(axis.n_bins(), 11);
        assert!((axis.max() - 1.1).abs() < 1e-12);

        let exact = Axis::new(0.0, 10.0, 0.5).unwrap();
        assert_eq!(exact.n_bins(), 20);
    }

    #[test]
    fn invalid_axes_are_rejected() {
        assert!(matches!(
            Axis::new(1.0, 0.0, 0.1),
            Err(DataError::InvalidAxis { .. })
        ));
        assert!(Axis::new(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn axis_binning_is_half_open() {
        let axis = Axis::new(0.0, 2.0, 1.0).unwrap();
        assert_eq!(axis.bin_of(0.0), Some(0));
        assert_eq!(axis.bin_of(1.0), Some(1));
        assert_eq!(axis.bin_of(2.0), None);
        assert_eq!(axis.bin_of(-0.1), None);
        assert_eq!(axis.centres(), vec![0.5, 1.5]);
    }

    #[test]
    fn histogram_counts_hits_and_misses() {
        let mut h = Histogram::new(vec![Axis::new(0.0, 3.0, 1.0).unwrap()]);
        assert!(h.bin(&[0.5]));
        assert!(h.bin(&[0.7]));
        assert!(h.bin(&[2.2]));
        assert!(!h.bin(&[5.0]));
        assert_eq!(h.counts(), &[2.0, 0.0, 1.0]);
        assert_eq!(h.n_binned(), 3);
        assert_eq!(h.n_missed(), 1);

        h.zero();
        assert_eq!(h.counts(), &[0.0, 0.0, 0.0]);
        assert_eq!(h.n_binned(), 0);
    }

    #[test]
    fn two_dimensional_histogram_is_row_major() {
        let mut h = Histogram::new(vec![
            Axis::new(0.0, 2.0, 1.0).unwrap(),
            Axis::new(0.0, 3.0, 1.0).unwrap(),
        ]);
        h.bin(&[1.5, 2.5]);
        assert_eq!(h.counts()[5], 1.0);
        let data = h.to_data(1);
        assert_eq!(data.point(5), [1.5, 2.5, 0.0]);
    }

    #[test]
    fn to_data_averages_over_passes() {
        let mut h = Histogram::new(vec![Axis::new(0.0, 1.0, 1.0).unwrap()]);
        h.bin(&[0.5]);
        h.bin(&[0.5]);
        h.bin(&[0.5]);
        h.bin(&[0.5]);
        let data = h.to_data(2);
        assert_eq!(data.values(), &[2.0]);
    }

    #[test]
    fn data_rejects_shape_mismatch() {
        let result = Data::new(vec![vec![0.0, 1.0]], vec![1.0]);
        assert!(matches!(result, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let data = Data::new(vec![vec![0.5, 1.5]], vec![3.0, 4.0]).unwrap();
        let mut buffer = Vec::new();
        data.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "x,value\n0.5,3\n1.5,4\n");
    }
}
