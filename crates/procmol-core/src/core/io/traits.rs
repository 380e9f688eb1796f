use crate::core::models::configuration::Configuration;
use nalgebra::Point3;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A single frame of element-labelled coordinates as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateFrame {
    pub title: String,
    pub atoms: Vec<(String, Point3<f64>)>,
}

impl CoordinateFrame {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// Defines the interface for reading and writing coordinate file formats.
///
/// Readers produce a bare [`CoordinateFrame`]; mapping the frame onto an existing
/// configuration is the caller's business. Writers dump a whole configuration, atoms
/// grouped by molecule in insertion order.
pub trait CoordinateFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads one frame from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<CoordinateFrame, Self::Error>;

    /// Writes the atoms of `configuration` to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(configuration: &Configuration, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<CoordinateFrame, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(
        configuration: &Configuration,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(configuration, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
