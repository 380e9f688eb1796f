use crate::core::io::traits::{CoordinateFile, CoordinateFrame};
use crate::core::models::configuration::Configuration;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Header declares {expected} atoms but {found} were read")]
    AtomCount { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("missing atom count header")]
    MissingHeader,
    #[error("invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("expected 'element x y z', found '{0}'")]
    MalformedAtom(String),
    #[error("invalid coordinate '{0}'")]
    InvalidFloat(String),
}

/// Plain XYZ: a count line, a title line, then `element x y z` per atom.
pub struct XyzFile;

impl CoordinateFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<CoordinateFrame, Self::Error> {
        let mut lines = reader.lines().enumerate();

        let expected = loop {
            match lines.next() {
                Some((_, line)) if line.as_ref().is_ok_and(|l| l.trim().is_empty()) => continue,
                Some((index, line)) => {
                    let line = line?;
                    let trimmed = line.trim();
                    break trimmed.parse::<usize>().map_err(|_| XyzError::Parse {
                        line: index + 1,
                        kind: XyzParseErrorKind::InvalidCount(trimmed.to_string()),
                    })?;
                }
                None => {
                    return Err(XyzError::Parse {
                        line: 1,
                        kind: XyzParseErrorKind::MissingHeader,
                    });
                }
            }
        };

        let title = match lines.next() {
            Some((_, line)) => line?.trim().to_string(),
            None => String::new(),
        };

        let mut atoms = Vec::with_capacity(expected);
        for (index, line) in lines.by_ref().take(expected) {
            let line = line?;
            atoms.push(parse_atom_line(&line, index + 1)?);
        }
        if atoms.len() != expected {
            return Err(XyzError::AtomCount {
                expected,
                found: atoms.len(),
            });
        }

        Ok(CoordinateFrame { title, atoms })
    }

    fn write_to(configuration: &Configuration, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", configuration.n_atoms())?;
        writeln!(writer, "{}", configuration.name())?;
        for (_, atom) in configuration.atoms() {
            writeln!(
                writer,
                "{:<4} {:>14.6} {:>14.6} {:>14.6}",
                atom.element, atom.position.x, atom.position.y, atom.position.z
            )?;
        }
        Ok(())
    }
}

fn parse_atom_line(line: &str, line_number: usize) -> Result<(String, Point3<f64>), XyzError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(XyzError::Parse {
            line: line_number,
            kind: XyzParseErrorKind::MalformedAtom(line.trim().to_string()),
        });
    }
    let mut coordinates = [0.0; 3];
    for (slot, field) in coordinates.iter_mut().zip(&fields[1..4]) {
        *slot = field.parse().map_err(|_| XyzError::Parse {
            line: line_number,
            kind: XyzParseErrorKind::InvalidFloat(field.to_string()),
        })?;
    }
    Ok((fields[0].to_string(), Point3::from(coordinates)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::simbox::SimBox;
    use crate::core::models::species::{Species, SpeciesLibrary};
    use std::io::Cursor;

    const SAMPLE: &str = "3\nwater\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\nH -0.24 0.93 0.0\n";

    #[test]
    fn reads_frame_with_title_and_atoms() {
        let frame = XyzFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(frame.title, "water");
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.atoms[1].0, "H");
        assert_eq!(frame.atoms[2].1, Point3::new(-0.24, 0.93, 0.0));
    }

    #[test]
    fn truncated_file_reports_atom_count() {
        let truncated = "3\ntitle\nO 0 0 0\n";
        let result = XyzFile::read_from(&mut Cursor::new(truncated));
        assert!(matches!(
            result,
            Err(XyzError::AtomCount {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn bad_coordinate_reports_line() {
        let bad = "1\ntitle\nO 0 zero 0\n";
        let result = XyzFile::read_from(&mut Cursor::new(bad));
        assert!(matches!(result, Err(XyzError::Parse { line: 3, .. })));
    }

    #[test]
    fn bad_header_is_rejected() {
        let result = XyzFile::read_from(&mut Cursor::new("many\n"));
        assert!(matches!(
            result,
            Err(XyzError::Parse {
                kind: XyzParseErrorKind::InvalidCount(_),
                ..
            })
        ));
        let result = XyzFile::read_from(&mut Cursor::new(""));
        assert!(matches!(
            result,
            Err(XyzError::Parse {
                kind: XyzParseErrorKind::MissingHeader,
                ..
            })
        ));
    }

    #[test]
    fn write_then_read_preserves_positions() {
        let mut library = SpeciesLibrary::new();
        let mut argon = Species::new("Argon");
        argon.add_atom("Ar", Point3::new(1.0, 2.0, 3.0));
        let id = library.add(argon).unwrap();
        let mut cfg = Configuration::new("box");
        cfg.set_box(SimBox::cubic(10.0).unwrap());
        cfg.add_molecule(id, library.get(id).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xyz");
        XyzFile::write_to_path(&cfg, &path).unwrap();
        let frame = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(frame.title, "box");
        assert_eq!(frame.atoms, vec![("Ar".to_string(), Point3::new(1.0, 2.0, 3.0))]);
    }
}
