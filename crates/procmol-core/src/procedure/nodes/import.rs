use crate::core::io::traits::{CoordinateFile, CoordinateFrame};
use crate::core::io::xyz::XyzFile;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, option_name};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::registry::NodeType;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFormat {
    Xyz,
}

const FORMATS: &[(&str, CoordinateFormat)] = &[("xyz", CoordinateFormat::Xyz)];

/// Overwrites atom positions in the configuration from a coordinate file.
///
/// The file is read once during preparation; every execution applies the same frame.
#[derive(Debug)]
pub struct ImportCoordinates {
    file: Option<PathBuf>,
    format: CoordinateFormat,
    frame: Option<CoordinateFrame>,
}

impl ImportCoordinates {
    pub fn new() -> Self {
        Self {
            file: None,
            format: CoordinateFormat::Xyz,
            frame: None,
        }
    }
}

impl Default for ImportCoordinates {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for ImportCoordinates {
    fn node_type(&self) -> NodeType {
        NodeType::ImportCoordinates
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(file) = &self.file {
            keywords.push(("File", KeywordValue::text(&file.to_string_lossy())));
        }
        keywords.push(("Format", KeywordValue::text(option_name(FORMATS, &self.format))));
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "File" => self.file = Some(PathBuf::from(value.as_text()?)),
            "Format" => self.format = value.as_option(FORMATS)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let path = self
            .file
            .as_ref()
            .ok_or_else(|| env.fail("no coordinate file was given"))?;
        let frame = match self.format {
            CoordinateFormat::Xyz => XyzFile::read_from_path(path),
        }
        .map_err(|e| env.fail(format!("failed to read '{}': {e}", path.display())))?;
        if frame.is_empty() {
            return Err(env.fail(format!("'{}' contains no atoms", path.display())));
        }
        self.frame = Some(frame);
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| env.fail("coordinates have not been read"))?;
        let configuration = &mut *env.ctx.configuration;
        if frame.len() != configuration.n_atoms() {
            return Err(ProcedureError::state(
                env.name,
                format!(
                    "file has {} atoms but the configuration has {}",
                    frame.len(),
                    configuration.n_atoms()
                ),
            ));
        }
        let ids: Vec<_> = configuration.atoms().map(|(id, _)| id).collect();
        for (id, (_, position)) in ids.into_iter().zip(&frame.atoms) {
            configuration.set_atom_position(id, *position);
        }
        info!(atoms = frame.len(), "Coordinates imported");
        Ok(())
    }

    fn finalise(&mut self, _env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        self.frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::node::Node;
    use crate::procedure::testing::Harness;
    use nalgebra::Point3;
    use std::fs;
    use tempfile::tempdir;

    fn import_node(path: &std::path::Path) -> Node {
        Node::new(NodeType::ImportCoordinates)
            .with("File", KeywordValue::text(&path.to_string_lossy()))
            .unwrap()
    }

    #[test]
    fn positions_are_replaced_in_atom_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.xyz");
        fs::write(&path, "3\nmoved\nO 1 1 1\nH 2 1 1\nH 1 2 1\n").unwrap();

        let mut harness = Harness::water(1);
        harness.run_generation(vec![import_node(&path)]).unwrap();

        let positions: Vec<_> = harness.configuration.atoms().map(|(_, a)| a.position).collect();
        assert_eq!(positions[0], Point3::new(1.0, 1.0, 1.0));
        assert_eq!(positions[2], Point3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn an_empty_file_fails_during_prepare() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.xyz");
        fs::write(&path, "").unwrap();

        let mut harness = Harness::water(1);
        let before: Vec<_> = harness.configuration.atoms().map(|(_, a)| a.position).collect();
        let err = harness.run_generation(vec![import_node(&path)]).unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
        let after: Vec<_> = harness.configuration.atoms().map(|(_, a)| a.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn atom_count_mismatch_is_a_state_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.xyz");
        fs::write(&path, "1\nlonely\nAr 0 0 0\n").unwrap();

        let mut harness = Harness::water(2);
        let err = harness.run_generation(vec![import_node(&path)]).unwrap_err();
        assert!(matches!(err, ProcedureError::State { message, .. } if message.contains("1 atoms")));
    }
}
