use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::registry::NodeType;
use tracing::info;

/// Copies the contents of a named reference configuration into the target configuration.
#[derive(Debug)]
pub struct CopyNode {
    source: Option<String>,
    exclude: Vec<String>,
    copy_box: bool,
}

impl CopyNode {
    pub fn new() -> Self {
        Self {
            source: None,
            exclude: Vec::new(),
            copy_box: true,
        }
    }
}

impl Default for CopyNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for CopyNode {
    fn node_type(&self) -> NodeType {
        NodeType::Copy
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(source) = &self.source {
            keywords.push(("Source", KeywordValue::text(source)));
        }
        if !self.exclude.is_empty() {
            keywords.push(("Exclude", KeywordValue::texts(&self.exclude)));
        }
        keywords.push(("CopyBox", KeywordValue::Bool(self.copy_box)));
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Source" => self.source = Some(value.as_text()?.to_string()),
            "Exclude" => self.exclude = value.as_texts()?,
            "CopyBox" => self.copy_box = value.as_bool()?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| env.fail("no source configuration was given"))?;
        if env.ctx.core.configuration(source).is_none() {
            return Err(env.fail(format!("configuration '{source}' does not exist")));
        }
        for name in &self.exclude {
            env.species(name)?;
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let core = env.ctx.core;
        let name = self.source.as_deref().unwrap_or_default();
        let source = core
            .configuration(name)
            .ok_or_else(|| env.fail(format!("configuration '{name}' does not exist")))?;
        let target = &mut *env.ctx.configuration;

        if self.copy_box {
            target.set_box(source.simulation_box().clone());
        }

        let mut copied = 0;
        for (_, molecule) in source.molecules() {
            let Some(species) = core.species.get(molecule.species()) else {
                continue;
            };
            if self.exclude.iter().any(|e| e == species.name()) {
                continue;
            }
            let new_id = target.add_molecule(molecule.species(), species);
            let new_atoms = target
                .molecule(new_id)
                .map(|m| m.atoms().to_vec())
                .unwrap_or_default();
            for (new_atom, old_atom) in new_atoms.into_iter().zip(molecule.atoms()) {
                if let Some(atom) = source.atom(*old_atom) {
                    target.set_atom_position(new_atom, atom.position);
                }
            }
            copied += 1;
        }
        info!(source = name, molecules = copied, "Configuration copied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::configuration::Configuration;
    use crate::core::models::simbox::SimBox;
    use crate::procedure::node::Node;
    use crate::procedure::testing::{Harness, lattice_point};

    fn harness_with_source() -> Harness {
        let mut harness = Harness::new();
        let mut source = Configuration::new("Reference");
        source.set_box(SimBox::cubic(30.0).unwrap());
        for (name, i) in [("Water", 0), ("Argon", 1), ("Water", 2)] {
            let (id, species) = harness.core.species.find_by_name(name).unwrap();
            let molecule = source.add_molecule(id, species);
            let center = source.molecule_center(molecule).unwrap();
            source.translate_molecule(molecule, &(lattice_point(i) - center));
        }
        harness.core.add_configuration(source);
        harness
    }

    #[test]
    fn copies_molecules_and_box() {
        let mut harness = harness_with_source();
        let node = Node::new(NodeType::Copy)
            .with("Source", KeywordValue::text("Reference"))
            .unwrap();
        harness.run_generation(vec![node]).unwrap();

        assert_eq!(harness.configuration.n_molecules(), 3);
        assert_eq!(harness.configuration.n_atoms(), 7);
        assert!((harness.configuration.simulation_box().volume() - 27000.0).abs() < 1e-6);
    }

    #[test]
    fn excluded_species_are_skipped() {
        let mut harness = harness_with_source();
        let node = Node::new(NodeType::Copy)
            .with("Source", KeywordValue::text("Reference"))
            .unwrap()
            .with("Exclude", KeywordValue::texts(&["Argon"]))
            .unwrap()
            .with("CopyBox", KeywordValue::Bool(false))
            .unwrap();
        harness.run_generation(vec![node]).unwrap();

        assert_eq!(harness.configuration.n_molecules(), 2);
        assert!((harness.configuration.simulation_box().volume() - 8000.0).abs() < 1e-6);
    }

    #[test]
    fn missing_source_fails_in_prepare() {
        let mut harness = Harness::new();
        let node = Node::new(NodeType::Copy)
            .with("Source", KeywordValue::text("Nowhere"))
            .unwrap();
        let err = harness.run_generation(vec![node]).unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
    }
}
