use super::optional_text;
use super::select::PICKS;
use crate::core::models::ids::{MoleculeId, SpeciesId};
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use tracing::info;

/// Deletes molecules by species, by pick, or both.
#[derive(Debug, Default)]
pub struct Remove {
    species: Vec<String>,
    selection: Option<String>,
    targets: Vec<SpeciesId>,
}

impl Remove {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeKind for Remove {
    fn node_type(&self) -> NodeType {
        NodeType::Remove
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if !self.species.is_empty() {
            keywords.push(("Species", KeywordValue::texts(&self.species)));
        }
        if let Some(selection) = &self.selection {
            keywords.push(("Selection", KeywordValue::text(selection)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Species" => self.species = value.as_texts()?,
            "Selection" => self.selection = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.selection
            .iter()
            .map(|s| Reference::new("Selection", s, PICKS))
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.species.is_empty() && self.selection.is_none() {
            return Err(env.fail("neither species nor a selection were given"));
        }
        self.targets = self
            .species
            .iter()
            .map(|name| env.species(name).map(|(id, _)| id))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let mut doomed: Vec<MoleculeId> = env
            .ctx
            .configuration
            .molecules()
            .filter(|(_, m)| self.targets.contains(&m.species()))
            .map(|(id, _)| id)
            .collect();
        if let Some(name) = &self.selection {
            let picked = env
                .state
                .outputs
                .picked(name)
                .ok_or_else(|| env.fail(format!("pick '{name}' has not been executed")))?;
            let extra: Vec<MoleculeId> = picked
                .iter()
                .copied()
                .filter(|id| !doomed.contains(id))
                .collect();
            doomed.extend(extra);
        }

        let configuration = &mut *env.ctx.configuration;
        let removed = doomed
            .into_iter()
            .filter(|id| configuration.remove_molecule(*id))
            .count();
        info!(
            node = env.name,
            removed,
            remaining = configuration.n_molecules(),
            "Molecules removed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::node::Node;
    use crate::procedure::testing::{Harness, lattice_point};

    #[test]
    fn removes_every_molecule_of_a_species() {
        let mut harness = Harness::water(3);
        harness.add_molecules("Argon", (3..5).map(lattice_point));
        let remove = Node::new(NodeType::Remove)
            .with("Species", KeywordValue::texts(&["Water"]))
            .unwrap();
        harness.run_generation(vec![remove]).unwrap();
        assert_eq!(harness.configuration.n_molecules(), 2);
        assert_eq!(harness.configuration.n_atoms(), 2);
    }

    #[test]
    fn removes_picked_molecules() {
        let mut harness = Harness::new();
        harness.add_molecules("Argon", [0, 1, 24].into_iter().map(lattice_point));
        let survivor = harness.configuration.molecule_ids()[2];
        harness
            .run_toml(
                r#"
context = "Generation"

[[node]]
type = "Select"
name = "Ar"
Site = [["Argon", "Ar"]]

[[node]]
type = "PickProximity"
name = "Pairs"
Selection = ["Ar"]
Distance = [0.0, 4.5]

[[node]]
type = "Remove"
Selection = "Pairs"
"#,
            )
            .unwrap();
        assert_eq!(harness.configuration.molecule_ids(), &[survivor]);
    }

    #[test]
    fn requires_something_to_remove() {
        let mut harness = Harness::water(1);
        let err = harness
            .run_generation(vec![Node::new(NodeType::Remove)])
            .unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
    }
}
