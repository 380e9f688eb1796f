//! Nodes that pick a subset of the configuration's molecules.
//!
//! Every pick starts from the molecules of an upstream pick (`From`) or, without one, from
//! every molecule in insertion order. The result is broadcast through the process pool and
//! published under the node's name until `finalise`.

use super::optional_text;
use super::select::PICKS;
use crate::core::models::ids::{MoleculeId, SpeciesId};
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use nalgebra::Point3;
use tracing::debug;

const SELECT: &[NodeType] = &[NodeType::Select];
const REGIONS: &[NodeType] = &[NodeType::GeneralRegion, NodeType::CustomRegion];

fn from_reference(from: &Option<String>) -> Option<Reference> {
    from.as_deref().map(|f| Reference::new("From", f, PICKS))
}

fn candidates(env: &NodeEnv<'_, '_>, from: &Option<String>) -> Result<Vec<MoleculeId>, ProcedureError> {
    match from {
        Some(name) => env
            .state
            .outputs
            .picked(name)
            .map(<[MoleculeId]>::to_vec)
            .ok_or_else(|| env.fail(format!("pick '{name}' has not been executed"))),
        None => Ok(env.ctx.configuration.molecule_ids().to_vec()),
    }
}

fn publish(env: &mut NodeEnv<'_, '_>, mut picked: Vec<MoleculeId>) -> Result<(), ProcedureError> {
    if !env.ctx.pool.broadcast_molecules(&mut picked) {
        return Err(env.fail("failed to broadcast the picked molecules"));
    }
    debug!(node = env.name, picked = picked.len(), "Molecules picked");
    env.state.outputs.set_picked(env.name, picked);
    Ok(())
}

/// Keeps molecules of the listed species.
#[derive(Debug, Default)]
pub struct Pick {
    species: Vec<String>,
    from: Option<String>,
    targets: Vec<SpeciesId>,
}

impl Pick {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeKind for Pick {
    fn node_type(&self) -> NodeType {
        NodeType::Pick
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = vec![("Species", KeywordValue::texts(&self.species))];
        if let Some(from) = &self.from {
            keywords.push(("From", KeywordValue::text(from)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Species" => self.species = value.as_texts()?,
            "From" => self.from = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        from_reference(&self.from).into_iter().collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.species.is_empty() {
            return Err(env.fail("no species were given"));
        }
        self.targets = self
            .species
            .iter()
            .map(|name| env.species(name).map(|(id, _)| id))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let configuration = &*env.ctx.configuration;
        let picked = candidates(env, &self.from)?
            .into_iter()
            .filter(|id| {
                configuration
                    .molecule(*id)
                    .is_some_and(|m| self.targets.contains(&m.species()))
            })
            .collect();
        publish(env, picked)
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        env.state.outputs.clear_picked(env.name);
        Ok(())
    }
}

/// Keeps molecules with a bounded number of selected sites nearby.
///
/// A site counts when its minimum-image distance to the molecule's centre lies in the
/// closed `Distance` range. Sites on the molecule itself never count.
#[derive(Debug)]
pub struct PickProximity {
    from: Option<String>,
    selections: Vec<String>,
    distance: [f64; 2],
    min_count: usize,
    max_count: Option<usize>,
}

impl PickProximity {
    pub fn new() -> Self {
        Self {
            from: None,
            selections: Vec::new(),
            distance: [0.0, 5.0],
            min_count: 1,
            max_count: None,
        }
    }
}

impl Default for PickProximity {
    fn default() -> Self {
        Self::new()
    }
}

fn count_keyword(value: &KeywordValue) -> Result<usize, KeywordError> {
    let n = value.as_integer()?;
    usize::try_from(n).map_err(|_| KeywordError::invalid(format!("count must not be negative (got {n})")))
}

impl NodeKind for PickProximity {
    fn node_type(&self) -> NodeType {
        NodeType::PickProximity
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(from) = &self.from {
            keywords.push(("From", KeywordValue::text(from)));
        }
        keywords.extend([
            ("Selection", KeywordValue::texts(&self.selections)),
            ("Distance", KeywordValue::doubles(&self.distance)),
            ("MinCount", KeywordValue::Integer(self.min_count as i64)),
        ]);
        if let Some(max) = self.max_count {
            keywords.push(("MaxCount", KeywordValue::Integer(max as i64)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "From" => self.from = optional_text(value)?,
            "Selection" => self.selections = value.as_texts()?,
            "Distance" => {
                let [min, max] = value.as_f64_array::<2>()?;
                if min > max {
                    return Err(KeywordError::invalid(format!(
                        "distance minimum {min} exceeds maximum {max}"
                    )));
                }
                self.distance = [min, max];
            }
            "MinCount" => self.min_count = count_keyword(value)?,
            "MaxCount" => self.max_count = Some(count_keyword(value)?),
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        from_reference(&self.from)
            .into_iter()
            .chain(
                self.selections
                    .iter()
                    .map(|s| Reference::new("Selection", s, SELECT)),
            )
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.selections.is_empty() {
            return Err(env.fail("no selections were given"));
        }
        if self.max_count.is_some_and(|max| max < self.min_count) {
            return Err(env.fail("MaxCount is smaller than MinCount"));
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let mut sites: Vec<(MoleculeId, Point3<f64>)> = Vec::new();
        for name in &self.selections {
            let selection = env
                .state
                .outputs
                .selection(name)
                .ok_or_else(|| env.fail(format!("selection '{name}' has not been executed")))?;
            sites.extend(selection.sites.iter().map(|s| (s.site.molecule, s.site.origin)));
        }

        let configuration = &*env.ctx.configuration;
        let simulation_box = configuration.simulation_box();
        let [min, max] = self.distance;
        let picked = candidates(env, &self.from)?
            .into_iter()
            .filter(|id| {
                let Some(centre) = configuration.molecule_center(*id) else {
                    return false;
                };
                let count = sites
                    .iter()
                    .filter(|(molecule, origin)| {
                        if molecule == id {
                            return false;
                        }
                        let d = simulation_box.minimum_distance(&centre, origin);
                        (min..=max).contains(&d)
                    })
                    .count();
                count >= self.min_count && self.max_count.is_none_or(|m| count <= m)
            })
            .collect();
        publish(env, picked)
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        env.state.outputs.clear_picked(env.name);
        Ok(())
    }
}

/// Keeps molecules whose centre lies in a free voxel of a region.
#[derive(Debug, Default)]
pub struct PickRegion {
    from: Option<String>,
    region: Option<String>,
}

impl PickRegion {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeKind for PickRegion {
    fn node_type(&self) -> NodeType {
        NodeType::PickRegion
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(from) = &self.from {
            keywords.push(("From", KeywordValue::text(from)));
        }
        if let Some(region) = &self.region {
            keywords.push(("Region", KeywordValue::text(region)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "From" => self.from = optional_text(value)?,
            "Region" => self.region = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        from_reference(&self.from)
            .into_iter()
            .chain(self.region.iter().map(|r| Reference::new("Region", r, REGIONS)))
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.region.is_none() {
            return Err(env.fail("no region was given"));
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let name = self.region.as_deref().unwrap_or_default();
        let region = env
            .state
            .outputs
            .region(name)
            .ok_or_else(|| env.fail(format!("region '{name}' has not been generated")))?;
        let configuration = &*env.ctx.configuration;
        let picked = candidates(env, &self.from)?
            .into_iter()
            .filter(|id| {
                configuration
                    .molecule_center(*id)
                    .is_some_and(|centre| region.contains(&centre))
            })
            .collect();
        publish(env, picked)
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        env.state.outputs.clear_picked(env.name);
        Ok(())
    }
}
