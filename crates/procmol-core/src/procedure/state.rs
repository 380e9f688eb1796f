use super::region::Region;
use super::scope::VariableStore;
use crate::core::data::histogram::{Axis, Data};
use crate::core::models::configuration::Site;
use crate::core::models::ids::{MoleculeId, SpeciesId};
use std::collections::HashMap;

/// One match of a `Select` node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedSite {
    pub site: Site,
    pub species: SpeciesId,
    /// 1-based index across every site stack the selection scanned, before exclusions.
    pub site_index: usize,
    /// 1-based index within the site's own stack.
    pub stack_index: usize,
}

/// The published state of a `Select` node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub sites: Vec<SelectedSite>,
    pub current: Option<usize>,
    pub n_selections: u64,
    pub n_cumulative: u64,
    pub n_available: u64,
}

impl Selection {
    pub fn current_site(&self) -> Option<&SelectedSite> {
        self.current.and_then(|i| self.sites.get(i))
    }

    /// Mean number of sites per selection made so far.
    pub fn average_count(&self) -> f64 {
        if self.n_selections == 0 {
            0.0
        } else {
            self.n_cumulative as f64 / self.n_selections as f64
        }
    }
}

/// The dataset a `Process` node hands to its normalisation branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOperand {
    pub data: Data,
    pub axes: Vec<Axis>,
}

/// Run-time results published by nodes, keyed by node name.
#[derive(Debug, Clone, Default)]
pub struct NodeOutputs {
    selections: HashMap<String, Selection>,
    picks: HashMap<String, Vec<MoleculeId>>,
    regions: HashMap<String, Region>,
    observables: HashMap<String, Option<f64>>,
    pub operand: Option<ProcessOperand>,
}

impl NodeOutputs {
    pub fn selection(&self, name: &str) -> Option<&Selection> {
        self.selections.get(name)
    }

    pub fn selection_mut(&mut self, name: &str) -> &mut Selection {
        self.selections.entry(name.to_string()).or_default()
    }

    pub fn current_site(&self, name: &str) -> Option<&SelectedSite> {
        self.selections.get(name).and_then(Selection::current_site)
    }

    pub fn picked(&self, name: &str) -> Option<&[MoleculeId]> {
        self.picks.get(name).map(Vec::as_slice)
    }

    pub fn set_picked(&mut self, name: &str, molecules: Vec<MoleculeId>) {
        self.picks.insert(name.to_string(), molecules);
    }

    pub fn clear_picked(&mut self, name: &str) {
        self.picks.remove(name);
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub fn set_region(&mut self, name: &str, region: Region) {
        self.regions.insert(name.to_string(), region);
    }

    pub fn clear_region(&mut self, name: &str) {
        self.regions.remove(name);
    }

    pub fn observable(&self, name: &str) -> Option<f64> {
        self.observables.get(name).copied().flatten()
    }

    pub fn set_observable(&mut self, name: &str, value: Option<f64>) {
        self.observables.insert(name.to_string(), value);
    }
}

/// Mutable state owned by a procedure: its variables and the outputs of its nodes.
#[derive(Debug, Clone, Default)]
pub struct ProcedureState {
    pub variables: VariableStore,
    pub outputs: NodeOutputs,
}

impl ProcedureState {
    pub fn new() -> Self {
        Self::default()
    }
}
