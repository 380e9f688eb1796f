use super::optional_text;
use crate::core::models::configuration::Site;
use crate::core::models::ids::{MoleculeId, SpeciesId};
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use crate::procedure::state::{SelectedSite, Selection};
use tracing::info;

const SELECT: &[NodeType] = &[NodeType::Select];
pub(crate) const PICKS: &[NodeType] = &[NodeType::Pick, NodeType::PickProximity, NodeType::PickRegion];

/// Gathers sites from the configuration's site stacks.
///
/// Matches are recomputed on every execute. Exclusions read the *current* site of other
/// `Select` nodes, so they only bite inside an enclosing `IterateSelection`.
#[derive(Debug)]
pub struct Select {
    sites: Vec<(String, String)>,
    exclude_same_molecule: Vec<String>,
    exclude_same_site: Vec<String>,
    same_molecule_as_site: Option<String>,
    reference_site: Option<String>,
    inclusive_range: [f64; 2],
    pick: Option<String>,
    targets: Vec<(SpeciesId, usize)>,
}

impl Select {
    pub fn new() -> Self {
        Self {
            sites: Vec::new(),
            exclude_same_molecule: Vec::new(),
            exclude_same_site: Vec::new(),
            same_molecule_as_site: None,
            reference_site: None,
            inclusive_range: [0.0, 5.0],
            pick: None,
            targets: Vec::new(),
        }
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_sites(value: &KeywordValue) -> Result<Vec<(String, String)>, KeywordError> {
    value
        .as_list()?
        .iter()
        .map(|pair| match pair.as_texts()?.as_slice() {
            [species, site] => Ok((species.clone(), site.clone())),
            other => Err(KeywordError::invalid(format!(
                "expected [species, site], found {} values",
                other.len()
            ))),
        })
        .collect()
}

impl NodeKind for Select {
    fn node_type(&self) -> NodeType {
        NodeType::Select
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let sites = self
            .sites
            .iter()
            .map(|(species, site)| KeywordValue::texts(&[species, site]))
            .collect();
        let mut keywords = vec![("Site", KeywordValue::List(sites))];
        if !self.exclude_same_molecule.is_empty() {
            keywords.push((
                "ExcludeSameMolecule",
                KeywordValue::texts(&self.exclude_same_molecule),
            ));
        }
        if !self.exclude_same_site.is_empty() {
            keywords.push(("ExcludeSameSite", KeywordValue::texts(&self.exclude_same_site)));
        }
        if let Some(name) = &self.same_molecule_as_site {
            keywords.push(("SameMoleculeAsSite", KeywordValue::text(name)));
        }
        if let Some(name) = &self.reference_site {
            keywords.push(("ReferenceSite", KeywordValue::text(name)));
            keywords.push(("InclusiveRange", KeywordValue::doubles(&self.inclusive_range)));
        }
        if let Some(name) = &self.pick {
            keywords.push(("Pick", KeywordValue::text(name)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Site" => self.sites = parse_sites(value)?,
            "ExcludeSameMolecule" => self.exclude_same_molecule = value.as_texts()?,
            "ExcludeSameSite" => self.exclude_same_site = value.as_texts()?,
            "SameMoleculeAsSite" => self.same_molecule_as_site = optional_text(value)?,
            "ReferenceSite" => self.reference_site = optional_text(value)?,
            "InclusiveRange" => {
                let [min, max] = value.as_f64_array::<2>()?;
                if min > max {
                    return Err(KeywordError::invalid(format!(
                        "range minimum {min} exceeds maximum {max}"
                    )));
                }
                self.inclusive_range = [min, max];
            }
            "Pick" => self.pick = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut references: Vec<Reference> = self
            .exclude_same_molecule
            .iter()
            .map(|n| Reference::new("ExcludeSameMolecule", n, SELECT))
            .chain(
                self.exclude_same_site
                    .iter()
                    .map(|n| Reference::new("ExcludeSameSite", n, SELECT)),
            )
            .collect();
        if let Some(name) = &self.same_molecule_as_site {
            references.push(Reference::new("SameMoleculeAsSite", name, SELECT));
        }
        if let Some(name) = &self.reference_site {
            references.push(Reference::new("ReferenceSite", name, SELECT));
        }
        if let Some(name) = &self.pick {
            references.push(Reference::new("Pick", name, PICKS));
        }
        references
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.sites.is_empty() {
            return Err(env.fail("no sites were given"));
        }
        self.targets = self
            .sites
            .iter()
            .map(|(species_name, site_name)| {
                let (id, species) = env.species(species_name)?;
                let site = species.find_site(site_name).ok_or_else(|| {
                    env.fail(format!("species '{species_name}' has no site '{site_name}'"))
                })?;
                Ok((id, site))
            })
            .collect::<Result<_, ProcedureError>>()?;
        *env.state.outputs.selection_mut(env.name) = Selection::default();
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let outputs = &env.state.outputs;
        let excluded_molecules: Vec<MoleculeId> = self
            .exclude_same_molecule
            .iter()
            .filter_map(|name| outputs.current_site(name))
            .map(|s| s.site.molecule)
            .collect();
        let excluded_sites: Vec<Site> = self
            .exclude_same_site
            .iter()
            .filter_map(|name| outputs.current_site(name))
            .map(|s| s.site)
            .collect();
        let parent = match &self.same_molecule_as_site {
            Some(name) => Some(
                outputs
                    .current_site(name)
                    .ok_or_else(|| env.fail(format!("'{name}' has no current site")))?
                    .site
                    .molecule,
            ),
            None => None,
        };
        let reference = self
            .reference_site
            .as_deref()
            .and_then(|name| outputs.current_site(name))
            .map(|s| s.site.origin);
        let allowed: Option<Vec<MoleculeId>> = match &self.pick {
            Some(name) => Some(
                outputs
                    .picked(name)
                    .ok_or_else(|| env.fail(format!("pick '{name}' has not been executed")))?
                    .to_vec(),
            ),
            None => None,
        };

        let core = env.ctx.core;
        let configuration = &mut *env.ctx.configuration;
        let simulation_box = configuration.simulation_box().clone();
        let [min, max] = self.inclusive_range;
        let mut selected = Vec::new();
        let mut site_index = 0;
        let mut n_available = 0;
        for &(species_id, site) in &self.targets {
            let Some(species) = core.species.get(species_id) else {
                continue;
            };
            let stack = configuration.site_stack(species_id, species, site);
            for (n, candidate) in stack.sites().iter().enumerate() {
                site_index += 1;
                match parent {
                    Some(molecule) if candidate.molecule != molecule => continue,
                    None if excluded_molecules.contains(&candidate.molecule) => continue,
                    _ => {}
                }
                if excluded_sites.contains(candidate) {
                    continue;
                }
                if allowed
                    .as_ref()
                    .is_some_and(|molecules| !molecules.contains(&candidate.molecule))
                {
                    continue;
                }
                n_available += 1;
                if let Some(origin) = &reference {
                    let d = simulation_box.minimum_distance(&candidate.origin, origin);
                    if d < min || d > max {
                        continue;
                    }
                }
                selected.push(SelectedSite {
                    site: *candidate,
                    species: species_id,
                    site_index,
                    stack_index: n + 1,
                });
            }
        }

        let selection = env.state.outputs.selection_mut(env.name);
        selection.n_selections += 1;
        selection.n_cumulative += selected.len() as u64;
        selection.n_available += n_available;
        selection.sites = selected;
        selection.current = None;
        Ok(())
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let selection = env.state.outputs.selection_mut(env.name);
        info!(
            node = env.name,
            selections = selection.n_selections,
            last = selection.sites.len(),
            average = selection.average_count(),
            cumulative = selection.n_cumulative,
            "Select statistics"
        );
        selection.sites.clear();
        selection.current = None;
        Ok(())
    }
}
