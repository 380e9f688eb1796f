use super::ids::{AtomId, MoleculeId, SpeciesId};
use super::simbox::SimBox;
use super::species::{Species, SpeciesLibrary};
use nalgebra::{Point3, Rotation3, Vector3};
use slotmap::SlotMap;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: String,
    pub position: Point3<f64>,
    pub molecule: MoleculeId,
    /// Index of the atom within its species template.
    pub species_atom: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    species: SpeciesId,
    atoms: Vec<AtomId>,
}

impl Molecule {
    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }
}

/// A located site on one molecule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub origin: Point3<f64>,
    pub molecule: MoleculeId,
}

/// All sites of one species/site pair, tagged with the configuration version they were
/// computed for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteStack {
    version: u64,
    sites: Vec<Site>,
}

impl SiteStack {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// The mutable simulation state a procedure operates on.
///
/// Every structural or positional change bumps an internal version counter. Site stacks are
/// cached per `(species, site)` pair and silently recomputed when the version moves on.
#[derive(Debug, Clone)]
pub struct Configuration {
    name: String,
    simulation_box: SimBox,
    atoms: SlotMap<AtomId, Atom>,
    molecules: SlotMap<MoleculeId, Molecule>,
    /// Molecules in insertion order.
    molecule_order: Vec<MoleculeId>,
    temperature: f64,
    requested_size_factor: Option<f64>,
    applied_size_factor: f64,
    version: u64,
    site_stacks: HashMap<(SpeciesId, usize), SiteStack>,
}

impl Configuration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            simulation_box: SimBox::default(),
            atoms: SlotMap::with_key(),
            molecules: SlotMap::with_key(),
            molecule_order: Vec::new(),
            temperature: 300.0,
            requested_size_factor: None,
            applied_size_factor: 1.0,
            version: 0,
            site_stacks: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn simulation_box(&self) -> &SimBox {
        &self.simulation_box
    }

    pub fn set_box(&mut self, simulation_box: SimBox) {
        self.simulation_box = simulation_box;
        self.touch();
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn requested_size_factor(&self) -> Option<f64> {
        self.requested_size_factor
    }

    pub fn set_requested_size_factor(&mut self, factor: f64) {
        self.requested_size_factor = Some(factor);
    }

    pub fn applied_size_factor(&self) -> f64 {
        self.applied_size_factor
    }

    pub fn set_applied_size_factor(&mut self, factor: f64) {
        self.applied_size_factor = factor;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Instantiates a molecule of `species` using the template's reference coordinates.
    pub fn add_molecule(&mut self, species_id: SpeciesId, species: &Species) -> MoleculeId {
        let molecule_id = self.molecules.insert(Molecule {
            species: species_id,
            atoms: Vec::with_capacity(species.n_atoms()),
        });
        let mut atom_ids = Vec::with_capacity(species.n_atoms());
        for (index, template) in species.atoms().iter().enumerate() {
            atom_ids.push(self.atoms.insert(Atom {
                element: template.element.clone(),
                position: template.position,
                molecule: molecule_id,
                species_atom: index,
            }));
        }
        if let Some(molecule) = self.molecules.get_mut(molecule_id) {
            molecule.atoms = atom_ids;
        }
        self.molecule_order.push(molecule_id);
        self.touch();
        molecule_id
    }

    pub fn remove_molecule(&mut self, id: MoleculeId) -> bool {
        let Some(molecule) = self.molecules.remove(id) else {
            return false;
        };
        for atom_id in molecule.atoms {
            self.atoms.remove(atom_id);
        }
        self.molecule_order.retain(|m| *m != id);
        self.touch();
        true
    }

    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    /// Molecules in insertion order.
    pub fn molecules(&self) -> impl Iterator<Item = (MoleculeId, &Molecule)> {
        self.molecule_order
            .iter()
            .filter_map(|id| self.molecules.get(*id).map(|m| (*id, m)))
    }

    pub fn molecule_ids(&self) -> &[MoleculeId] {
        &self.molecule_order
    }

    pub fn n_molecules(&self) -> usize {
        self.molecule_order.len()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Atoms grouped by molecule, molecules in insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.molecules()
            .flat_map(|(_, m)| m.atoms.iter())
            .filter_map(|id| self.atoms.get(*id).map(|a| (*id, a)))
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn set_atom_position(&mut self, id: AtomId, position: Point3<f64>) -> bool {
        match self.atoms.get_mut(id) {
            Some(atom) => {
                atom.position = position;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Geometric centre of a molecule, unfolded about its first atom so that molecules
    /// straddling a periodic boundary are not torn apart.
    pub fn molecule_center(&self, id: MoleculeId) -> Option<Point3<f64>> {
        let molecule = self.molecules.get(id)?;
        let first = self.atoms.get(*molecule.atoms.first()?)?.position;
        let sum: Vector3<f64> = molecule
            .atoms
            .iter()
            .filter_map(|a| self.atoms.get(*a))
            .map(|a| self.simulation_box.minimum_image(&first, &a.position).coords)
            .sum();
        Some(Point3::from(sum / molecule.atoms.len() as f64))
    }

    pub fn set_molecule_center(&mut self, id: MoleculeId, center: &Point3<f64>) -> bool {
        let Some(current) = self.molecule_center(id) else {
            return false;
        };
        self.translate_molecule(id, &(center - current))
    }

    pub fn translate_molecule(&mut self, id: MoleculeId, delta: &Vector3<f64>) -> bool {
        let Some(molecule) = self.molecules.get(id) else {
            return false;
        };
        for atom_id in &molecule.atoms {
            if let Some(atom) = self.atoms.get_mut(*atom_id) {
                atom.position += delta;
            }
        }
        self.touch();
        true
    }

    /// Rotates a molecule about its own centre.
    pub fn rotate_molecule(&mut self, id: MoleculeId, rotation: &Rotation3<f64>) -> bool {
        let Some(center) = self.molecule_center(id) else {
            return false;
        };
        let Some(molecule) = self.molecules.get(id) else {
            return false;
        };
        let box_ = &self.simulation_box;
        for atom_id in &molecule.atoms {
            if let Some(atom) = self.atoms.get_mut(*atom_id) {
                let local = box_.minimum_vector(&center, &atom.position);
                atom.position = center + rotation * local;
            }
        }
        self.touch();
        true
    }

    /// Moves every molecule so its centre is scaled by `factors`, keeping internal geometry.
    pub fn scale_contents(&mut self, factors: &Vector3<f64>) {
        let ids = self.molecule_order.clone();
        for id in ids {
            if let Some(center) = self.molecule_center(id) {
                let scaled = Point3::from(center.coords.component_mul(factors));
                self.translate_molecule(id, &(scaled - center));
            }
        }
    }

    pub fn scale_box(&mut self, factors: &Vector3<f64>) {
        self.simulation_box = self.simulation_box.scaled(factors);
        self.touch();
    }

    pub fn atomic_mass(&self, library: &SpeciesLibrary) -> f64 {
        self.molecules()
            .filter_map(|(_, m)| library.get(m.species))
            .map(Species::mass)
            .sum()
    }

    /// Number density of atoms in atoms/Å³.
    pub fn atomic_density(&self) -> f64 {
        self.n_atoms() as f64 / self.simulation_box.volume()
    }

    /// Returns the site stack for `site` on `species_id`, recomputing it if the contents
    /// changed since it was last built.
    pub fn site_stack(&mut self, species_id: SpeciesId, species: &Species, site: usize) -> &SiteStack {
        let key = (species_id, site);
        let version = self.version;
        let stale = self
            .site_stacks
            .get(&key)
            .is_none_or(|stack| stack.version != version);
        if stale {
            let sites = self.compute_sites(species_id, species, site);
            self.site_stacks.insert(key, SiteStack { version, sites });
        }
        &self.site_stacks[&key]
    }

    fn compute_sites(&self, species_id: SpeciesId, species: &Species, site: usize) -> Vec<Site> {
        let Some(definition) = species.site(site) else {
            return Vec::new();
        };
        self.molecules()
            .filter(|(_, m)| m.species == species_id)
            .filter_map(|(molecule_id, m)| {
                let origin_ids: Vec<AtomId> = definition
                    .origin_atoms
                    .iter()
                    .filter_map(|i| m.atoms.get(*i).copied())
                    .collect();
                let reference = self.atoms.get(*origin_ids.first()?)?.position;
                let mut weighted = Vector3::zeros();
                let mut total_weight = 0.0;
                for atom_id in &origin_ids {
                    let atom = self.atoms.get(*atom_id)?;
                    let weight = if definition.mass_weighted {
                        species.atoms()[atom.species_atom].mass()
                    } else {
                        1.0
                    };
                    let unfolded = self.simulation_box.minimum_image(&reference, &atom.position);
                    weighted += unfolded.coords * weight;
                    total_weight += weight;
                }
                if total_weight == 0.0 {
                    return None;
                }
                Some(Site {
                    origin: self.simulation_box.fold(&Point3::from(weighted / total_weight)),
                    molecule: molecule_id,
                })
            })
            .collect()
    }
}
