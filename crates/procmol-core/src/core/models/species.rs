use super::element::atomic_mass;
use super::ids::SpeciesId;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesAtom {
    pub element: String,
    pub position: Point3<f64>,
}

impl SpeciesAtom {
    /// Mass of the atom, falling back to zero for unrecognised elements.
    pub fn mass(&self) -> f64 {
        atomic_mass(&self.element).unwrap_or(0.0)
    }
}

/// A named reference point on a species, defined by a set of origin atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSite {
    pub name: String,
    pub origin_atoms: Vec<usize>,
    pub mass_weighted: bool,
}

/// The template from which molecules in a configuration are instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    name: String,
    atoms: Vec<SpeciesAtom>,
    sites: Vec<SpeciesSite>,
}

impl Species {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            atoms: Vec::new(),
            sites: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_atom(&mut self, element: &str, position: Point3<f64>) -> usize {
        self.atoms.push(SpeciesAtom {
            element: element.to_string(),
            position,
        });
        self.atoms.len() - 1
    }

    /// Adds a site whose origin is the (optionally mass-weighted) centre of `origin_atoms`.
    pub fn add_site(
        &mut self,
        name: &str,
        origin_atoms: Vec<usize>,
        mass_weighted: bool,
    ) -> Result<usize, SpeciesError> {
        if origin_atoms.is_empty() {
            return Err(SpeciesError::EmptySite {
                species: self.name.clone(),
                site: name.to_string(),
            });
        }
        if let Some(&index) = origin_atoms.iter().find(|&&i| i >= self.atoms.len()) {
            return Err(SpeciesError::InvalidSiteAtom {
                species: self.name.clone(),
                site: name.to_string(),
                index,
            });
        }
        if self.find_site(name).is_some() {
            return Err(SpeciesError::DuplicateSite {
                species: self.name.clone(),
                site: name.to_string(),
            });
        }
        self.sites.push(SpeciesSite {
            name: name.to_string(),
            origin_atoms,
            mass_weighted,
        });
        Ok(self.sites.len() - 1)
    }

    pub fn atoms(&self) -> &[SpeciesAtom] {
        &self.atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn sites(&self) -> &[SpeciesSite] {
        &self.sites
    }

    pub fn site(&self, index: usize) -> Option<&SpeciesSite> {
        self.sites.get(index)
    }

    pub fn find_site(&self, name: &str) -> Option<usize> {
        self.sites.iter().position(|s| s.name == name)
    }

    pub fn mass(&self) -> f64 {
        self.atoms.iter().map(SpeciesAtom::mass).sum()
    }

    pub fn center_of_geometry(&self) -> Point3<f64> {
        if self.atoms.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f64> = self.atoms.iter().map(|a| a.position.coords).sum();
        Point3::from(sum / self.atoms.len() as f64)
    }
}

/// All species known to a run, addressable by id or by name.
#[derive(Debug, Clone, Default)]
pub struct SpeciesLibrary {
    species: SlotMap<SpeciesId, Species>,
    by_name: HashMap<String, SpeciesId>,
}

impl SpeciesLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, species: Species) -> Result<SpeciesId, SpeciesError> {
        if self.by_name.contains_key(species.name()) {
            return Err(SpeciesError::DuplicateSpecies(species.name().to_string()));
        }
        let name = species.name().to_string();
        let id = self.species.insert(species);
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn find(&self, name: &str) -> Option<SpeciesId> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<(SpeciesId, &Species)> {
        let id = self.find(name)?;
        self.species.get(id).map(|s| (id, s))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species.iter()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, SpeciesError> {
        let content = std::fs::read_to_string(path).map_err(|e| SpeciesError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: SpeciesFile = toml::from_str(&content).map_err(|e| SpeciesError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_definitions(file.species)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SpeciesError> {
        let file: SpeciesFile = toml::from_str(content).map_err(|e| SpeciesError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        Self::from_definitions(file.species)
    }

    fn from_definitions(definitions: Vec<SpeciesDefinition>) -> Result<Self, SpeciesError> {
        let mut library = Self::new();
        for definition in definitions {
            let mut species = Species::new(&definition.name);
            for atom in &definition.atoms {
                species.add_atom(&atom.element, Point3::from(atom.position));
            }
            for site in definition.sites {
                species.add_site(&site.name, site.origin, site.mass_weighted)?;
            }
            library.add(species)?;
        }
        Ok(library)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpeciesFile {
    #[serde(default)]
    species: Vec<SpeciesDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpeciesDefinition {
    name: String,
    atoms: Vec<AtomDefinition>,
    #[serde(default)]
    sites: Vec<SiteDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AtomDefinition {
    element: String,
    position: [f64; 3],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct SiteDefinition {
    name: String,
    origin: Vec<usize>,
    #[serde(default)]
    mass_weighted: bool,
}

#[derive(Debug, Error)]
pub enum SpeciesError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Species '{0}' is defined more than once")]
    DuplicateSpecies(String),
    #[error("Site '{site}' on species '{species}' is defined more than once")]
    DuplicateSite { species: String, site: String },
    #[error("Site '{site}' on species '{species}' has no origin atoms")]
    EmptySite { species: String, site: String },
    #[error("Site '{site}' on species '{species}' references missing atom index {index}")]
    InvalidSiteAtom {
        species: String,
        site: String,
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER_TOML: &str = r#"
        [[species]]
        name = "Water"
        atoms = [
            { element = "O", position = [0.0, 0.0, 0.0] },
            { element = "H", position = [0.96, 0.0, 0.0] },
            { element = "H", position = [-0.24, 0.93, 0.0] },
        ]
        sites = [
            { name = "O", origin = [0] },
            { name = "COM", origin = [0, 1, 2], mass-weighted = true },
        ]

        [[species]]
        name = "Argon"
        atoms = [{ element = "Ar", position = [0.0, 0.0, 0.0] }]
        sites = [{ name = "Ar", origin = [0] }]
    "#;

    #[test]
    fn library_loads_species_and_sites_from_toml() {
        let library = SpeciesLibrary::from_toml_str(WATER_TOML).unwrap();
        assert_eq!(library.len(), 2);

        let (_, water) = library.find_by_name("Water").unwrap();
        assert_eq!(water.n_atoms(), 3);
        assert_eq!(water.find_site("COM"), Some(1));
        assert!(water.site(1).unwrap().mass_weighted);
        assert!((water.mass() - 18.015).abs() < 1e-9);
    }

    #[test]
    fn library_load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("species.toml");
        std::fs::write(&path, WATER_TOML).unwrap();
        let library = SpeciesLibrary::load(&path).unwrap();
        assert!(library.find("Argon").is_some());
    }

    #[test]
    fn missing_file_reports_io_error() {
        let result = SpeciesLibrary::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(SpeciesError::Io { .. })));
    }

    #[test]
    fn duplicate_species_are_rejected() {
        let mut library = SpeciesLibrary::new();
        library.add(Species::new("A")).unwrap();
        assert!(matches!(
            library.add(Species::new("A")),
            Err(SpeciesError::DuplicateSpecies(_))
        ));
    }

    #[test]
    fn site_with_out_of_range_atom_is_rejected() {
        let mut species = Species::new("A");
        species.add_atom("C", Point3::origin());
        let result = species.add_site("bad", vec![0, 3], false);
        assert!(matches!(
            result,
            Err(SpeciesError::InvalidSiteAtom { index: 3, .. })
        ));
    }

    #[test]
    fn center_of_geometry_averages_atom_positions() {
        let mut species = Species::new("Dimer");
        species.add_atom("C", Point3::new(0.0, 0.0, 0.0));
        species.add_atom("C", Point3::new(2.0, 0.0, 0.0));
        assert_eq!(species.center_of_geometry(), Point3::new(1.0, 0.0, 0.0));
    }
}
