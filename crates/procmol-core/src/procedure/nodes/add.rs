use super::optional_text;
use crate::core::models::configuration::Configuration;
use crate::core::utils::geometry::rotation_xy;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, NodeValue, option_name};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use nalgebra::Vector3;
use tracing::{info, warn};

const AVOGADRO: f64 = 6.022_140_76e23;
/// Cubic angstroms per cubic centimetre.
const A3_PER_CM3: f64 = 1.0e24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityUnits {
    AtomsPerAngstrom3,
    GramsPerCm3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxAction {
    None,
    AddVolume,
    ScaleVolume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positioning {
    Random,
    Central,
    Current,
    Region,
}

const DENSITY_UNITS: &[(&str, DensityUnits)] = &[
    ("atoms/A3", DensityUnits::AtomsPerAngstrom3),
    ("g/cm3", DensityUnits::GramsPerCm3),
];

const BOX_ACTIONS: &[(&str, BoxAction)] = &[
    ("None", BoxAction::None),
    ("AddVolume", BoxAction::AddVolume),
    ("ScaleVolume", BoxAction::ScaleVolume),
];

const POSITIONING: &[(&str, Positioning)] = &[
    ("Random", Positioning::Random),
    ("Central", Positioning::Central),
    ("Current", Positioning::Current),
    ("Region", Positioning::Region),
];

const REGION_TYPES: &[NodeType] = &[NodeType::GeneralRegion, NodeType::CustomRegion];

/// Inserts a population of one species, optionally growing the box to hit a density.
#[derive(Debug)]
pub struct Add {
    species: Option<String>,
    population: NodeValue,
    density: NodeValue,
    density_units: DensityUnits,
    box_action: BoxAction,
    scale: [bool; 3],
    positioning: Positioning,
    region: Option<String>,
    rotate: bool,
}

impl Add {
    pub fn new() -> Self {
        Self {
            species: None,
            population: NodeValue::constant(0),
            density: NodeValue::constant(0.1),
            density_units: DensityUnits::AtomsPerAngstrom3,
            box_action: BoxAction::AddVolume,
            scale: [true; 3],
            positioning: Positioning::Random,
            region: None,
            rotate: true,
        }
    }

    /// Volume in Å³ that `n_atoms` atoms of total molar mass `mass` occupy at `density`.
    fn volume_for(&self, n_atoms: f64, mass: f64, density: f64) -> f64 {
        match self.density_units {
            DensityUnits::AtomsPerAngstrom3 => n_atoms / density,
            DensityUnits::GramsPerCm3 => (mass / AVOGADRO) / (density / A3_PER_CM3),
        }
    }

    fn resize_box(
        &self,
        configuration: &mut Configuration,
        existing_mass: f64,
        added_atoms: f64,
        added_mass: f64,
        density: f64,
    ) {
        let mut required = self.volume_for(added_atoms, added_mass, density);
        match self.box_action {
            BoxAction::None => return,
            BoxAction::AddVolume => {
                if configuration.n_atoms() > 0 {
                    required += configuration.simulation_box().volume();
                }
            }
            BoxAction::ScaleVolume => {
                if configuration.n_atoms() > 0 {
                    required +=
                        self.volume_for(configuration.n_atoms() as f64, existing_mass, density);
                }
            }
        }
        let factors = configuration
            .simulation_box()
            .scale_factors(required, self.scale);
        configuration.scale_contents(&factors);
        configuration.scale_box(&factors);
        info!(
            volume = configuration.simulation_box().volume(),
            factors = ?[factors.x, factors.y, factors.z],
            "Box resized for added species"
        );
    }
}

impl Default for Add {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for Add {
    fn node_type(&self) -> NodeType {
        NodeType::Add
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(species) = &self.species {
            keywords.push(("Species", KeywordValue::text(species)));
        }
        keywords.extend([
            ("Population", self.population.to_keyword()),
            ("Density", self.density.to_keyword()),
            (
                "DensityUnits",
                KeywordValue::text(option_name(DENSITY_UNITS, &self.density_units)),
            ),
            (
                "BoxAction",
                KeywordValue::text(option_name(BOX_ACTIONS, &self.box_action)),
            ),
            ("ScaleA", KeywordValue::Bool(self.scale[0])),
            ("ScaleB", KeywordValue::Bool(self.scale[1])),
            ("ScaleC", KeywordValue::Bool(self.scale[2])),
            (
                "Positioning",
                KeywordValue::text(option_name(POSITIONING, &self.positioning)),
            ),
        ]);
        if let Some(region) = &self.region {
            keywords.push(("Region", KeywordValue::text(region)));
        }
        keywords.push(("Rotate", KeywordValue::Bool(self.rotate)));
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Species" => self.species = optional_text(value)?,
            "Population" => self.population = NodeValue::from_keyword(value)?,
            "Density" => self.density = NodeValue::from_keyword(value)?,
            "DensityUnits" => self.density_units = value.as_option(DENSITY_UNITS)?,
            "BoxAction" => self.box_action = value.as_option(BOX_ACTIONS)?,
            "ScaleA" => self.scale[0] = value.as_bool()?,
            "ScaleB" => self.scale[1] = value.as_bool()?,
            "ScaleC" => self.scale[2] = value.as_bool()?,
            "Positioning" => self.positioning = value.as_option(POSITIONING)?,
            "Region" => self.region = optional_text(value)?,
            "Rotate" => self.rotate = value.as_bool()?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.region
            .iter()
            .map(|r| Reference::new("Region", r, REGION_TYPES))
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let species = self
            .species
            .as_deref()
            .ok_or_else(|| env.fail("no species was given"))?;
        env.species(species)?;
        if self.positioning == Positioning::Region && self.region.is_none() {
            return Err(env.fail("positioning is 'Region' but no region was given"));
        }
        if let (Some(region), true) = (&self.region, self.positioning != Positioning::Region) {
            warn!(
                node = env.name,
                region = %region,
                "A region was given but positioning is not 'Region'"
            );
        }
        if self.box_action != BoxAction::None && !self.scale.iter().any(|s| *s) {
            return Err(env.fail("at least one box axis must be scalable"));
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let name = self.species.as_deref().unwrap_or_default();
        let (species_id, species) = env.species(name)?;
        let population = env.evaluate_integer(&self.population)?;
        if population < 0 {
            return Err(env.fail(format!("population must not be negative (got {population})")));
        }
        let density = env.evaluate_f64(&self.density)?;
        if self.box_action != BoxAction::None && density <= 0.0 {
            return Err(env.fail(format!("density must be positive (got {density})")));
        }
        info!(species = name, population, "Adding species");

        let existing_mass = env.ctx.configuration.atomic_mass(&env.ctx.core.species);
        let added_atoms = (population as usize * species.n_atoms()) as f64;
        self.resize_box(
            env.ctx.configuration,
            existing_mass,
            added_atoms,
            species.mass() * population as f64,
            density,
        );

        let region = match self.positioning {
            Positioning::Region => {
                let region_name = self.region.as_deref().unwrap_or_default();
                let region = env
                    .state
                    .outputs
                    .region(region_name)
                    .ok_or_else(|| ProcedureError::state(env.name, format!("region '{region_name}' has not been generated")))?;
                if !region.is_valid() {
                    return Err(ProcedureError::state(
                        env.name,
                        format!("region '{region_name}' contains no free space"),
                    ));
                }
                Some(region)
            }
            _ => None,
        };

        let configuration = &mut *env.ctx.configuration;
        let random = &mut *env.ctx.random;
        for _ in 0..population {
            let molecule = configuration.add_molecule(species_id, species);
            let centre = match self.positioning {
                Positioning::Random => {
                    let fractional = Vector3::from_fn(|_, _| random.uniform());
                    Some(configuration.simulation_box().to_cartesian(&fractional))
                }
                Positioning::Central => Some(
                    configuration
                        .simulation_box()
                        .to_cartesian(&Vector3::repeat(0.5)),
                ),
                Positioning::Region => region.and_then(|r| r.random_coordinate(random)),
                Positioning::Current => None,
            };
            if let Some(centre) = centre {
                configuration.set_molecule_center(molecule, &centre);
            }
            if self.rotate {
                let rotation = rotation_xy(
                    random.plus_minus_one() * 180.0,
                    random.plus_minus_one() * 180.0,
                );
                configuration.rotate_molecule(molecule, &rotation);
            }
        }

        info!(
            molecules = configuration.n_molecules(),
            density = configuration.atomic_density(),
            "Species added"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::testing::Harness;

    fn add_toml(extra: &str) -> String {
        format!(
            r#"
context = "Generation"

[[node]]
type = "Add"
Species = "Argon"
Population = 100
{extra}
"#
        )
    }

    #[test]
    fn add_volume_on_an_empty_box_sets_the_density_exactly() {
        let mut harness = Harness::new();
        harness.run_toml(&add_toml("Density = 0.05")).unwrap();

        assert_eq!(harness.configuration.n_molecules(), 100);
        assert!((harness.configuration.simulation_box().volume() - 2000.0).abs() < 1e-6);
        assert!((harness.configuration.atomic_density() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn add_volume_grows_an_occupied_box() {
        let mut harness = Harness::water(10);
        let before = harness.configuration.simulation_box().volume();
        harness.run_toml(&add_toml("Density = 0.1")).unwrap();
        let after = harness.configuration.simulation_box().volume();
        assert!((after - (before + 1000.0)).abs() < 1e-6);
    }

    #[test]
    fn box_action_none_keeps_the_box() {
        let mut harness = Harness::new();
        harness
            .run_toml(&add_toml("BoxAction = \"None\"\nPositioning = \"Central\"\nRotate = false"))
            .unwrap();
        assert!((harness.configuration.simulation_box().volume() - 8000.0).abs() < 1e-9);
        for (_, atom) in harness.configuration.atoms() {
            assert!((atom.position - nalgebra::Point3::new(10.0, 10.0, 10.0)).norm() < 1e-9);
        }
    }

    #[test]
    fn grams_per_cm3_uses_molar_mass() {
        let mut harness = Harness::new();
        harness
            .run_toml(&add_toml("Density = 1.0\nDensityUnits = \"g/cm3\""))
            .unwrap();
        let mass = harness.core.species.find_by_name("Argon").unwrap().1.mass() * 100.0;
        let expected = mass / AVOGADRO * A3_PER_CM3;
        let volume = harness.configuration.simulation_box().volume();
        assert!((volume - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn unscalable_box_is_rejected_before_execution() {
        let mut harness = Harness::new();
        let err = harness
            .run_toml(&add_toml("ScaleA = false\nScaleB = false\nScaleC = false"))
            .unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
        assert_eq!(harness.configuration.n_molecules(), 0);
    }

    #[test]
    fn region_positioning_requires_a_region() {
        let mut harness = Harness::new();
        let err = harness
            .run_toml(&add_toml("Positioning = \"Region\""))
            .unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
    }

    #[test]
    fn region_positioning_places_molecules_in_free_space() {
        let mut harness = Harness::new();
        harness
            .run_toml(
                r#"
context = "Generation"

[[node]]
type = "CustomRegion"
name = "Slab"
Expression = "xFrac"
Minimum = 0.0
Maximum = 0.5
VoxelSize = 1.0

[[node]]
type = "Add"
Species = "Argon"
Population = 20
BoxAction = "None"
Positioning = "Region"
Region = "Slab"
"#,
            )
            .unwrap();
        assert_eq!(harness.configuration.n_molecules(), 20);
        for (_, atom) in harness.configuration.atoms() {
            assert!(atom.position.x >= 0.0 && atom.position.x < 11.0);
        }
    }
}
