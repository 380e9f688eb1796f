//! Fixtures shared by the engine's unit tests.

use super::context::{CoreData, ExecutionContext, NodeContext};
use super::error::ProcedureError;
use super::node::Node;
use super::random::RandomSource;
use super::root::Procedure;
use super::sequence::Sequence;
use super::serialization;
use crate::core::data::store::DataStore;
use crate::core::models::configuration::Configuration;
use crate::core::models::simbox::SimBox;
use crate::core::models::species::{Species, SpeciesLibrary};
use nalgebra::Point3;

pub(crate) const BOX_LENGTH: f64 = 20.0;

/// Water with sites `O` (oxygen), `H1` and a mass-weighted `COM`.
pub(crate) fn water() -> Species {
    let mut species = Species::new("Water");
    species.add_atom("O", Point3::new(0.0, 0.0, 0.0));
    species.add_atom("H", Point3::new(0.96, 0.0, 0.0));
    species.add_atom("H", Point3::new(-0.24, 0.93, 0.0));
    species.add_site("O", vec![0], false).unwrap();
    species.add_site("H1", vec![1], false).unwrap();
    species.add_site("COM", vec![0, 1, 2], true).unwrap();
    species
}

pub(crate) fn argon() -> Species {
    let mut species = Species::new("Argon");
    species.add_atom("Ar", Point3::origin());
    species.add_site("Ar", vec![0], false).unwrap();
    species
}

/// Grid point `i` of a 5 x 5 x 5 lattice with 4 Å spacing.
pub(crate) fn lattice_point(i: usize) -> Point3<f64> {
    Point3::new(
        2.0 + 4.0 * (i % 5) as f64,
        2.0 + 4.0 * ((i / 5) % 5) as f64,
        2.0 + 4.0 * (i / 25) as f64,
    )
}

pub(crate) struct Harness {
    pub configuration: Configuration,
    pub core: CoreData,
    pub data: DataStore,
    pub random: RandomSource,
}

impl Harness {
    /// An empty 20 Å cubic box with `Water` and `Argon` available.
    pub fn new() -> Self {
        let mut species = SpeciesLibrary::new();
        species.add(water()).unwrap();
        species.add(argon()).unwrap();
        let mut configuration = Configuration::new("Bulk");
        configuration.set_box(SimBox::cubic(BOX_LENGTH).unwrap());
        Self {
            configuration,
            core: CoreData::new(species),
            data: DataStore::new(),
            random: RandomSource::seeded(1234),
        }
    }

    /// `n` water molecules with oxygens on lattice points.
    pub fn water(n: usize) -> Self {
        let mut harness = Self::new();
        harness.add_molecules("Water", (0..n).map(lattice_point));
        harness
    }

    pub fn add_molecules(&mut self, species: &str, positions: impl Iterator<Item = Point3<f64>>) {
        let (id, template) = self.core.species.find_by_name(species).unwrap();
        for position in positions {
            let molecule = self.configuration.add_molecule(id, template);
            let first = self.configuration.molecule(molecule).unwrap().atoms()[0];
            let origin = self.configuration.atom(first).unwrap().position;
            self.configuration
                .translate_molecule(molecule, &(position - origin));
        }
    }

    pub fn ctx(&mut self) -> ExecutionContext<'_> {
        ExecutionContext::new(
            &mut self.configuration,
            &self.core,
            &mut self.data,
            &mut self.random,
        )
        .with_prefix("Test")
    }

    /// Prepares, executes once and finalises `procedure`.
    pub fn run_once(&mut self, procedure: &mut Procedure) -> Result<(), ProcedureError> {
        self.run_times(procedure, 1)
    }

    pub fn run_times(&mut self, procedure: &mut Procedure, n: usize) -> Result<(), ProcedureError> {
        let mut ctx = self.ctx();
        procedure.prepare(&mut ctx)?;
        for _ in 0..n {
            procedure.execute(&mut ctx)?;
        }
        procedure.finalise(&mut ctx)
    }

    pub fn run(
        &mut self,
        context: NodeContext,
        nodes: Vec<Node>,
    ) -> Result<Procedure, ProcedureError> {
        let root = nodes.into_iter().fold(Sequence::new(), Sequence::with);
        let mut procedure = Procedure::from_sequence(context, root)?;
        self.run_once(&mut procedure)?;
        Ok(procedure)
    }

    pub fn run_generation(&mut self, nodes: Vec<Node>) -> Result<Procedure, ProcedureError> {
        self.run(NodeContext::Generation, nodes)
    }

    pub fn run_toml(&mut self, text: &str) -> Result<Procedure, ProcedureError> {
        let mut procedure = serialization::from_toml_str(text)?;
        self.run_once(&mut procedure)?;
        Ok(procedure)
    }
}
