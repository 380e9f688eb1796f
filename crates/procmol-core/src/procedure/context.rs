use super::random::RandomSource;
use crate::core::data::store::DataStore;
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::core::models::species::SpeciesLibrary;
use std::fmt;
use std::str::FromStr;

/// The kind of sequence a node lives in. Every node type declares which of these it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeContext {
    Generation,
    Analysis,
    Operate,
    Control,
}

impl NodeContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generation => "Generation",
            Self::Analysis => "Analysis",
            Self::Operate => "Operate",
            Self::Control => "Control",
        }
    }
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generation" => Ok(Self::Generation),
            "analysis" => Ok(Self::Analysis),
            "operate" => Ok(Self::Operate),
            "control" => Ok(Self::Control),
            _ => Err(format!("unknown node context '{s}'")),
        }
    }
}

/// Collective operations across cooperating processes.
///
/// A procedure running on a single process uses [`SerialPool`], for which every collective
/// is the identity.
pub trait ProcessPool {
    fn n_processes(&self) -> usize {
        1
    }

    fn is_master(&self) -> bool {
        true
    }

    /// Replaces `molecules` on every process with the master's copy.
    fn broadcast_molecules(&self, _molecules: &mut Vec<MoleculeId>) -> bool {
        true
    }

    /// Sums `values` element-wise over all processes.
    fn sum(&self, _values: &mut [f64]) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPool;

impl ProcessPool for SerialPool {}

static SERIAL_POOL: SerialPool = SerialPool;

/// Runs named simulation modules on behalf of `RunModule` nodes.
pub trait ModuleHost {
    fn has_module(&self, name: &str) -> bool;

    fn run_module(&mut self, name: &str, configuration: &mut Configuration) -> Result<(), String>;
}

/// Read-only reference data shared by every configuration: species definitions and named
/// configurations that `Copy` nodes may draw from.
#[derive(Debug, Clone, Default)]
pub struct CoreData {
    pub species: SpeciesLibrary,
    configurations: Vec<Configuration>,
}

impl CoreData {
    pub fn new(species: SpeciesLibrary) -> Self {
        Self {
            species,
            configurations: Vec::new(),
        }
    }

    pub fn add_configuration(&mut self, configuration: Configuration) {
        self.configurations.push(configuration);
    }

    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.name() == name)
    }
}

/// Everything a running node may touch outside the procedure itself.
pub struct ExecutionContext<'a> {
    pub configuration: &'a mut Configuration,
    pub core: &'a CoreData,
    pub data: &'a mut DataStore,
    pub random: &'a mut RandomSource,
    pub prefix: String,
    pub pool: &'a dyn ProcessPool,
    pub modules: Option<&'a mut dyn ModuleHost>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        configuration: &'a mut Configuration,
        core: &'a CoreData,
        data: &'a mut DataStore,
        random: &'a mut RandomSource,
    ) -> Self {
        Self {
            configuration,
            core,
            data,
            random,
            prefix: String::new(),
            pool: &SERIAL_POOL,
            modules: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_pool(mut self, pool: &'a dyn ProcessPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_modules(mut self, modules: &'a mut dyn ModuleHost) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Data-store key for results owned by the node called `name`.
    pub fn data_key(&self, name: &str) -> String {
        DataStore::key(&self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_parse_case_insensitively() {
        assert_eq!("analysis".parse::<NodeContext>(), Ok(NodeContext::Analysis));
        assert_eq!("Generation".parse::<NodeContext>(), Ok(NodeContext::Generation));
        assert!("Bogus".parse::<NodeContext>().is_err());
    }

    #[test]
    fn data_keys_use_the_prefix() {
        let mut configuration = Configuration::new("Bulk");
        let core = CoreData::default();
        let mut data = DataStore::new();
        let mut random = RandomSource::seeded(1);
        let ctx = ExecutionContext::new(&mut configuration, &core, &mut data, &mut random)
            .with_prefix("RDF");
        assert_eq!(ctx.data_key("Process1D01"), "RDF//Process1D01");
        assert_eq!(ctx.pool.n_processes(), 1);
    }
}
