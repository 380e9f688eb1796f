use crate::cli::RunArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use procmol::core::data::histogram::Data;
use procmol::core::data::store::{DataItem, DataStore};
use procmol::core::io::traits::CoordinateFile;
use procmol::core::io::xyz::XyzFile;
use procmol::core::models::configuration::Configuration;
use procmol::core::models::species::SpeciesLibrary;
use procmol::procedure::config::{FailurePolicy, RunConfigBuilder};
use procmol::procedure::progress::ProgressReporter;
use procmol::procedure::{CoreData, ExecutionContext, NodeContext, Procedure, serialization};
use procmol::workflows::run::{self as workflow, RunSummary};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from run file and CLI arguments...");
    let config = build_config(&args)?;

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    println!("Running procedure {}...", config.procedure_path.display());
    let outcome = execute(&config, &reporter)?;

    if outcome.summary.is_clean() {
        println!(
            "✓ {} iteration(s) completed.",
            outcome.summary.succeeded
        );
    } else {
        warn!(
            "{} of {} iteration(s) failed.",
            outcome.summary.failures.len(),
            outcome.summary.iterations
        );
        println!(
            "⚠ {} of {} iteration(s) failed; first failure: {}",
            outcome.summary.failures.len(),
            outcome.summary.iterations,
            outcome.summary.failures[0].message
        );
    }

    if let Some(path) = &config.output_configuration {
        write_configuration(&outcome.configuration, path)?;
        println!("✓ Final configuration written to: {}", path.display());
    }
    if let Some(directory) = &config.data_directory {
        let written = write_data(&outcome.data, directory)?;
        println!(
            "✓ {} dataset(s) written to: {}",
            written.len(),
            directory.display()
        );
    }
    Ok(())
}

/// Everything a finished run leaves behind.
pub struct RunOutcome {
    pub summary: RunSummary,
    pub configuration: Configuration,
    pub data: DataStore,
}

pub fn execute(config: &AppConfig, reporter: &ProgressReporter) -> Result<RunOutcome> {
    info!("Loading species library from {:?}", &config.species_path);
    let species = SpeciesLibrary::load(&config.species_path).map_err(|e| CliError::FileParsing {
        path: config.species_path.clone(),
        source: e.into(),
    })?;
    let core = CoreData::new(species);

    let mut procedure = serialization::load(&config.procedure_path)?;
    let generator = config
        .generator_path
        .as_deref()
        .map(load_generator)
        .transpose()?;

    let mut configuration = Configuration::new(&config.configuration_name);
    let mut data = DataStore::new();
    let mut random = config.run.random_source();

    let summary = {
        let mut ctx = ExecutionContext::new(&mut configuration, &core, &mut data, &mut random);
        if let Some(mut generator) = generator {
            info!("Building configuration '{}'...", config.configuration_name);
            let once = RunConfigBuilder::new()
                .iterations(1)
                .prefix(&config.run.prefix)
                .failure_policy(FailurePolicy::Abort)
                .build()
                .map_err(|e| CliError::Config(e.to_string()))?;
            workflow::run(&mut generator, &mut ctx, &once, &ProgressReporter::new())?;
        }
        workflow::run(&mut procedure, &mut ctx, &config.run, reporter)?
    };

    Ok(RunOutcome {
        summary,
        configuration,
        data,
    })
}

fn load_generator(path: &Path) -> Result<Procedure> {
    let generator = serialization::load(path)?;
    if generator.context() != NodeContext::Generation {
        return Err(CliError::Config(format!(
            "generator '{}' must be a Generation procedure, not {}",
            path.display(),
            generator.context()
        )));
    }
    Ok(generator)
}

fn write_configuration(configuration: &Configuration, path: &Path) -> Result<()> {
    info!("Writing final configuration to {:?}", path);
    XyzFile::write_to_path(configuration, path).map_err(|e| CliError::Output {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// File name for a data-store key: path separators and the prefix delimiter become `_`.
fn file_name_for(key: &str) -> String {
    let stem: String = key
        .replace("//", "_")
        .chars()
        .map(|c| if c.is_alphanumeric() || "-_.".contains(c) { c } else { '_' })
        .collect();
    format!("{stem}.csv")
}

fn write_data(data: &DataStore, directory: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)?;
    let mut written = Vec::new();
    for (key, item) in data.iter() {
        let dataset = match item {
            DataItem::Histogram(histogram) => histogram.to_data(1),
            DataItem::Data(data) => data.clone(),
            DataItem::Value(value) => Data::new(Vec::new(), vec![*value]).map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to export '{}': {}", key, e))
            })?,
        };
        let path = directory.join(file_name_for(key));
        info!("Writing dataset '{}' to {:?}", key, &path);
        let file = File::create(&path)?;
        dataset.write_csv(file).map_err(|e| CliError::Output {
            path: path.clone(),
            source: e.into(),
        })?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const SPECIES: &str = r#"
[[species]]
name = "Argon"
atoms = [{ element = "Ar", position = [0.0, 0.0, 0.0] }]
sites = [{ name = "Ar", origin = [0] }]
"#;

    const GENERATOR: &str = r#"
context = "Generation"

[[node]]
type = "Box"
Lengths = [12.0, 12.0, 12.0]

[[node]]
type = "Add"
Species = "Argon"
Population = 20
BoxAction = "None"
"#;

    const RDF: &str = r#"
context = "Analysis"

[[node]]
type = "Select"
name = "A"
Site = [["Argon", "Ar"]]

[[node]]
type = "IterateSelection"
Selection = "A"

[[node.ForEach]]
type = "Select"
name = "B"
Site = [["Argon", "Ar"]]
ExcludeSameMolecule = ["A"]

[[node.ForEach]]
type = "IterateSelection"
Selection = "B"

[[node.ForEach.ForEach]]
type = "CalculateDistance"
name = "rAB"
I = "A"
J = "B"

[[node.ForEach.ForEach]]
type = "Collect1D"
name = "Histo"
QuantityX = "rAB"
RangeX = [0.0, 6.0, 0.5]

[[node]]
type = "Process1D"
name = "RDF"
SourceData = "Histo"
"#;

    fn workspace(run_file: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("species.toml"), SPECIES).unwrap();
        fs::write(dir.path().join("box.toml"), GENERATOR).unwrap();
        fs::write(dir.path().join("rdf.toml"), RDF).unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, run_file).unwrap();
        (dir, path)
    }

    fn args(run_file: PathBuf) -> RunArgs {
        RunArgs {
            run_file,
            iterations: None,
            seed: None,
            prefix: None,
            on_failure: None,
            output: None,
            data_directory: None,
            set_values: vec![],
        }
    }

    const RUN_FILE: &str = r#"
procedure = "rdf.toml"
species = "species.toml"
generator = "box.toml"
configuration = "Liquid"

[run]
iterations = 2
seed = 5
prefix = "Ar"

[output]
configuration = "final.xyz"
data-directory = "data"
"#;

    #[test]
    fn end_to_end_run_writes_configuration_and_data() {
        let (dir, path) = workspace(RUN_FILE);
        run(args(path)).unwrap();

        let xyz = fs::read_to_string(dir.path().join("final.xyz")).unwrap();
        let mut lines = xyz.lines();
        assert_eq!(lines.next(), Some("20"));
        assert_eq!(lines.next(), Some("Liquid"));

        let histogram = fs::read_to_string(dir.path().join("data/Ar_Histo.csv")).unwrap();
        assert!(histogram.starts_with("x,value"));
        assert_eq!(histogram.lines().count(), 13);
        assert!(dir.path().join("data/Ar_RDF.csv").exists());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (_dir, path) = workspace(RUN_FILE);
        let config = build_config(&args(path)).unwrap();
        let first = execute(&config, &ProgressReporter::new()).unwrap();
        let second = execute(&config, &ProgressReporter::new()).unwrap();

        assert_eq!(first.summary, second.summary);
        let positions = |outcome: &RunOutcome| -> Vec<_> {
            outcome
                .configuration
                .atoms()
                .map(|(_, atom)| atom.position)
                .collect()
        };
        assert_eq!(positions(&first), positions(&second));
        assert_eq!(
            first.data.histogram("Ar//Histo").unwrap().counts(),
            second.data.histogram("Ar//Histo").unwrap().counts()
        );
    }

    #[test]
    fn every_pair_is_binned_or_missed() {
        let (_dir, path) = workspace(RUN_FILE);
        let config = build_config(&args(path)).unwrap();
        let outcome = execute(&config, &ProgressReporter::new()).unwrap();
        let histogram = outcome.data.histogram("Ar//Histo").unwrap();
        assert_eq!(histogram.n_binned() + histogram.n_missed(), 2 * 20 * 19);
    }

    #[test]
    fn generator_must_be_a_generation_procedure() {
        let (_dir, path) = workspace(&RUN_FILE.replace("box.toml", "rdf.toml"));
        assert!(matches!(run(args(path)), Err(CliError::Config(_))));
    }

    #[test]
    fn broken_species_library_is_reported_with_its_path() {
        let (dir, path) = workspace(RUN_FILE);
        fs::write(dir.path().join("species.toml"), "[[species]]\nname = 3\n").unwrap();
        assert!(matches!(
            run(args(path)),
            Err(CliError::FileParsing { path, .. }) if path.ends_with("species.toml")
        ));
    }

    #[test]
    fn data_keys_become_safe_file_names() {
        assert_eq!(file_name_for("Ar//Histo"), "Ar_Histo.csv");
        assert_eq!(file_name_for("g(r)//Process1D01"), "g_r__Process1D01.csv");
    }
}
