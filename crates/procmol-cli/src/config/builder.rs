use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use procmol::procedure::config::RunConfigBuilder;
use std::path::{Path, PathBuf};

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let base_dir = args
        .run_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let file_config = FileConfig::from_file(&args.run_file)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let procedure_path = file_config
        .procedure
        .take()
        .ok_or_else(|| CliError::Config("the run file must name a `procedure`".to_string()))?;
    let species_path = file_config
        .species
        .take()
        .ok_or_else(|| CliError::Config("the run file must name a `species` library".to_string()))?;

    let run_file = file_config.run.take().unwrap_or_default();
    let iterations = args
        .iterations
        .or(run_file.iterations)
        .unwrap_or(defaults.iterations);
    let prefix = args
        .prefix
        .clone()
        .or(run_file.prefix)
        .unwrap_or(defaults.prefix);
    let on_failure = args
        .on_failure
        .clone()
        .or(run_file.on_failure)
        .unwrap_or(defaults.on_failure);
    let failure_policy =
        parser::parse_failure_policy(&on_failure).map_err(|e| CliError::Argument(e.to_string()))?;

    let mut builder = RunConfigBuilder::new()
        .iterations(iterations)
        .prefix(&prefix)
        .failure_policy(failure_policy);
    if let Some(seed) = args.seed.or(run_file.seed) {
        builder = builder.seed(seed);
    }
    let run = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let output_file = file_config.output.take().unwrap_or_default();
    let output_configuration = args
        .output
        .clone()
        .or_else(|| output_file.configuration.map(|p| base_dir.join(p)));
    let data_directory = args
        .data_directory
        .clone()
        .or_else(|| output_file.data_directory.map(|p| base_dir.join(p)));

    Ok(AppConfig {
        procedure_path: base_dir.join(procedure_path),
        species_path: base_dir.join(species_path),
        generator_path: file_config.generator.map(|p| base_dir.join(p)),
        configuration_name: file_config
            .configuration
            .unwrap_or(defaults.configuration_name),
        run,
        output_configuration,
        data_directory,
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_assignment(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
        let invalid_integer =
            || CliError::Config(format!("Invalid integer value for {}: {}", key, value_str));

        match key {
            "procedure" => config.procedure = Some(PathBuf::from(value_str)),
            "species" => config.species = Some(PathBuf::from(value_str)),
            "generator" => config.generator = Some(PathBuf::from(value_str)),
            "configuration" => config.configuration = Some(value_str.to_string()),
            "run.iterations" => {
                config.run.get_or_insert_with(Default::default).iterations =
                    Some(value_str.parse().map_err(|_| invalid_integer())?);
            }
            "run.seed" => {
                config.run.get_or_insert_with(Default::default).seed =
                    Some(value_str.parse().map_err(|_| invalid_integer())?);
            }
            "run.prefix" => {
                config.run.get_or_insert_with(Default::default).prefix =
                    Some(value_str.to_string());
            }
            "run.on-failure" => {
                config.run.get_or_insert_with(Default::default).on_failure =
                    Some(value_str.to_string());
            }
            "output.configuration" => {
                config.output.get_or_insert_with(Default::default).configuration =
                    Some(PathBuf::from(value_str));
            }
            "output.data-directory" => {
                config.output.get_or_insert_with(Default::default).data_directory =
                    Some(PathBuf::from(value_str));
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use procmol::procedure::config::FailurePolicy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const RUN_FILE: &str = r#"
procedure = "rdf.toml"
species = "species.toml"
generator = "box.toml"

[run]
iterations = 50
seed = 11
prefix = "RDF"
on-failure = "continue"

[output]
configuration = "final.xyz"
data-directory = "data"
"#;

    fn write_run_file(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn base_run_args(run_file: PathBuf) -> RunArgs {
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

    #[test]
    fn build_config_reads_file_and_resolves_paths() {
        let (dir, path) = write_run_file(RUN_FILE);
        let app = build_config(&base_run_args(path)).expect("build ok");

        assert_eq!(app.procedure_path, dir.path().join("rdf.toml"));
        assert_eq!(app.species_path, dir.path().join("species.toml"));
        assert_eq!(app.generator_path, Some(dir.path().join("box.toml")));
        assert_eq!(app.output_configuration, Some(dir.path().join("final.xyz")));
        assert_eq!(app.data_directory, Some(dir.path().join("data")));
        assert_eq!(app.configuration_name, DefaultsConfig::default().configuration_name);

        assert_eq!(app.run.iterations, 50);
        assert_eq!(app.run.seed, Some(11));
        assert_eq!(app.run.prefix, "RDF");
        assert_eq!(app.run.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let (_dir, path) = write_run_file("procedure = \"p.toml\"\nspecies = \"s.toml\"\n");
        let app = build_config(&base_run_args(path)).expect("build ok");
        let defaults = DefaultsConfig::default();

        assert_eq!(app.run.iterations, defaults.iterations);
        assert_eq!(app.run.prefix, defaults.prefix);
        assert_eq!(app.run.failure_policy, FailurePolicy::Abort);
        assert_eq!(app.run.seed, None);
        assert!(app.generator_path.is_none());
        assert!(app.output_configuration.is_none());
        assert!(app.data_directory.is_none());
    }

    #[test]
    fn cli_overrides_set_values_which_override_the_file() {
        let (_dir, path) = write_run_file(RUN_FILE);
        let mut args = base_run_args(path);
        args.set_values = vec![
            "run.iterations=5".to_string(),
            "run.seed=3".to_string(),
            "run.on-failure=abort".to_string(),
        ];
        args.iterations = Some(9);
        args.output = Some(PathBuf::from("here.xyz"));

        let app = build_config(&args).expect("build ok");
        assert_eq!(app.run.iterations, 9);
        assert_eq!(app.run.seed, Some(3));
        assert_eq!(app.run.failure_policy, FailurePolicy::Abort);
        assert_eq!(app.output_configuration, Some(PathBuf::from("here.xyz")));
    }

    #[test]
    fn missing_procedure_is_a_config_error() {
        let (_dir, path) = write_run_file("species = \"s.toml\"\n");
        assert!(matches!(
            build_config(&base_run_args(path)),
            Err(CliError::Config(msg)) if msg.contains("procedure")
        ));
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let (_dir, path) = write_run_file(RUN_FILE);
        let mut args = base_run_args(path.clone());
        args.set_values = vec!["run.iterations=many".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        let mut args = base_run_args(path.clone());
        args.set_values = vec!["run.threads=4".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        let mut args = base_run_args(path);
        args.on_failure = Some("retry".to_string());
        assert!(matches!(build_config(&args), Err(CliError::Argument(_))));
    }

    #[test]
    fn zero_iterations_are_a_config_error() {
        let (_dir, path) = write_run_file(RUN_FILE);
        let mut args = base_run_args(path);
        args.iterations = Some(0);
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }
}
