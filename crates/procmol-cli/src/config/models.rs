use procmol::procedure::config::RunConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub procedure_path: PathBuf,
    pub species_path: PathBuf,
    pub generator_path: Option<PathBuf>,
    pub configuration_name: String,
    pub run: RunConfig,
    pub output_configuration: Option<PathBuf>,
    pub data_directory: Option<PathBuf>,
}
