use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A run file. Relative paths inside it are resolved against the file's own directory.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub procedure: Option<PathBuf>,
    pub species: Option<PathBuf>,
    /// A Generation procedure run once to build the configuration before the main run.
    pub generator: Option<PathBuf>,
    pub configuration: Option<String>,
    pub run: Option<FileRunConfig>,
    pub output: Option<FileOutputConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub iterations: Option<u64>,
    pub seed: Option<u64>,
    pub prefix: Option<String>,
    pub on_failure: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub configuration: Option<PathBuf>,
    pub data_directory: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading run file from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
