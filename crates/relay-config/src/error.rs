use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while loading `--config=FILE` (spec §6). CLI parse
/// failures are handled by `clap` itself before any of this code runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("couldn't parse config file {path} as YAML: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}
