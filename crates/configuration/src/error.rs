use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from file: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("The required configuration file '{}' was not found.", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to read settings file '{}': {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file '{}' is not valid JSON: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Connection string '{0}' is not present in the ConnectionStrings section.")]
    MissingConnectionString(String),

    #[error("Could not determine the application base directory: {0}")]
    BaseDirectory(#[source] std::io::Error),
}
