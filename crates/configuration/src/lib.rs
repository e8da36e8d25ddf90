//! # Configuration Crate
//!
//! Resolves the hosting environment and loads the layered JSON settings the
//! rest of the workspace is configured from:
//!
//! 1. `appsettings.json` (required)
//! 2. `appsettings.<environment>.json` (optional, overrides 1 key by key)
//!
//! Keys are case-insensitive: every object key is folded to lower case before
//! the layers are merged, so `"PGSQL"` in one file and `"Pgsql"` in the next
//! name the same setting.
//!
//! Both files are looked up next to the running executable unless an explicit
//! directory is given. The result is an [`AppConfig`] value that is built once
//! and handed to whoever needs it; nothing is cached globally.

use config::{File, FileFormat};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

// Declare the modules that make up this crate.
pub mod environment;
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use environment::{AppEnvironment, DEFAULT_ENVIRONMENT, ENVIRONMENT_VARIABLE};
pub use error::ConfigError;
pub use settings::{LogLevelSettings, LoggingSettings, Settings};

/// The name of the required base settings file.
pub const BASE_SETTINGS_FILE: &str = "appsettings.json";

/// The merged configuration of a single process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub base_dir: PathBuf,
    /// Files that actually contributed to the merge, in load order.
    pub sources: Vec<PathBuf>,
    pub settings: Settings,
    raw: config::Config,
}

impl AppConfig {
    /// Returns the named connection string, or an error if it is not configured.
    pub fn connection_string(&self, name: &str) -> Result<&str, ConfigError> {
        self.settings
            .connection_string(name)
            .ok_or_else(|| ConfigError::MissingConnectionString(name.to_string()))
    }

    /// Reads any merged key, using `.` to descend into nested objects.
    /// The key is matched without regard to case.
    pub fn get<'de, T: Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        Ok(self.raw.get::<T>(&key.to_lowercase())?)
    }
}

/// Loads the application configuration for the current process.
///
/// The environment comes from `ASPNETCORE_ENVIRONMENT` and the files are read
/// from the directory that contains the running executable.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = AppEnvironment::resolve();
    let base_dir = executable_dir()?;
    load_config_from(&base_dir, environment)
}

/// Loads `appsettings.json` and the environment overlay from `base_dir`.
pub fn load_config_from(base_dir: &Path, environment: AppEnvironment) -> Result<AppConfig, ConfigError> {
    tracing::info!(environment = %environment, "{}", environment.banner());

    let base_path = base_dir.join(BASE_SETTINGS_FILE);
    if !base_path.is_file() {
        return Err(ConfigError::MissingFile(base_path));
    }
    let overlay_path = base_dir.join(environment.overlay_file_name());

    let mut sources = vec![base_path];
    if overlay_path.is_file() {
        sources.push(overlay_path);
    } else {
        tracing::debug!(path = %overlay_path.display(), "No environment overlay found, skipping.");
    }

    // Later sources override earlier ones key by key.
    let mut builder = config::Config::builder();
    for path in &sources {
        let document = read_settings_file(path)?;
        builder = builder.add_source(File::from_str(&document, FileFormat::Json));
    }
    let raw = builder.build()?;

    // Attempt to deserialize the sections we understand into our `Settings` struct
    let settings = raw.clone().try_deserialize::<Settings>()?;

    tracing::debug!(files = sources.len(), "Configuration loaded.");

    Ok(AppConfig {
        environment,
        base_dir: base_dir.to_path_buf(),
        sources,
        settings,
        raw,
    })
}

/// Reads one settings file and returns it as JSON with every key folded to
/// lower case.
fn read_settings_file(path: &Path) -> Result<String, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&text).map_err(|source| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(fold_keys(document).to_string())
}

/// Lower-cases object keys recursively. Keys that collide after folding are
/// merged, with the one read later winning.
fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut folded = Map::new();
            for (key, value) in map {
                let key = key.to_lowercase();
                let value = match folded.remove(&key) {
                    Some(earlier) => merge_values(earlier, fold_keys(value)),
                    None => fold_keys(value),
                };
                folded.insert(key, value);
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

fn merge_values(earlier: Value, later: Value) -> Value {
    match (earlier, later) {
        (Value::Object(mut earlier), Value::Object(later)) => {
            for (key, value) in later {
                let value = match earlier.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                earlier.insert(key, value);
            }
            Value::Object(earlier)
        }
        (_, later) => later,
    }
}

/// The directory containing the running executable.
pub fn executable_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::BaseDirectory)?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ConfigError::BaseDirectory(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "executable path has no parent directory",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_base_file_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "ConnectionStrings": { "PGSQL": "postgres://base/db" } }"#);

        let config = load_config_from(dir.path(), AppEnvironment::default()).unwrap();

        assert_eq!(config.connection_string("PGSQL").unwrap(), "postgres://base/db");
        assert_eq!(config.sources.len(), 1);
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_overlay_overrides_base() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "appsettings.json",
            r#"{ "ConnectionStrings": { "PGSQL": "postgres://base/db", "Reporting": "postgres://reports/db" } }"#,
        );
        write(
            &dir,
            "appsettings.Development.json",
            r#"{ "ConnectionStrings": { "PGSQL": "postgres://dev/db" } }"#,
        );

        let config = load_config_from(dir.path(), AppEnvironment::named("Development")).unwrap();

        assert_eq!(config.connection_string("PGSQL").unwrap(), "postgres://dev/db");
        // Keys only present in the base file survive the merge.
        assert_eq!(config.connection_string("Reporting").unwrap(), "postgres://reports/db");
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_overlay_for_other_environment_is_ignored() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "ConnectionStrings": { "PGSQL": "postgres://base/db" } }"#);
        write(&dir, "appsettings.Staging.json", r#"{ "ConnectionStrings": { "PGSQL": "postgres://staging/db" } }"#);

        let config = load_config_from(dir.path(), AppEnvironment::default()).unwrap();

        assert_eq!(config.connection_string("PGSQL").unwrap(), "postgres://base/db");
    }

    #[test]
    fn test_missing_base_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.Production.json", "{}");

        let err = load_config_from(dir.path(), AppEnvironment::default()).unwrap_err();

        assert!(matches!(err, ConfigError::MissingFile(path) if path.ends_with("appsettings.json")));
    }

    #[test]
    fn test_malformed_base_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "ConnectionStrings": "#);

        let err = load_config_from(dir.path(), AppEnvironment::default()).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidJson { path, .. } if path.ends_with("appsettings.json")));
    }

    #[test]
    fn test_malformed_overlay_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", "{}");
        write(&dir, "appsettings.Production.json", "not json");

        assert!(load_config_from(dir.path(), AppEnvironment::default()).is_err());
    }

    #[test]
    fn test_missing_connection_string() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "Logging": { "LogLevel": { "Default": "Warning" } } }"#);

        let config = load_config_from(dir.path(), AppEnvironment::default()).unwrap();

        let err = config.connection_string("PGSQL").unwrap_err();
        assert!(matches!(err, ConfigError::MissingConnectionString(name) if name == "PGSQL"));
        assert_eq!(config.settings.logging.filter_directive(), Some("warn"));
    }

    #[test]
    fn test_get_reads_arbitrary_keys() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "retries": 5 }"#);
        write(&dir, "appsettings.Production.json", r#"{ "retries": 7 }"#);

        let config = load_config_from(dir.path(), AppEnvironment::default()).unwrap();

        assert_eq!(config.get::<u32>("retries").unwrap(), 7);
    }

    #[test]
    fn test_overlay_wins_when_keys_differ_in_case() {
        let dir = TempDir::new().unwrap();
        write(&dir, "appsettings.json", r#"{ "ConnectionStrings": { "PGSQL": "postgres://base/db" } }"#);
        write(
            &dir,
            "appsettings.Development.json",
            r#"{ "connectionStrings": { "Pgsql": "postgres://dev/db" } }"#,
        );

        // Repeated loads must agree; the merge may not depend on map ordering.
        for _ in 0..20 {
            let config = load_config_from(dir.path(), AppEnvironment::named("Development")).unwrap();
            assert_eq!(config.connection_string("PGSQL").unwrap(), "postgres://dev/db");
            assert_eq!(config.connection_string("pgsql").unwrap(), "postgres://dev/db");
            assert_eq!(config.settings.connection_strings.len(), 1);
        }
    }

    #[test]
    fn test_camel_case_sections_are_recognised() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "appsettings.json",
            r#"{ "connectionStrings": { "pgsql": "postgres://base/db" }, "logging": { "logLevel": { "default": "Debug" } } }"#,
        );

        let config = load_config_from(dir.path(), AppEnvironment::default()).unwrap();

        assert_eq!(config.connection_string("PGSQL").unwrap(), "postgres://base/db");
        assert_eq!(config.settings.logging.filter_directive(), Some("debug"));
        assert_eq!(config.get::<String>("ConnectionStrings.PGSQL").unwrap(), "postgres://base/db");
    }

    #[test]
    fn test_fold_keys_merges_colliding_objects() {
        let folded = fold_keys(serde_json::json!({
            "Logging": { "LogLevel": { "Default": "Warning" } },
            "logging": { "Console": true }
        }));

        assert_eq!(
            folded,
            serde_json::json!({ "logging": { "loglevel": { "default": "Warning" }, "console": true } })
        );
    }
}
