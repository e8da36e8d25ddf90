use serde::Deserialize;
use std::collections::HashMap;

/// The strongly-typed view over the merged `appsettings` documents.
///
/// Only the sections this application understands are modelled; everything
/// else stays reachable through [`crate::AppConfig::get`]. Keys arrive folded
/// to lower case by the loader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Named connection strings, keyed by lower-cased name (`"pgsql"`).
    #[serde(rename = "connectionstrings", default)]
    pub connection_strings: HashMap<String, String>,

    #[serde(rename = "logging", default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    #[serde(rename = "loglevel", default)]
    pub log_level: LogLevelSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogLevelSettings {
    /// Level name in .NET terms ("Information", "Warning", ...).
    #[serde(rename = "default")]
    pub default: Option<String>,
}

impl Settings {
    /// Looks up a connection string. Configuration keys are case-insensitive.
    pub fn connection_string(&self, name: &str) -> Option<&str> {
        self.connection_strings
            .get(&name.to_lowercase())
            .map(String::as_str)
    }
}

impl LoggingSettings {
    /// Translates `Logging.LogLevel.Default` into a `tracing` filter directive.
    ///
    /// Returns `None` when the level is absent or not a recognised name.
    pub fn filter_directive(&self) -> Option<&'static str> {
        let level = self.log_level.default.as_deref()?;
        match level.to_ascii_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "information" | "info" => Some("info"),
            "warning" | "warn" => Some("warn"),
            "error" | "critical" => Some("error"),
            "none" => Some("off"),
            _ => None,
        }
    }
}
