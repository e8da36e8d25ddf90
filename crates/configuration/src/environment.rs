use std::env;
use std::fmt;

/// The environment variable that selects the hosting environment.
pub const ENVIRONMENT_VARIABLE: &str = "ASPNETCORE_ENVIRONMENT";

/// The environment assumed when the variable is unset or empty.
pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// The name of the environment the process runs in (e.g. "Production", "Development").
///
/// The name selects the optional `appsettings.<name>.json` overlay and decides
/// whether diagnostic options like detailed errors are switched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnvironment {
    name: String,
}

impl AppEnvironment {
    /// Resolves the environment from `ASPNETCORE_ENVIRONMENT`.
    pub fn resolve() -> Self {
        Self::from_value(env::var(ENVIRONMENT_VARIABLE).ok().as_deref())
    }

    /// Resolves the environment from a raw variable value, falling back to
    /// `Production` for missing or blank values.
    pub fn from_value(value: Option<&str>) -> Self {
        let name = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_ENVIRONMENT);
        Self::named(name)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact, case-sensitive comparison against `Production`.
    pub fn is_production(&self) -> bool {
        self.name == DEFAULT_ENVIRONMENT
    }

    /// File name of the environment-specific overlay, e.g. `appsettings.Staging.json`.
    pub fn overlay_file_name(&self) -> String {
        format!("appsettings.{}.json", self.name)
    }

    /// The startup line announcing which environment is active.
    pub fn banner(&self) -> String {
        format!("Environment: {}", self.name)
    }
}

impl Default for AppEnvironment {
    fn default() -> Self {
        Self::named(DEFAULT_ENVIRONMENT)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
