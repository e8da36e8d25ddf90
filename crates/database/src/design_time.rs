//! Context factory for the schema tooling.
//!
//! Command-line migration commands run without the application's wiring, so
//! this module repeats the configuration and connection recipe on its own.

use crate::connection::ContextOptions;
use crate::context::DbContext;
use crate::error::DbError;
use configuration::{executable_dir, load_config_from, AppEnvironment};
use std::path::Path;

/// Creates a context from the settings files next to the running executable.
pub async fn create_context() -> Result<DbContext, DbError> {
    let base_dir = executable_dir()?;
    create_context_in(&base_dir, AppEnvironment::resolve()).await
}

/// Creates a context from the settings files in `base_dir`.
pub async fn create_context_in(base_dir: &Path, environment: AppEnvironment) -> Result<DbContext, DbError> {
    let options = design_time_options(base_dir, environment)?;
    DbContext::from_options(options).await
}

/// Options used by the tooling: the same connection policy as the
/// application, without the non-production diagnostics.
pub fn design_time_options(base_dir: &Path, environment: AppEnvironment) -> Result<ContextOptions, DbError> {
    let config = load_config_from(base_dir, environment)?;
    Ok(ContextOptions::from_config(&config)?.with_diagnostics(false))
}
