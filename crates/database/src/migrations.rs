//! Versioned, reversible schema migrations.
//!
//! The scripts under `migrations/` are embedded at compile time. Applied
//! versions are recorded in the `_sqlx_migrations` ledger, so applying twice
//! is a no-op and reverting only touches what was applied.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use sqlx::migrate::{Migration, Migrator};
use sqlx::PgPool;
use std::collections::HashMap;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// A known migration and whether the connected database has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied_on: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_on.is_some()
    }

    /// The timestamp-prefixed name, e.g. `20190502163333_Initial`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.version, self.description.replace(' ', "_"))
    }
}

/// The forward half of every embedded migration, oldest first.
pub fn known_migrations() -> impl Iterator<Item = &'static Migration> {
    MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration())
}

async fn applied_versions(pool: &PgPool) -> Result<HashMap<i64, DateTime<Utc>>, sqlx::Error> {
    let ledger_exists: bool = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;
    if !ledger_exists {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, DateTime<Utc>)> =
        sqlx::query_as("SELECT version, installed_on FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

/// Lists every embedded migration with its applied time, if any.
pub async fn status(pool: &PgPool) -> Result<Vec<MigrationStatus>, DbError> {
    let applied = applied_versions(pool).await?;
    Ok(known_migrations()
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied_on: applied.get(&m.version).copied(),
        })
        .collect())
}

/// Applies all pending migrations in version order and returns the ones that ran.
pub async fn apply(pool: &PgPool) -> Result<Vec<MigrationStatus>, DbError> {
    let pending: Vec<_> = status(pool).await?.into_iter().filter(|m| !m.is_applied()).collect();
    if pending.is_empty() {
        tracing::info!("Database schema is up to date.");
        return Ok(pending);
    }

    for migration in &pending {
        tracing::info!(version = migration.version, "Applying migration {}", migration.name());
    }
    MIGRATOR.run(pool).await?;
    tracing::info!(count = pending.len(), "Migrations applied.");
    Ok(pending)
}

/// Picks the version to revert to when none is given: the one before the
/// latest applied migration, or 0 for an empty schema.
pub fn default_revert_target(statuses: &[MigrationStatus]) -> i64 {
    let mut applied: Vec<i64> = statuses.iter().filter(|m| m.is_applied()).map(|m| m.version).collect();
    applied.sort_unstable();
    applied.pop();
    applied.last().copied().unwrap_or(0)
}

/// Reverts every applied migration newer than `target`, newest first.
///
/// `None` reverts only the latest applied migration; `Some(0)` reverts all of them.
pub async fn revert(pool: &PgPool, target: Option<i64>) -> Result<Vec<MigrationStatus>, DbError> {
    let statuses = status(pool).await?;
    let target = target.unwrap_or_else(|| default_revert_target(&statuses));

    let mut reverting: Vec<_> = statuses
        .into_iter()
        .filter(|m| m.is_applied() && m.version > target)
        .collect();
    reverting.sort_by(|a, b| b.version.cmp(&a.version));
    if reverting.is_empty() {
        tracing::info!(target, "Nothing to revert.");
        return Ok(reverting);
    }

    for migration in &reverting {
        tracing::info!(version = migration.version, "Reverting migration {}", migration.name());
    }
    MIGRATOR.undo(pool, target).await?;
    Ok(reverting)
}
