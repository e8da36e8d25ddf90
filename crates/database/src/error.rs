use crate::connection::ServerVersion;
use crate::model::ModelError;
use configuration::ConfigError;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// SQLSTATE raised when a foreign key has no matching principal row.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE raised when a primary key or unique constraint is duplicated.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load configuration for database connection: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Database operation failed: {0}")]
    QueryError(#[source] sqlx::Error),

    #[error("Foreign key constraint {} was violated.", .constraint.as_deref().unwrap_or("<unknown>"))]
    ForeignKeyViolation {
        constraint: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unique constraint {} was violated.", .constraint.as_deref().unwrap_or("<unknown>"))]
    UniqueViolation {
        constraint: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Giving up after {attempts} attempts: {source}")]
    RetryLimitExceeded {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("PostgreSQL {found} is older than the required {required}.")]
    UnsupportedServerVersion {
        found: ServerVersion,
        required: ServerVersion,
    },

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid schema model: {0}")]
    Model(#[from] ModelError),

    #[error("The requested data was not found in the database.")]
    NotFound,
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return DbError::NotFound;
        }
        let classified = err
            .as_database_error()
            .and_then(|db| db.code().map(|code| (code.into_owned(), db.constraint().map(str::to_string))));
        match classified {
            Some((code, constraint)) if code == FOREIGN_KEY_VIOLATION => {
                DbError::ForeignKeyViolation { constraint, source: err }
            }
            Some((code, constraint)) if code == UNIQUE_VIOLATION => {
                DbError::UniqueViolation { constraint, source: err }
            }
            _ => DbError::QueryError(err),
        }
    }
}

impl DbError {
    /// The driver error underneath this error, if there is one.
    pub fn sqlx_source(&self) -> Option<&sqlx::Error> {
        match self {
            DbError::QueryError(source)
            | DbError::ForeignKeyViolation { source, .. }
            | DbError::UniqueViolation { source, .. }
            | DbError::RetryLimitExceeded { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Renders the error for display.
    ///
    /// With `detailed` set, the server-side detail, hint, table and constraint
    /// are appended. Those can contain row values, so callers only pass `true`
    /// outside production.
    pub fn describe(&self, detailed: bool) -> String {
        let mut message = self.to_string();
        if !detailed {
            return message;
        }

        let pg = self
            .sqlx_source()
            .and_then(|e| e.as_database_error())
            .and_then(|db| db.try_downcast_ref::<PgDatabaseError>());

        if let Some(pg) = pg {
            message.push_str(&format!(" [SQLSTATE {}]", pg.code()));
            if let Some(detail) = pg.detail() {
                message.push_str(&format!("\n  detail: {detail}"));
            }
            if let Some(hint) = pg.hint() {
                message.push_str(&format!("\n  hint: {hint}"));
            }
            if let Some(table) = pg.table() {
                message.push_str(&format!("\n  table: {table}"));
            }
            if let Some(constraint) = pg.constraint() {
                message.push_str(&format!("\n  constraint: {constraint}"));
            }
        }
        message
    }
}
