use crate::connection::{connect, ContextOptions, ServerVersion};
use crate::error::DbError;
use crate::retry::RetryPolicy;
use configuration::AppConfig;
use sqlx::PgPool;
use std::fmt::Debug;
use std::future::Future;

/// An open database context: the connection pool plus the options it was
/// opened with.
#[derive(Debug, Clone)]
pub struct DbContext {
    pool: PgPool,
    options: ContextOptions,
    retry: RetryPolicy,
    server_version: ServerVersion,
}

impl DbContext {
    /// Opens a context from the application's merged configuration.
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        Self::from_options(ContextOptions::from_config(config)?).await
    }

    /// Opens a context from explicit options.
    pub async fn from_options(options: ContextOptions) -> Result<Self, DbError> {
        tracing::debug!(options = ?options, "Opening database context.");
        let (pool, server_version) = connect(&options).await?;
        Ok(Self {
            pool,
            retry: options.retry_policy(),
            options,
            server_version,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    /// Runs a database operation under the context's retry policy.
    pub async fn execute_with_retry<T, F, Fut>(&self, operation: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.retry.execute(operation).await
    }

    /// Logs an operation, with its parameter values only when sensitive data
    /// logging is enabled.
    pub fn log_operation(&self, operation: &str, parameters: &dyn Debug) {
        if self.options.sensitive_data_logging {
            tracing::debug!(operation, parameters = ?parameters, "Executing database operation.");
        } else {
            tracing::debug!(operation, "Executing database operation.");
        }
    }

    /// Renders an error, including server-side detail when detailed errors are enabled.
    pub fn describe_error(&self, err: &DbError) -> String {
        err.describe(self.options.detailed_errors)
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }
}
