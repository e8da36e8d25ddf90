//! # Database Crate
//!
//! The application's interface to PostgreSQL: how a context is opened, the
//! declared schema, and the migrations that materialize it.
//!
//! ## Public API
//!
//! - `ContextOptions` / `connect`: connection string resolution and the fixed
//!   connection policy (30s command timeout, 3 retries, PostgreSQL 11.2 or newer).
//! - `DbContext`: an open pool plus its options; `design_time::create_context`
//!   builds one for the migration tooling.
//! - `model`: the two entities and their shared-key one-to-one relationship.
//! - `migrations`: apply, revert and list the embedded migrations.
//! - `schema::verify_schema`: compare the live database with the model.
//! - `DbRepository`: reads and writes `Table1s` and `Table2s`.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod context;
pub mod design_time;
pub mod error;
pub mod migrations;
pub mod model;
pub mod repository;
pub mod retry;
pub mod schema;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, ContextOptions, ServerVersion, CONNECTION_STRING_NAME};
pub use context::DbContext;
pub use error::DbError;
pub use model::{build_model, Model, ModelError};
pub use repository::DbRepository;
pub use retry::{BackoffConfig, RetryPolicy};
pub use schema::{verify_schema, SchemaDrift};
