//! Oracle to PostgreSQL migration engine.
//!
//! Converts an Oracle schema (tables, primary keys, indexes, foreign
//! keys, defaults) to PostgreSQL DDL and transfers the data in
//! batches, one table at a time over a single connection to each side.
//!
//! # Example
//!
//! ```no_run
//! use oracle_pg_migrate::{Config, MigrationOrchestrator};
//!
//! fn main() -> oracle_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut orchestrator = MigrationOrchestrator::new(config)?;
//!     let result = orchestrator.run()?;
//!     println!("{}", result.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

pub use config::{BatchErrorPolicy, Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    MigrationOrchestrator, MigrationResult, TableOutcome, TableStatus, TableValidation, TaskStatus,
};
pub use schema::SchemaConverter;
pub use source::{OracleConnector, SourceConnector};
pub use target::{PgConnector, SqlValue, TargetConnector};
pub use transfer::{TransferConfig, TransferEngine};
