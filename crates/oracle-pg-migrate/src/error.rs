//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Oracle driver error.
    #[error("Source database error: {0}")]
    Source(#[from] oracle::Error),

    /// PostgreSQL driver error.
    #[error("Target database error: {0}")]
    Target(#[from] postgres::Error),

    /// Connection could not be established or was lost. Fatal for the
    /// whole run; the only error class allowed to escape to the caller.
    #[error("Connection to {database} failed: {message}")]
    Connection { database: String, message: String },

    /// An introspection query failed or returned an unexpected shape.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// DDL failed for a specific table.
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Data transfer failed for a specific table.
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error.
    pub fn connection(database: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Connection {
            database: database.into(),
            message: message.into(),
        }
    }

    /// Create a Ddl error.
    pub fn ddl(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Ddl {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Transfer error.
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether this error is fatal for the whole run rather than a
    /// single table or batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MigrateError::Connection { .. })
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Io(_) => 2,
            MigrateError::Connection { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
