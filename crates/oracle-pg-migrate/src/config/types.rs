//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (Oracle).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (Oracle) configuration.
///
/// Connection fields left empty in the file fall back to environment
/// variables (`ORACLE_HOST`, `ORACLE_PORT`, `ORACLE_SERVICE_NAME`,
/// `ORACLE_USERNAME`, `ORACLE_PASSWORD`, `ORACLE_SCHEMA`), then to the
/// defaults. Precedence is always explicit value, then environment,
/// then default.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Listener port (default: 1521).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Oracle service name.
    #[serde(default)]
    pub service_name: String,

    /// Username.
    #[serde(default)]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema (owner) to migrate. Defaults to the username.
    #[serde(default)]
    pub schema: String,
}

impl SourceConfig {
    /// Effective listener port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(1521)
    }

    /// Effective schema: the configured schema, or the username.
    /// Oracle dictionary views store owners upper-cased.
    pub fn effective_schema(&self) -> String {
        if self.schema.is_empty() {
            self.username.to_uppercase()
        } else {
            self.schema.to_uppercase()
        }
    }

    /// Build an Easy Connect string for the Oracle driver.
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port(), self.service_name)
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
///
/// Environment fallbacks: `PG_HOST`, `PG_PORT`, `PG_DATABASE`,
/// `PG_USERNAME`, `PG_PASSWORD`, `PG_SCHEMA`.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "public"). All generated statement
    /// identifiers are qualified with this schema.
    #[serde(default)]
    pub schema: String,
}

impl TargetConfig {
    /// Effective database port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5432)
    }

    /// Effective target schema.
    pub fn effective_schema(&self) -> String {
        if self.schema.is_empty() {
            "public".to_string()
        } else {
            self.schema.clone()
        }
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per bulk insert batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Truncate target tables before data transfer (default: false).
    #[serde(default)]
    pub truncate: bool,

    /// Tables to migrate. Empty means all tables in the source schema.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// What to do when one batch insert fails (default: continue).
    #[serde(default)]
    pub on_batch_error: BatchErrorPolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            truncate: false,
            include_tables: Vec::new(),
            on_batch_error: BatchErrorPolicy::default(),
        }
    }
}

/// Policy for handling a failed batch insert during data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Log the failure, drop the batch's rows, and continue with the
    /// next batch. The table still counts as transferred.
    #[default]
    Continue,

    /// Stop the table's transfer at the first failed batch and report
    /// the table as failed.
    Abort,
}

fn default_batch_size() -> usize {
    1000
}
