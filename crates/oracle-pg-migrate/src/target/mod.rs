//! PostgreSQL target database operations.

use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use bytes::BytesMut;
use postgres_types::{to_sql_checked, IsNull, ToSql, Type};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// PostgreSQL's hard limit on bind parameters per statement.
const MAX_PARAMS: usize = 65_535;

/// A single cell value in transit from source to target.
///
/// The source connector decodes into this model using the same
/// precision thresholds the type mapper uses for DDL, so every variant
/// lines up with the column type generated on the target side.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    DateTime(chrono::NaiveDateTime),
    DateTimeTz(chrono::DateTime<chrono::FixedOffset>),
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::I16(v) => v.to_sql(ty, out),
            SqlValue::I32(v) => v.to_sql(ty, out),
            SqlValue::I64(v) => v.to_sql(ty, out),
            SqlValue::F64(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::String(v) => v.to_sql(ty, out),
            SqlValue::Bytes(v) => v.to_sql(ty, out),
            SqlValue::DateTime(v) => v.to_sql(ty, out),
            SqlValue::DateTimeTz(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Acceptance is delegated to the inner value at encode time.
        true
    }

    to_sql_checked!();
}

/// Everything the engine needs from the target database.
pub trait TargetConnector {
    /// Create the target schema if it does not already exist.
    fn ensure_schema(&mut self) -> Result<()>;

    /// Execute a single DDL statement.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Remove all rows from a table.
    fn truncate_table(&mut self, table: &str) -> Result<()>;

    /// Insert a batch of rows, returning the number inserted. The
    /// batch may be split into multiple statements internally to stay
    /// under the bind-parameter limit.
    fn insert_batch(&mut self, table: &str, columns: &[String], rows: &[Vec<SqlValue>])
        -> Result<u64>;

    /// Total row count for a table.
    fn row_count(&mut self, table: &str) -> Result<i64>;

    /// The schema this connector writes into.
    fn schema(&self) -> &str;

    /// Close the connection.
    fn close(&mut self) -> Result<()>;
}

/// Quote an identifier for PostgreSQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualify and quote a table name.
pub fn qualify(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// PostgreSQL target connector over a single blocking connection.
pub struct PgConnector {
    client: postgres::Client,
    schema: String,
}

impl PgConnector {
    /// Connect to the PostgreSQL database described by `config`.
    pub fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg = postgres::Config::new();
        pg.host(&config.host)
            .port(config.port())
            .dbname(&config.database)
            .user(&config.username)
            .password(&config.password);

        let client = pg
            .connect(postgres::NoTls)
            .map_err(|e| MigrateError::connection("postgres", e.to_string()))?;

        info!(
            "Connected to PostgreSQL database: {} (schema {})",
            config.database,
            config.effective_schema()
        );

        Ok(Self {
            client,
            schema: config.effective_schema(),
        })
    }
}

impl TargetConnector for PgConnector {
    fn ensure_schema(&mut self) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema));
        self.client.execute(sql.as_str(), &[])?;
        debug!("Ensured schema '{}'", self.schema);
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing DDL: {}", sql);
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn truncate_table(&mut self, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", qualify(&self.schema, table));
        self.client.execute(sql.as_str(), &[])?;
        info!("Truncated table {}", table);
        Ok(())
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let qualified = qualify(&self.schema, table);
        let rows_per_stmt = rows_per_statement(columns.len());

        let mut total = 0u64;
        for chunk in rows.chunks(rows_per_stmt) {
            let sql = build_insert_sql(&qualified, columns, chunk.len());
            let params: Vec<&(dyn ToSql + Sync)> = chunk
                .iter()
                .flat_map(|row| row.iter().map(|v| v as &(dyn ToSql + Sync)))
                .collect();
            total += self.client.execute(sql.as_str(), &params)?;
        }

        Ok(total)
    }

    fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualify(&self.schema, table));
        let row = self.client.query_one(sql.as_str(), &[])?;
        Ok(row.get(0))
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn close(&mut self) -> Result<()> {
        // The underlying connection is torn down when the client drops.
        info!("Disconnected from PostgreSQL database");
        Ok(())
    }
}

/// How many rows fit in one multi-row INSERT without exceeding the
/// bind-parameter limit.
fn rows_per_statement(num_columns: usize) -> usize {
    if num_columns == 0 {
        return 1;
    }
    (MAX_PARAMS / num_columns).max(1)
}

/// Build a multi-row parameterized INSERT statement.
fn build_insert_sql(qualified_table: &str, columns: &[String], num_rows: usize) -> String {
    let col_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut groups = Vec::with_capacity(num_rows);
    let mut param = 1;
    for _ in 0..num_rows {
        let placeholders = (0..columns.len())
            .map(|i| format!("${}", param + i))
            .collect::<Vec<_>>()
            .join(", ");
        groups.push(format!("({})", placeholders));
        param += columns.len();
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table,
        col_list,
        groups.join(", ")
    )
}
