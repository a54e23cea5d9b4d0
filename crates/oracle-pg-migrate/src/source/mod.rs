//! Oracle source database operations.

mod types;

pub use types::*;

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use crate::target::SqlValue;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info};

/// The schema-introspection capability the engine consumes. Any
/// database that can answer these queries can act as a source.
///
/// All operations are scoped to the connector's configured schema. The
/// connector holds a single connection that must never be used by more
/// than one logical operation at a time.
pub trait SourceConnector {
    /// List all table names in the schema.
    fn list_tables(&mut self) -> Result<Vec<String>>;

    /// List columns for a table, in ordinal order.
    fn table_columns(&mut self, table: &str) -> Result<Vec<Column>>;

    /// List primary key column names for a table, in key order.
    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>>;

    /// List foreign key rows for a table, one per participating column.
    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>>;

    /// List index rows for a table, one per participating column.
    fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>>;

    /// Total row count for a table.
    fn row_count(&mut self, table: &str) -> Result<i64>;

    /// Resolve a referenced constraint to the table it belongs to.
    fn constraint_table(&mut self, owner: &str, constraint: &str) -> Result<Option<String>>;

    /// Open a server-side cursor over the table and stream its rows in
    /// batches of at most `batch_size`, projected over `columns` in the
    /// given order.
    fn read_batches<'a>(
        &'a mut self,
        table: &str,
        columns: &[Column],
        batch_size: usize,
    ) -> Result<Box<dyn RowBatchIter + 'a>>;

    /// Close the connection.
    fn close(&mut self) -> Result<()>;

    /// Assemble the full table descriptor from the individual
    /// introspection queries. Built fresh per run, never cached.
    fn describe_table(&mut self, table: &str) -> Result<Table> {
        Ok(Table {
            name: table.to_string(),
            columns: self.table_columns(table)?,
            primary_key: self.primary_keys(table)?,
            foreign_keys: self.foreign_keys(table)?,
            indexes: self.indexes(table)?,
        })
    }
}

/// Batched row stream over a source cursor.
pub trait RowBatchIter {
    /// Fetch the next batch, or `None` once the cursor is exhausted.
    fn next_batch(&mut self) -> Result<Option<Vec<Vec<SqlValue>>>>;
}

/// Oracle source connector over a single blocking connection.
pub struct OracleConnector {
    conn: oracle::Connection,
    owner: String,
}

impl OracleConnector {
    /// Connect to the Oracle database described by `config`.
    pub fn connect(config: &SourceConfig) -> Result<Self> {
        let conn = oracle::Connection::connect(
            &config.username,
            &config.password,
            config.connect_string(),
        )
        .map_err(|e| MigrateError::connection("oracle", e.to_string()))?;

        info!(
            "Connected to Oracle database: {} (schema {})",
            config.service_name,
            config.effective_schema()
        );

        Ok(Self {
            conn,
            owner: config.effective_schema(),
        })
    }

    fn quote(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

impl SourceConnector for OracleConnector {
    fn list_tables(&mut self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name
            FROM all_tables
            WHERE owner = :1
            ORDER BY table_name
        "#;

        let rows = self.conn.query(sql, &[&self.owner])?;

        let mut tables = Vec::new();
        for row in rows {
            let row = row?;
            tables.push(row.get(0)?);
        }

        info!("Found {} tables in schema '{}'", tables.len(), self.owner);
        Ok(tables)
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<Column>> {
        let sql = r#"
            SELECT
                column_name,
                data_type,
                data_length,
                data_precision,
                data_scale,
                nullable,
                data_default,
                column_id
            FROM all_tab_columns
            WHERE owner = :1 AND table_name = :2
            ORDER BY column_id
        "#;

        let rows = self
            .conn
            .query(sql, &[&self.owner, &table.to_uppercase()])?;

        let mut columns = Vec::new();
        for row in rows {
            let row = row?;
            let nullable: String = row.get(5)?;
            columns.push(Column {
                name: row.get(0)?,
                data_type: row.get(1)?,
                data_length: row.get(2)?,
                data_precision: row.get(3)?,
                data_scale: row.get(4)?,
                nullable: nullable == "Y",
                data_default: row.get(6)?,
                ordinal: row.get(7)?,
            });
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        let sql = r#"
            SELECT acc.column_name
            FROM all_cons_columns acc
            JOIN all_constraints ac ON acc.owner = ac.owner
                AND acc.constraint_name = ac.constraint_name
            WHERE acc.owner = :1
            AND ac.table_name = :2
            AND ac.constraint_type = 'P'
            ORDER BY acc.position
        "#;

        let rows = self
            .conn
            .query(sql, &[&self.owner, &table.to_uppercase()])?;

        let mut keys = Vec::new();
        for row in rows {
            let row = row?;
            keys.push(row.get(0)?);
        }

        debug!("Primary key for {}: {:?}", table, keys);
        Ok(keys)
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        let sql = r#"
            SELECT
                a.constraint_name,
                a.column_name,
                c.r_owner,
                c.r_constraint_name,
                b.column_name AS ref_column
            FROM all_cons_columns a
            JOIN all_constraints c ON a.owner = c.owner
                AND a.constraint_name = c.constraint_name
            JOIN all_cons_columns b ON c.r_owner = b.owner
                AND c.r_constraint_name = b.constraint_name
                AND a.position = b.position
            WHERE a.owner = :1
            AND a.table_name = :2
            AND c.constraint_type = 'R'
            ORDER BY a.constraint_name, a.position
        "#;

        let rows = self
            .conn
            .query(sql, &[&self.owner, &table.to_uppercase()])?;

        let mut fks = Vec::new();
        for row in rows {
            let row = row?;
            fks.push(ForeignKeyRow {
                constraint: row.get(0)?,
                column: row.get(1)?,
                ref_owner: row.get(2)?,
                ref_constraint: row.get(3)?,
                ref_column: row.get(4)?,
            });
        }

        debug!("Loaded {} foreign key rows for {}", fks.len(), table);
        Ok(fks)
    }

    fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>> {
        let sql = r#"
            SELECT
                ic.index_name,
                ic.column_name,
                ic.column_position,
                ix.uniqueness
            FROM all_ind_columns ic
            JOIN all_indexes ix ON ic.index_owner = ix.owner
                AND ic.index_name = ix.index_name
            WHERE ic.table_owner = :1
            AND ic.table_name = :2
            ORDER BY ic.index_name, ic.column_position
        "#;

        let rows = self
            .conn
            .query(sql, &[&self.owner, &table.to_uppercase()])?;

        let mut indexes = Vec::new();
        for row in rows {
            let row = row?;
            let uniqueness: String = row.get(3)?;
            indexes.push(IndexRow {
                index: row.get(0)?,
                column: row.get(1)?,
                position: row.get(2)?,
                unique: uniqueness == "UNIQUE",
            });
        }

        debug!("Loaded {} index rows for {}", indexes.len(), table);
        Ok(indexes)
    }

    fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            Self::quote(&self.owner),
            Self::quote(&table.to_uppercase())
        );

        let row = self.conn.query_row(&sql, &[])?;
        Ok(row.get(0)?)
    }

    fn constraint_table(&mut self, owner: &str, constraint: &str) -> Result<Option<String>> {
        let sql = r#"
            SELECT table_name
            FROM all_constraints
            WHERE owner = :1
            AND constraint_name = :2
        "#;

        let rows = self.conn.query(sql, &[&owner, &constraint])?;
        for row in rows {
            let row = row?;
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn read_batches<'a>(
        &'a mut self,
        table: &str,
        columns: &[Column],
        batch_size: usize,
    ) -> Result<Box<dyn RowBatchIter + 'a>> {
        let col_list = columns
            .iter()
            .map(|c| Self::quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "SELECT {} FROM {}.{}",
            col_list,
            Self::quote(&self.owner),
            Self::quote(&table.to_uppercase())
        );

        let rows = self.conn.query(&sql, &[])?;

        Ok(Box::new(OracleBatchIter {
            rows,
            columns: columns.to_vec(),
            batch_size,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.conn.close()?;
        info!("Disconnected from Oracle database");
        Ok(())
    }
}

/// Batch iterator over an open Oracle result set. The underlying
/// cursor fetches incrementally, so only one batch of rows is decoded
/// in memory at a time (LOB values excepted; those are materialized
/// whole on decode).
struct OracleBatchIter<'a> {
    rows: oracle::ResultSet<'a, oracle::Row>,
    columns: Vec<Column>,
    batch_size: usize,
}

impl RowBatchIter for OracleBatchIter<'_> {
    fn next_batch(&mut self) -> Result<Option<Vec<Vec<SqlValue>>>> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            match self.rows.next() {
                Some(row) => {
                    let row = row?;
                    batch.push(decode_row(&row, &self.columns)?);
                }
                None => break,
            }
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

/// Decode one Oracle row into the engine's value model, driven by the
/// column metadata.
fn decode_row(row: &oracle::Row, columns: &[Column]) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(columns.len());
    for (idx, col) in columns.iter().enumerate() {
        values.push(decode_value(row, idx, col)?);
    }
    Ok(values)
}

/// Decode a single column value.
///
/// NUMBER columns are narrowed by the same precision thresholds the
/// type mapper uses for DDL, so the wire value always matches the
/// generated target column type. LOB values are fully materialized.
fn decode_value(row: &oracle::Row, idx: usize, col: &Column) -> Result<SqlValue> {
    let upper = col.data_type.to_uppercase();

    if upper.starts_with("TIMESTAMP") {
        if upper.contains("WITH TIME ZONE") && !upper.contains("LOCAL") {
            return Ok(row
                .get::<usize, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
                .map(SqlValue::DateTimeTz)
                .unwrap_or(SqlValue::Null));
        }
        return Ok(row
            .get::<usize, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null));
    }

    match upper.as_str() {
        "NUMBER" => {
            let scale = col.data_scale.unwrap_or(0);
            match col.data_precision {
                Some(p) if scale == 0 && p <= 4 => Ok(row
                    .get::<usize, Option<i16>>(idx)?
                    .map(SqlValue::I16)
                    .unwrap_or(SqlValue::Null)),
                Some(p) if scale == 0 && p <= 9 => Ok(row
                    .get::<usize, Option<i32>>(idx)?
                    .map(SqlValue::I32)
                    .unwrap_or(SqlValue::Null)),
                Some(p) if scale == 0 && p <= 18 => Ok(row
                    .get::<usize, Option<i64>>(idx)?
                    .map(SqlValue::I64)
                    .unwrap_or(SqlValue::Null)),
                _ => Ok(decode_decimal(row, idx)?),
            }
        }

        "FLOAT" | "BINARY_FLOAT" | "BINARY_DOUBLE" => Ok(row
            .get::<usize, Option<f64>>(idx)?
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null)),

        "DATE" => Ok(row
            .get::<usize, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null)),

        "BLOB" | "RAW" | "LONG RAW" => Ok(row
            .get::<usize, Option<Vec<u8>>>(idx)?
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)),

        // VARCHAR2, CHAR, CLOB, ROWID and anything else: read as text.
        _ => Ok(row
            .get::<usize, Option<String>>(idx)?
            .map(SqlValue::String)
            .unwrap_or(SqlValue::Null)),
    }
}

/// Read a NUMBER as text and parse it into a decimal, falling back to
/// f64 and finally raw text for values a decimal cannot hold.
fn decode_decimal(row: &oracle::Row, idx: usize) -> Result<SqlValue> {
    let text: Option<String> = row.get(idx)?;
    Ok(match text {
        None => SqlValue::Null,
        Some(s) => match Decimal::from_str(&s).or_else(|_| Decimal::from_scientific(&s)) {
            Ok(d) => SqlValue::Decimal(d),
            Err(_) => match s.parse::<f64>() {
                Ok(f) => SqlValue::F64(f),
                Err(_) => SqlValue::String(s),
            },
        },
    })
}
