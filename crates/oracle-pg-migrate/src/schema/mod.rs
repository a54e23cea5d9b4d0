//! Schema conversion: turns Oracle table descriptors into PostgreSQL
//! DDL and applies it to the target.

use crate::error::Result;
use crate::source::{Column, ForeignKey, ForeignKeyRow, Index, IndexRow, SourceConnector, Table};
use crate::target::{qualify, quote_ident, TargetConnector};
use crate::typemap;
use tracing::{debug, error, info, warn};

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENT_LEN: usize = 63;

/// Outcome of a schema conversion run.
#[derive(Debug, Default)]
pub struct SchemaConversion {
    /// Tables whose CREATE TABLE succeeded, in conversion order.
    pub succeeded: Vec<Table>,
    /// Tables whose CREATE TABLE failed.
    pub failed: Vec<String>,
}

/// Converts source tables to target DDL and executes it.
pub struct SchemaConverter<'a> {
    source: &'a mut dyn SourceConnector,
    target: &'a mut dyn TargetConnector,
}

impl<'a> SchemaConverter<'a> {
    pub fn new(
        source: &'a mut dyn SourceConnector,
        target: &'a mut dyn TargetConnector,
    ) -> Self {
        Self { source, target }
    }

    /// Convert every table in the source schema (or only those named
    /// in `filter`), in two phases: first all tables and their
    /// indexes, then all foreign keys. No ALTER TABLE ADD FOREIGN KEY
    /// runs until every CREATE TABLE has completed, so FK targets
    /// always exist regardless of conversion order.
    pub fn convert_all_tables(&mut self, filter: Option<&[String]>) -> Result<SchemaConversion> {
        let mut tables = self.source.list_tables()?;
        if let Some(filter) = filter {
            let wanted: Vec<String> = filter.iter().map(|t| t.to_uppercase()).collect();
            tables.retain(|t| wanted.contains(&t.to_uppercase()));
        }

        info!("Converting schema for {} tables", tables.len());
        self.target.ensure_schema()?;

        let mut result = SchemaConversion::default();

        // Phase 1: tables and indexes.
        for name in &tables {
            let table = match self.source.describe_table(name) {
                Ok(table) => table,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Failed to introspect table {}: {}", name, e);
                    result.failed.push(name.clone());
                    continue;
                }
            };
            if self.convert_table(&table) {
                result.succeeded.push(table);
            } else {
                result.failed.push(name.clone());
            }
        }

        // Phase 2: foreign keys, only after every table exists.
        for table in &result.succeeded {
            self.add_foreign_keys(table);
        }

        info!(
            "Schema conversion complete: {} succeeded, {} failed",
            result.succeeded.len(),
            result.failed.len()
        );
        Ok(result)
    }

    /// Create one table and its secondary indexes on the target.
    /// Returns false (after logging) if the CREATE TABLE fails; index
    /// failures are logged but do not fail the table.
    pub fn convert_table(&mut self, table: &Table) -> bool {
        let ddl = build_create_table(self.target.schema(), table);

        if let Err(e) = self.target.execute(&ddl) {
            error!("Failed to create table {}: {}", table.name, e);
            return false;
        }
        info!(
            "Created table {} ({} columns)",
            table.name,
            table.columns.len()
        );

        for index in assemble_indexes(&table.indexes) {
            // Oracle backs the primary key with an index of its own;
            // the inline PRIMARY KEY clause already covers it.
            if table.has_pk() && index.columns == table.primary_key {
                debug!("Skipping primary key index {} on {}", index.name, table.name);
                continue;
            }

            let ddl = build_create_index(self.target.schema(), &table.name, &index);
            match self.target.execute(&ddl) {
                Ok(()) => debug!("Created index on {}: {:?}", table.name, index.columns),
                Err(e) => warn!("Failed to create index {} on {}: {}", index.name, table.name, e),
            }
        }

        true
    }

    /// Add the table's foreign keys. A constraint whose referenced
    /// table cannot be resolved is skipped; a failing ALTER TABLE is
    /// logged and skipped. Neither fails the table.
    fn add_foreign_keys(&mut self, table: &Table) {
        let source = &mut *self.source;
        let fks = group_foreign_keys(&table.foreign_keys, |owner, constraint| {
            source.constraint_table(owner, constraint)
        });

        for fk in fks {
            let ddl = build_add_foreign_key(self.target.schema(), &table.name, &fk);
            match self.target.execute(&ddl) {
                Ok(()) => debug!("Added foreign key {} on {}", fk.name, table.name),
                Err(e) => warn!(
                    "Failed to add foreign key {} on {}: {}",
                    fk.name, table.name, e
                ),
            }
        }
    }
}

/// Build the CREATE TABLE statement for a table, with an inline
/// primary key when the source has one. Interrupted runs are simply
/// restarted, so all generated DDL must tolerate already-created
/// objects.
pub fn build_create_table(schema: &str, table: &Table) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(column_ddl).collect();

    if table.has_pk() {
        let cols = table
            .primary_key
            .iter()
            .map(|c| quote_ident(&c.to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("PRIMARY KEY ({})", cols));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualify(schema, &table.name.to_lowercase()),
        parts.join(",\n    ")
    )
}

/// Render one column definition.
fn column_ddl(col: &Column) -> String {
    let pg_type = typemap::oracle_to_postgres(
        &col.data_type,
        col.data_length,
        col.data_precision,
        col.data_scale,
    );

    let mut ddl = format!("{} {}", quote_ident(&col.name.to_lowercase()), pg_type);

    if let Some(default) = &col.data_default {
        if let Some(converted) = typemap::convert_default(default, &col.data_type) {
            ddl.push_str(&format!(" DEFAULT {}", converted));
        }
    }

    if !col.nullable {
        ddl.push_str(" NOT NULL");
    }

    ddl
}

/// Build a CREATE INDEX statement. The index is renamed to stay
/// unique across the target schema.
pub fn build_create_index(schema: &str, table: &str, index: &Index) -> String {
    let cols = index
        .columns
        .iter()
        .map(|c| quote_ident(&c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&generated_name(table, &index.name)),
        qualify(schema, &table.to_lowercase()),
        cols
    )
}

/// Build the ALTER TABLE statement for one foreign key.
pub fn build_add_foreign_key(schema: &str, table: &str, fk: &ForeignKey) -> String {
    let cols = fk
        .columns
        .iter()
        .map(|c| quote_ident(&c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ");
    let ref_cols = fk
        .ref_columns
        .iter()
        .map(|c| quote_ident(&c.to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        qualify(schema, &table.to_lowercase()),
        quote_ident(&generated_name(table, &fk.name)),
        cols,
        qualify(schema, &fk.ref_table.to_lowercase()),
        ref_cols
    )
}

/// Derive a target-side name for an index or constraint, prefixed
/// with the table name so it stays unique across the schema, and
/// clipped to PostgreSQL's identifier limit.
pub fn generated_name(table: &str, name: &str) -> String {
    format!("{}_{}", table, name)
        .to_lowercase()
        .chars()
        .take(MAX_IDENT_LEN)
        .collect()
}

/// Reconstruct multi-column indexes from per-column dictionary rows.
/// Rows carry 1-based positions; a position seen twice keeps the last
/// value, and positions never seen are dropped.
pub fn assemble_indexes(rows: &[IndexRow]) -> Vec<Index> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: std::collections::HashMap<String, (Vec<Option<String>>, bool)> =
        std::collections::HashMap::new();

    for row in rows {
        if !by_name.contains_key(&row.index) {
            order.push(row.index.clone());
        }
        let entry = by_name
            .entry(row.index.clone())
            .or_insert_with(|| (Vec::new(), row.unique));
        entry.1 = row.unique;

        let pos = row.position.max(1) as usize;
        if entry.0.len() < pos {
            entry.0.resize(pos, None);
        }
        if entry.0[pos - 1].is_some() {
            warn!(
                "Index {} has colliding column positions at {}; keeping {}",
                row.index, row.position, row.column
            );
        }
        entry.0[pos - 1] = Some(row.column.clone());
    }

    order
        .into_iter()
        .map(|name| {
            let (slots, unique) = by_name.remove(&name).unwrap_or_default();
            Index {
                name,
                columns: slots.into_iter().flatten().collect(),
                unique,
            }
        })
        .collect()
}

/// Reconstruct foreign keys from per-column dictionary rows. The
/// referenced table is resolved through the referenced constraint; a
/// constraint that cannot be resolved is dropped with a warning.
pub fn group_foreign_keys<F>(rows: &[ForeignKeyRow], mut resolve: F) -> Vec<ForeignKey>
where
    F: FnMut(&str, &str) -> Result<Option<String>>,
{
    let mut order: Vec<String> = Vec::new();
    let mut by_name: std::collections::HashMap<String, ForeignKey> =
        std::collections::HashMap::new();

    for row in rows {
        if let Some(fk) = by_name.get_mut(&row.constraint) {
            fk.columns.push(row.column.clone());
            fk.ref_columns.push(row.ref_column.clone());
            continue;
        }

        let ref_table = match resolve(&row.ref_owner, &row.ref_constraint) {
            Ok(Some(table)) => table,
            Ok(None) => {
                warn!(
                    "Skipping foreign key {}: referenced constraint {}.{} not found",
                    row.constraint, row.ref_owner, row.ref_constraint
                );
                continue;
            }
            Err(e) => {
                warn!(
                    "Skipping foreign key {}: failed to resolve referenced table: {}",
                    row.constraint, e
                );
                continue;
            }
        };

        order.push(row.constraint.clone());
        by_name.insert(
            row.constraint.clone(),
            ForeignKey {
                name: row.constraint.clone(),
                columns: vec![row.column.clone()],
                ref_table,
                ref_columns: vec![row.ref_column.clone()],
            },
        );
    }

    order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}
