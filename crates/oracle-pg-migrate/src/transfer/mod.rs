//! Batched data transfer from source to target.

use crate::config::BatchErrorPolicy;
use crate::error::{MigrateError, Result};
use crate::source::SourceConnector;
use crate::target::TargetConnector;
use tracing::{error, info, warn};

/// Knobs for a transfer run.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rows per read/insert cycle.
    pub batch_size: usize,
    /// Empty each target table before loading it.
    pub truncate: bool,
    /// What to do when a batch insert fails.
    pub on_batch_error: BatchErrorPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            truncate: false,
            on_batch_error: BatchErrorPolicy::Continue,
        }
    }
}

/// Per-table transfer accounting.
#[derive(Debug, Clone, Default)]
pub struct TableTransfer {
    pub table: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub batches: u64,
    pub failed_batches: u64,
}

/// Streams table contents from the source into the target in fixed
/// size batches. Rows are held in memory one batch at a time.
pub struct TransferEngine<'a> {
    source: &'a mut dyn SourceConnector,
    target: &'a mut dyn TargetConnector,
    config: TransferConfig,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        source: &'a mut dyn SourceConnector,
        target: &'a mut dyn TargetConnector,
        config: TransferConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Copy one table. A failing batch is logged and skipped (or, under
    /// the abort policy, ends the table with an error); a source read
    /// error or a missing target table ends the table immediately.
    pub fn migrate_table(&mut self, table: &str) -> Result<TableTransfer> {
        let target_table = table.to_lowercase();

        // Probe the target before touching the source, so a missing
        // table fails before any rows are read.
        self.target.row_count(&target_table).map_err(|e| {
            MigrateError::transfer(table, format!("target table not reachable: {}", e))
        })?;

        // An empty source table is done before any truncate happens:
        // a reload must not wipe target rows it has nothing to replace.
        if self.source.row_count(table)? == 0 {
            info!("Table {} is empty on the source; nothing to transfer", table);
            return Ok(TableTransfer {
                table: table.to_string(),
                ..Default::default()
            });
        }

        if self.config.truncate {
            self.target.truncate_table(&target_table)?;
        }

        let columns = self.source.table_columns(table)?;
        if columns.is_empty() {
            return Err(MigrateError::Metadata(format!(
                "table {} has no columns",
                table
            )));
        }
        let target_columns: Vec<String> =
            columns.iter().map(|c| c.name.to_lowercase()).collect();

        let mut result = TableTransfer {
            table: table.to_string(),
            ..Default::default()
        };

        let mut batches = self
            .source
            .read_batches(table, &columns, self.config.batch_size)?;

        while let Some(rows) = batches.next_batch()? {
            result.batches += 1;
            result.rows_read += rows.len() as u64;

            match self.target.insert_batch(&target_table, &target_columns, &rows) {
                Ok(written) => result.rows_written += written,
                Err(e) => {
                    result.failed_batches += 1;
                    error!(
                        "Batch {} failed for table {} ({} rows lost): {}",
                        result.batches,
                        table,
                        rows.len(),
                        e
                    );
                    if self.config.on_batch_error == BatchErrorPolicy::Abort {
                        return Err(MigrateError::transfer(
                            table,
                            format!("aborted at batch {}: {}", result.batches, e),
                        ));
                    }
                }
            }
        }

        if result.failed_batches > 0 {
            warn!(
                "Table {}: {} of {} batches failed ({} of {} rows written)",
                table, result.failed_batches, result.batches, result.rows_written, result.rows_read
            );
        } else {
            info!(
                "Table {}: {} rows in {} batches",
                table, result.rows_written, result.batches
            );
        }

        Ok(result)
    }

    /// Copy each named table in order. A table failure is recorded and
    /// the run moves on, unless the error is a connection loss, which
    /// ends the run.
    pub fn migrate_all_tables(
        &mut self,
        tables: &[String],
    ) -> Result<Vec<(String, Result<TableTransfer>)>> {
        let mut outcomes = Vec::with_capacity(tables.len());

        for table in tables {
            match self.migrate_table(table) {
                Ok(transfer) => outcomes.push((table.clone(), Ok(transfer))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Table {} failed: {}", table, e);
                    outcomes.push((table.clone(), Err(e)));
                }
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_config_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert!(!config.truncate);
        assert_eq!(config.on_batch_error, BatchErrorPolicy::Continue);
    }
}
