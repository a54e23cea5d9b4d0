//! Behavioral tests for the conversion and transfer engines, driven
//! through fake connectors that record every statement they receive.

use std::collections::{HashMap, HashSet};

use oracle_pg_migrate::config::{BatchErrorPolicy, Config};
use oracle_pg_migrate::error::{MigrateError, Result};
use oracle_pg_migrate::schema::SchemaConverter;
use oracle_pg_migrate::source::{
    Column, ForeignKeyRow, IndexRow, RowBatchIter, SourceConnector, Table,
};
use oracle_pg_migrate::target::{SqlValue, TargetConnector};
use oracle_pg_migrate::transfer::{TransferConfig, TransferEngine};
use oracle_pg_migrate::{MigrationOrchestrator, TableStatus, TaskStatus};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    tables: Vec<String>,
    descriptors: HashMap<String, Table>,
    rows: HashMap<String, Vec<Vec<SqlValue>>>,
    constraint_tables: HashMap<String, String>,
    read_batches_calls: usize,
}

impl FakeSource {
    fn with_table(mut self, table: Table, rows: Vec<Vec<SqlValue>>) -> Self {
        self.tables.push(table.name.clone());
        self.rows.insert(table.name.clone(), rows);
        self.descriptors.insert(table.name.clone(), table);
        self
    }

    fn with_constraint(mut self, constraint: &str, table: &str) -> Self {
        self.constraint_tables
            .insert(constraint.to_string(), table.to_string());
        self
    }

    fn descriptor(&self, table: &str) -> Result<&Table> {
        self.descriptors
            .get(table)
            .ok_or_else(|| MigrateError::Metadata(format!("no such table: {}", table)))
    }
}

impl SourceConnector for FakeSource {
    fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<Column>> {
        Ok(self.descriptor(table)?.columns.clone())
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.descriptor(table)?.primary_key.clone())
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        Ok(self.descriptor(table)?.foreign_keys.clone())
    }

    fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>> {
        Ok(self.descriptor(table)?.indexes.clone())
    }

    fn row_count(&mut self, table: &str) -> Result<i64> {
        Ok(self.rows.get(table).map_or(0, |r| r.len()) as i64)
    }

    fn constraint_table(&mut self, _owner: &str, constraint: &str) -> Result<Option<String>> {
        Ok(self.constraint_tables.get(constraint).cloned())
    }

    fn read_batches<'a>(
        &'a mut self,
        table: &str,
        _columns: &[Column],
        batch_size: usize,
    ) -> Result<Box<dyn RowBatchIter + 'a>> {
        self.read_batches_calls += 1;
        let rows = self.rows.get(table).cloned().unwrap_or_default();
        Ok(Box::new(FakeBatchIter { rows, batch_size }))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FakeBatchIter {
    rows: Vec<Vec<SqlValue>>,
    batch_size: usize,
}

impl RowBatchIter for FakeBatchIter {
    fn next_batch(&mut self) -> Result<Option<Vec<Vec<SqlValue>>>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = self.batch_size.min(self.rows.len());
        Ok(Some(self.rows.drain(..take).collect()))
    }
}

#[derive(Default)]
struct FakeTarget {
    commands: Vec<String>,
    insert_calls: usize,
    /// 1-based insert call indices that should fail.
    fail_inserts: HashSet<usize>,
    /// Tables whose row_count probe fails.
    missing_tables: HashSet<String>,
    row_counts: HashMap<String, i64>,
}

impl TargetConnector for FakeTarget {
    fn ensure_schema(&mut self) -> Result<()> {
        self.commands.push("ENSURE SCHEMA".to_string());
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.commands.push(sql.to_string());
        Ok(())
    }

    fn truncate_table(&mut self, table: &str) -> Result<()> {
        self.commands.push(format!("TRUNCATE {}", table));
        self.row_counts.insert(table.to_string(), 0);
        Ok(())
    }

    fn insert_batch(
        &mut self,
        table: &str,
        _columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        self.insert_calls += 1;
        if self.fail_inserts.contains(&self.insert_calls) {
            return Err(MigrateError::transfer(table, "induced batch failure"));
        }
        self.commands
            .push(format!("INSERT {} ({} rows)", table, rows.len()));
        *self.row_counts.entry(table.to_string()).or_insert(0) += rows.len() as i64;
        Ok(rows.len() as u64)
    }

    fn row_count(&mut self, table: &str) -> Result<i64> {
        if self.missing_tables.contains(table) {
            return Err(MigrateError::Metadata(format!("no such table: {}", table)));
        }
        Ok(*self.row_counts.get(table).unwrap_or(&0))
    }

    fn schema(&self) -> &str {
        "public"
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn column(name: &str, data_type: &str, ordinal: u32) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        data_length: Some(100),
        data_precision: None,
        data_scale: None,
        nullable: true,
        data_default: None,
        ordinal,
    }
}

fn id_column() -> Column {
    Column {
        name: "ID".to_string(),
        data_type: "NUMBER".to_string(),
        data_length: None,
        data_precision: Some(10),
        data_scale: Some(0),
        nullable: false,
        data_default: None,
        ordinal: 1,
    }
}

fn simple_table(name: &str) -> Table {
    Table {
        name: name.to_string(),
        columns: vec![id_column(), column("NAME", "VARCHAR2", 2)],
        primary_key: vec!["ID".to_string()],
        foreign_keys: vec![],
        indexes: vec![],
    }
}

fn row(id: i32, name: &str) -> Vec<SqlValue> {
    vec![SqlValue::I32(id), SqlValue::String(name.to_string())]
}

fn orders_with_fk() -> Table {
    Table {
        name: "ORDERS".to_string(),
        columns: vec![id_column(), column("CUST_ID", "NUMBER", 2)],
        primary_key: vec!["ID".to_string()],
        foreign_keys: vec![ForeignKeyRow {
            constraint: "FK_ORDERS_CUST".to_string(),
            column: "CUST_ID".to_string(),
            ref_owner: "APP".to_string(),
            ref_constraint: "PK_CUSTOMERS".to_string(),
            ref_column: "ID".to_string(),
        }],
        indexes: vec![],
    }
}

fn test_config(yaml_extra: &str) -> Config {
    let yaml = format!(
        r#"
source:
  host: localhost
  service_name: XEPDB1
  username: app
  password: secret
target:
  host: localhost
  database: appdb
  username: app
  password: secret
{}"#,
        yaml_extra
    );
    Config::from_yaml(&yaml).unwrap()
}

// ---------------------------------------------------------------------------
// Schema conversion
// ---------------------------------------------------------------------------

#[test]
fn test_foreign_keys_added_after_all_tables_exist() {
    // ORDERS is listed (and therefore converted) before CUSTOMERS, so
    // its FK target does not exist yet when its CREATE TABLE runs.
    let mut source = FakeSource::default()
        .with_table(orders_with_fk(), vec![])
        .with_table(simple_table("CUSTOMERS"), vec![])
        .with_constraint("PK_CUSTOMERS", "CUSTOMERS");
    let mut target = FakeTarget::default();

    let result = SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(None)
        .unwrap();
    assert_eq!(result.succeeded.len(), 2);
    assert!(result.failed.is_empty());

    let pos = |needle: &str| {
        target
            .commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("missing command: {}", needle))
    };
    let create_orders = pos("CREATE TABLE IF NOT EXISTS \"public\".\"orders\"");
    let create_customers = pos("CREATE TABLE IF NOT EXISTS \"public\".\"customers\"");
    let add_fk = pos("ALTER TABLE \"public\".\"orders\" ADD CONSTRAINT");

    assert!(add_fk > create_orders);
    assert!(add_fk > create_customers);
    assert!(target.commands[add_fk].contains("REFERENCES \"public\".\"customers\" (\"id\")"));
}

#[test]
fn test_table_filter_is_case_insensitive() {
    let mut source = FakeSource::default()
        .with_table(simple_table("CUSTOMERS"), vec![])
        .with_table(simple_table("ORDERS"), vec![]);
    let mut target = FakeTarget::default();

    let filter = vec!["orders".to_string()];
    let result = SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(Some(&filter))
        .unwrap();

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.succeeded[0].name, "ORDERS");
    assert!(!target
        .commands
        .iter()
        .any(|c| c.contains("\"customers\"")));
}

#[test]
fn test_index_names_are_table_prefixed() {
    let mut table = simple_table("USERS");
    table.indexes = vec![
        IndexRow {
            index: "IDX_EMAIL".to_string(),
            column: "NAME".to_string(),
            position: 1,
            unique: true,
        },
        // Oracle's backing index for the primary key.
        IndexRow {
            index: "SYS_C007".to_string(),
            column: "ID".to_string(),
            position: 1,
            unique: true,
        },
    ];
    let mut source = FakeSource::default().with_table(table, vec![]);
    let mut target = FakeTarget::default();

    SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(None)
        .unwrap();

    assert!(target
        .commands
        .iter()
        .any(|c| c.contains("CREATE UNIQUE INDEX IF NOT EXISTS \"users_idx_email\"")));
    // The PK-backing index is covered by the inline PRIMARY KEY clause.
    assert!(!target.commands.iter().any(|c| c.contains("sys_c007")));
}

#[test]
fn test_introspection_failure_skips_table_and_continues() {
    // BROKEN is listed but every metadata query for it errors; the
    // run must mark it failed and still convert the healthy table.
    let mut source = FakeSource::default().with_table(simple_table("GOOD"), vec![]);
    source.tables.insert(0, "BROKEN".to_string());
    let mut target = FakeTarget::default();

    let result = SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(None)
        .unwrap();

    assert_eq!(result.failed, vec!["BROKEN".to_string()]);
    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.succeeded[0].name, "GOOD");
    assert!(target
        .commands
        .iter()
        .any(|c| c.contains("CREATE TABLE IF NOT EXISTS \"public\".\"good\"")));
}

#[test]
fn test_create_table_ddl_is_idempotent() {
    let mut source = FakeSource::default().with_table(simple_table("USERS"), vec![]);
    let mut target = FakeTarget::default();

    SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(None)
        .unwrap();

    assert!(target
        .commands
        .iter()
        .any(|c| c.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"users\"")));
}

#[test]
fn test_unresolved_foreign_key_is_skipped() {
    // No constraint mapping registered, so the FK target cannot be
    // resolved. The table itself must still convert.
    let mut source = FakeSource::default().with_table(orders_with_fk(), vec![]);
    let mut target = FakeTarget::default();

    let result = SchemaConverter::new(&mut source, &mut target)
        .convert_all_tables(None)
        .unwrap();

    assert_eq!(result.succeeded.len(), 1);
    assert!(!target.commands.iter().any(|c| c.contains("FOREIGN KEY")));
}

// ---------------------------------------------------------------------------
// Data transfer
// ---------------------------------------------------------------------------

#[test]
fn test_missing_target_table_fails_before_reading_source() {
    let mut source =
        FakeSource::default().with_table(simple_table("USERS"), vec![row(1, "a")]);
    let mut target = FakeTarget::default();
    target.missing_tables.insert("users".to_string());

    let err = TransferEngine::new(&mut source, &mut target, TransferConfig::default())
        .migrate_table("USERS")
        .unwrap_err();

    assert!(matches!(err, MigrateError::Transfer { .. }));
    assert_eq!(source.read_batches_calls, 0);
    assert_eq!(target.insert_calls, 0);
}

#[test]
fn test_failed_batch_is_isolated() {
    let rows: Vec<_> = (1..=5).map(|i| row(i, "x")).collect();
    let mut source = FakeSource::default().with_table(simple_table("USERS"), rows);
    let mut target = FakeTarget::default();
    target.fail_inserts.insert(2);

    let config = TransferConfig {
        batch_size: 2,
        ..TransferConfig::default()
    };
    let result = TransferEngine::new(&mut source, &mut target, config)
        .migrate_table("USERS")
        .unwrap();

    // Batches of 2, 2, 1; the middle one is lost, the rest land.
    assert_eq!(result.batches, 3);
    assert_eq!(result.failed_batches, 1);
    assert_eq!(result.rows_read, 5);
    assert_eq!(result.rows_written, 3);
    assert_eq!(target.insert_calls, 3);
}

#[test]
fn test_abort_policy_stops_at_first_failed_batch() {
    let rows: Vec<_> = (1..=5).map(|i| row(i, "x")).collect();
    let mut source = FakeSource::default().with_table(simple_table("USERS"), rows);
    let mut target = FakeTarget::default();
    target.fail_inserts.insert(2);

    let config = TransferConfig {
        batch_size: 2,
        on_batch_error: BatchErrorPolicy::Abort,
        ..TransferConfig::default()
    };
    let err = TransferEngine::new(&mut source, &mut target, config)
        .migrate_table("USERS")
        .unwrap_err();

    assert!(matches!(err, MigrateError::Transfer { .. }));
    assert_eq!(target.insert_calls, 2);
}

#[test]
fn test_truncate_runs_before_first_insert() {
    let mut source =
        FakeSource::default().with_table(simple_table("USERS"), vec![row(1, "a")]);
    let mut target = FakeTarget::default();

    let config = TransferConfig {
        truncate: true,
        ..TransferConfig::default()
    };
    TransferEngine::new(&mut source, &mut target, config)
        .migrate_table("USERS")
        .unwrap();

    let truncate = target
        .commands
        .iter()
        .position(|c| c == "TRUNCATE users")
        .unwrap();
    let insert = target
        .commands
        .iter()
        .position(|c| c.starts_with("INSERT users"))
        .unwrap();
    assert!(truncate < insert);
}

#[test]
fn test_empty_source_table_skips_truncate() {
    // Reloading an empty source table must not wipe the target rows.
    let mut source = FakeSource::default().with_table(simple_table("USERS"), vec![]);
    let mut target = FakeTarget::default();
    target.row_counts.insert("users".to_string(), 7);

    let config = TransferConfig {
        truncate: true,
        ..TransferConfig::default()
    };
    let result = TransferEngine::new(&mut source, &mut target, config)
        .migrate_table("USERS")
        .unwrap();

    assert_eq!(result.rows_written, 0);
    assert!(!target.commands.iter().any(|c| c.starts_with("TRUNCATE")));
    assert_eq!(target.row_counts["users"], 7);
}

#[test]
fn test_empty_table_transfers_cleanly() {
    let mut source = FakeSource::default().with_table(simple_table("USERS"), vec![]);
    let mut target = FakeTarget::default();

    let result = TransferEngine::new(&mut source, &mut target, TransferConfig::default())
        .migrate_table("USERS")
        .unwrap();

    assert_eq!(result.batches, 0);
    assert_eq!(result.rows_written, 0);
    assert_eq!(target.insert_calls, 0);
}

#[test]
fn test_table_failure_does_not_stop_the_run() {
    let mut source = FakeSource::default()
        .with_table(simple_table("BROKEN"), vec![row(1, "a")])
        .with_table(simple_table("USERS"), vec![row(1, "a")]);
    let mut target = FakeTarget::default();
    target.missing_tables.insert("broken".to_string());

    let tables = vec!["BROKEN".to_string(), "USERS".to_string()];
    let outcomes = TransferEngine::new(&mut source, &mut target, TransferConfig::default())
        .migrate_all_tables(&tables)
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].1.is_err());
    let users = outcomes[1].1.as_ref().unwrap();
    assert_eq!(users.rows_written, 1);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn test_orchestrator_run_end_to_end() {
    let source = FakeSource::default()
        .with_table(orders_with_fk(), vec![row(1, "o1"), row(2, "o2")])
        .with_table(simple_table("CUSTOMERS"), vec![row(1, "c1")])
        .with_constraint("PK_CUSTOMERS", "CUSTOMERS");
    let target = FakeTarget::default();

    let config = test_config("migration:\n  batch_size: 1\n");
    let mut orchestrator =
        MigrationOrchestrator::with_connectors(config, Box::new(source), Box::new(target));

    let result = orchestrator.run().unwrap();
    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(result.tables.len(), 2);

    let orders = result.tables.iter().find(|t| t.table == "ORDERS").unwrap();
    assert_eq!(orders.status, TableStatus::Success);
    assert_eq!(orders.rows_written, 2);
    assert_eq!(orders.batches, 2);
    assert_eq!(orders.source_rows, Some(2));
    assert_eq!(orders.target_rows, Some(2));
}

#[test]
fn test_orchestrator_reports_partial_on_batch_loss() {
    let source = FakeSource::default()
        .with_table(simple_table("USERS"), (1..=3).map(|i| row(i, "u")).collect());
    let mut target = FakeTarget::default();
    target.fail_inserts.insert(2);

    let config = test_config("migration:\n  batch_size: 1\n");
    let mut orchestrator =
        MigrationOrchestrator::with_connectors(config, Box::new(source), Box::new(target));

    let result = orchestrator.run().unwrap();
    assert_eq!(result.status, TaskStatus::Partial);

    let users = &result.tables[0];
    assert_eq!(users.status, TableStatus::Partial);
    assert_eq!(users.failed_batches, 1);
    assert_eq!(users.rows_written, 2);
}

#[test]
fn test_orchestrator_convert_only_moves_no_data() {
    let source =
        FakeSource::default().with_table(simple_table("USERS"), vec![row(1, "a")]);
    let target = FakeTarget::default();

    let config = test_config("");
    let mut orchestrator =
        MigrationOrchestrator::with_connectors(config, Box::new(source), Box::new(target));

    let result = orchestrator.convert_only().unwrap();
    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(result.tables[0].rows_written, 0);
}

#[test]
fn test_orchestrator_validate_flags_mismatch() {
    let source =
        FakeSource::default().with_table(simple_table("USERS"), vec![row(1, "a"), row(2, "b")]);
    let mut target = FakeTarget::default();
    target.row_counts.insert("users".to_string(), 1);

    let config = test_config("");
    let mut orchestrator =
        MigrationOrchestrator::with_connectors(config, Box::new(source), Box::new(target));

    let validations = orchestrator.validate(&[]).unwrap();
    assert_eq!(validations.len(), 1);
    assert!(!validations[0].matched);
    assert_eq!(validations[0].source_rows, 2);
    assert_eq!(validations[0].target_rows, 1);
}
