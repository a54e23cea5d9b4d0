//! Schema and metadata descriptor types.
//!
//! Descriptors are derived freshly from source metadata on each run and
//! discarded when the run completes; nothing here is cached.

use serde::{Deserialize, Serialize};

/// Table metadata, assembled from the individual introspection queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in source ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Foreign key rows (one per participating column), as returned by
    /// the source dictionary.
    pub foreign_keys: Vec<ForeignKeyRow>,

    /// Index rows (one per participating column).
    pub indexes: Vec<IndexRow>,
}

impl Table {
    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Source data type name (e.g. "NUMBER", "VARCHAR2", "TIMESTAMP(6)").
    pub data_type: String,

    /// Maximum length for character types.
    pub data_length: Option<u32>,

    /// Numeric precision.
    pub data_precision: Option<u32>,

    /// Numeric scale (also fractional-seconds precision for timestamps).
    pub data_scale: Option<i32>,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Raw default expression, if any.
    pub data_default: Option<String>,

    /// Ordinal position (1-based), preserved end to end.
    pub ordinal: u32,
}

/// One foreign key dictionary row: one per column participating in a
/// constraint. The referenced table is not named directly; it is
/// resolved later through the referenced constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRow {
    /// Constraint name.
    pub constraint: String,

    /// Referencing (local) column name.
    pub column: String,

    /// Owner of the referenced constraint.
    pub ref_owner: String,

    /// Name of the referenced constraint.
    pub ref_constraint: String,

    /// Referenced column name.
    pub ref_column: String,
}

/// An assembled foreign key: grouped rows with the referenced table
/// resolved. Local and referenced column lists have equal length and
/// matching order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Source constraint name.
    pub name: String,

    /// Local column names, in constraint order.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names, in constraint order.
    pub ref_columns: Vec<String>,
}

/// One index dictionary row: one per column participating in an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRow {
    /// Index name.
    pub index: String,

    /// Column name.
    pub column: String,

    /// Column position within the index (1-based).
    pub position: u32,

    /// Whether the index is unique.
    pub unique: bool,
}

/// An assembled index: grouped rows with columns in position order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Source index name.
    pub name: String,

    /// Indexed column names in position order.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub unique: bool,
}
