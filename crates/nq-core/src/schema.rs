//! Schema types: the metadata catalog and per-selection schema contexts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Catalog (M-Schema): database -> tables -> fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Catalog {
    pub databases: BTreeMap<String, DatabaseMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatabaseMeta {
    #[serde(default)]
    pub db_id: String,

    #[serde(default)]
    pub tables: BTreeMap<String, TableMeta>,

    /// `[from_table, from_column, to_table, to_column]`
    #[serde(default)]
    pub foreign_keys: Vec<[String; 4]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableMeta {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMeta>,

    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldMeta {
    #[serde(rename = "type", default)]
    pub data_type: String,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub examples: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Catalog view handed to the schema-selection prompt: table names only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableListing {
    pub tables: Vec<String>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn contains(&self, database: &str) -> bool {
        self.databases.contains_key(database)
    }

    pub fn database(&self, database: &str) -> Option<&DatabaseMeta> {
        self.databases.get(database)
    }

    /// Database -> table names, scoped to `only` when it names a known database.
    pub fn table_listing(&self, only: Option<&str>) -> BTreeMap<String, TableListing> {
        let listing = |meta: &DatabaseMeta| TableListing {
            tables: meta.tables.keys().cloned().collect(),
        };

        match only.and_then(|db| self.databases.get_key_value(db)) {
            Some((name, meta)) => BTreeMap::from([(name.clone(), listing(meta))]),
            None => self
                .databases
                .iter()
                .map(|(name, meta)| (name.clone(), listing(meta)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaContext: one per schema-selection invocation, never mutated
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaContext {
    pub context_id: String,
    pub database: String,
    /// Full DDL for `database`.
    pub detailed_schema: String,
    pub selected_tables: Option<Vec<String>>,
    /// Why these tables were chosen.
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
