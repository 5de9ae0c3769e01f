//! Routing rules derived from the field mapping
//!
//! A [`ShredPlan`] is computed once per run from the table map. For every
//! record, [`route`] decides how a table-named key is broken into rows.

use crate::error::IngotError;
use crate::types::{LoadConfig, TableMap};
use serde_json::{Map, Value};

/// How the value under a table-named key is turned into rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Route<'a> {
    /// Key missing or null: no rows
    Absent,
    /// Array: one row per object element
    List(&'a [Value]),
    /// Nested object: one row if the projection is non-empty
    Object(&'a Map<String, Value>),
    /// Any other scalar: project the top-level record instead
    Fallback,
}

/// Decide the route for `table` in `record`
pub fn route<'a>(record: &'a Map<String, Value>, table: &str) -> Route<'a> {
    match record.get(table) {
        None | Some(Value::Null) => Route::Absent,
        Some(Value::Array(items)) => Route::List(items),
        Some(Value::Object(obj)) => Route::Object(obj),
        Some(Value::Bool(_) | Value::Number(_) | Value::String(_)) => Route::Fallback,
    }
}

/// Columns projected for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    pub table: String,
    pub columns: Vec<String>,
}

/// Pre-computed shredding plan: the root table plus every child table in
/// mapping order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShredPlan {
    pub root: TablePlan,
    pub children: Vec<TablePlan>,
    pub reference_column: String,
}

impl ShredPlan {
    /// Build a plan, failing if the root table is not mapped
    pub fn new(table_map: &TableMap, config: &LoadConfig) -> Result<Self, IngotError> {
        let root_columns = table_map
            .columns(&config.root_table)
            .ok_or_else(|| IngotError::MissingRootTable(config.root_table.clone()))?;

        let children = table_map
            .iter()
            .filter(|t| t.name != config.root_table)
            .map(|t| TablePlan {
                table: t.name.clone(),
                columns: t.columns.clone(),
            })
            .collect();

        Ok(ShredPlan {
            root: TablePlan {
                table: config.root_table.clone(),
                columns: root_columns.to_vec(),
            },
            children,
            reference_column: config.reference_column(),
        })
    }

    pub fn child(&self, table: &str) -> Option<&TablePlan> {
        self.children.iter().find(|c| c.table == table)
    }
}
