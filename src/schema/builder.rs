//! Schema planning with a streaming sample accumulator.
//!
//! Sampled rows are fed one at a time into [`SchemaBuilder`], which only keeps
//! the values per (table, column). The typed plan is built once at the end.
//! Nothing here touches the database; see `materialize` for that.

use crate::schema::infer::{infer_column_type, ColumnType, VarCharBounds};
use crate::types::{LoadConfig, Row, ShreddedRecord, TableMap};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Role of a column in a planned table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    /// Synthetic auto-increment key
    PrimaryKey,
    /// Nullable key pointing at the root table
    RootReference,
    /// A mapped source column with its inferred type
    Data(ColumnType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Planned definition of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub is_root: bool,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name of the root reference column, if this table has one
    pub fn reference_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.kind == ColumnKind::RootReference)
            .map(|c| c.name.as_str())
    }
}

/// Validated, ordered description of every table to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaPlan {
    pub root_table: String,
    pub primary_key: String,
    /// Tables in creation order; the root table, when mapped, comes first
    pub tables: Vec<TableSchema>,
}

impl SchemaPlan {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn root(&self) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.is_root)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Accumulates sampled column values and builds a [`SchemaPlan`]
#[derive(Debug)]
pub struct SchemaBuilder {
    config: LoadConfig,
    samples: HashMap<String, HashMap<String, Vec<Value>>>,
    rows_seen: usize,
}

impl SchemaBuilder {
    pub fn new(config: LoadConfig) -> Self {
        SchemaBuilder {
            config,
            samples: HashMap::new(),
            rows_seen: 0,
        }
    }

    /// Record every column value of one row as a sample
    pub fn add_row(&mut self, row: &Row) {
        self.rows_seen += 1;
        let table = self.samples.entry(row.table.clone()).or_default();
        for (column, value) in row.values.iter() {
            table.entry(column.clone()).or_default().push(value.clone());
        }
    }

    /// Record all rows shredded from one sample record
    pub fn add_record(&mut self, record: &ShreddedRecord) {
        for row in record.rows() {
            self.add_row(row);
        }
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Build the typed plan for `table_map`.
    ///
    /// The root table goes first regardless of where it sits in the mapping;
    /// all other tables keep mapping order.
    pub fn build(&self, table_map: &TableMap) -> SchemaPlan {
        let bounds = VarCharBounds {
            min: self.config.varchar_min,
            max: self.config.varchar_max,
        };
        let reference_column = self.config.reference_column();

        let mut order: Vec<&str> = Vec::with_capacity(table_map.len());
        if table_map.contains(&self.config.root_table) {
            order.push(&self.config.root_table);
        }
        order.extend(
            table_map
                .iter()
                .map(|t| t.name.as_str())
                .filter(|name| *name != self.config.root_table),
        );

        let tables = order
            .into_iter()
            .map(|name| {
                let is_root = name == self.config.root_table;
                let mut columns = vec![ColumnSpec {
                    name: self.config.primary_key.clone(),
                    kind: ColumnKind::PrimaryKey,
                }];

                if !is_root {
                    columns.push(ColumnSpec {
                        name: reference_column.clone(),
                        kind: ColumnKind::RootReference,
                    });
                }

                let sampled = self.samples.get(name);
                for column in table_map.columns(name).unwrap_or_default() {
                    if self.config.is_reserved(column) {
                        continue;
                    }
                    let column_type = match sampled.and_then(|s| s.get(column)) {
                        Some(values) => infer_column_type(column, values, bounds),
                        None => ColumnType::Text,
                    };
                    columns.push(ColumnSpec {
                        name: column.clone(),
                        kind: ColumnKind::Data(column_type),
                    });
                }

                TableSchema {
                    name: name.to_string(),
                    is_root,
                    columns,
                }
            })
            .collect();

        SchemaPlan {
            root_table: self.config.root_table.clone(),
            primary_key: self.config.primary_key.clone(),
            tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn row(table: &str, value: Value) -> Row {
        let values: Map<String, Value> = serde_json::from_value(value).unwrap();
        Row::new(table, values)
    }

    #[test]
    fn test_root_table_is_planned_first() {
        let map = TableMap::from_pairs([
            ("name", "amenities"),
            ("beds", "details"),
            ("city", "property"),
        ]);
        let plan = SchemaBuilder::new(LoadConfig::default()).build(&map);

        assert_eq!(plan.table_names(), vec!["property", "amenities", "details"]);
        assert!(plan.tables[0].is_root);
    }

    #[test]
    fn test_columns_are_key_reference_then_mapping_order() {
        let map = TableMap::from_pairs([
            ("beds", "details"),
            ("baths", "details"),
            ("city", "property"),
        ]);
        let plan = SchemaBuilder::new(LoadConfig::default()).build(&map);

        let details = plan.table("details").unwrap();
        let names: Vec<&str> = details.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "property_id", "beds", "baths"]);
        assert_eq!(details.reference_column(), Some("property_id"));

        let root = plan.root().unwrap();
        let names: Vec<&str> = root.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "city"]);
        assert_eq!(root.reference_column(), None);
    }

    #[test]
    fn test_sampled_columns_get_inferred_types() {
        let map = TableMap::from_pairs([
            ("price", "property"),
            ("city", "property"),
            ("notes", "property"),
            ("beds", "details"),
        ]);
        let mut builder = SchemaBuilder::new(LoadConfig::default());
        builder.add_row(&row("property", json!({"price": 250000.5, "city": "Austin"})));
        builder.add_row(&row("property", json!({"price": 199000, "city": null})));
        builder.add_row(&row("details", json!({"beds": 3})));

        let plan = builder.build(&map);
        let root = plan.root().unwrap();
        assert_eq!(root.column("price").unwrap().kind, ColumnKind::Data(ColumnType::Double));
        assert_eq!(root.column("city").unwrap().kind, ColumnKind::Data(ColumnType::VarChar(32)));
        // never sampled
        assert_eq!(root.column("notes").unwrap().kind, ColumnKind::Data(ColumnType::Text));

        let details = plan.table("details").unwrap();
        assert_eq!(details.column("beds").unwrap().kind, ColumnKind::Data(ColumnType::BigInt));
        assert_eq!(builder.rows_seen(), 3);
    }

    #[test]
    fn test_same_column_name_is_typed_per_table() {
        let map = TableMap::from_pairs([("name", "property"), ("name", "amenities")]);
        let mut builder = SchemaBuilder::new(LoadConfig::default());
        builder.add_row(&row("property", json!({"name": 7})));
        builder.add_row(&row("amenities", json!({"name": "pool"})));

        let plan = builder.build(&map);
        assert_eq!(
            plan.table("property").unwrap().column("name").unwrap().kind,
            ColumnKind::Data(ColumnType::BigInt)
        );
        assert_eq!(
            plan.table("amenities").unwrap().column("name").unwrap().kind,
            ColumnKind::Data(ColumnType::VarChar(32))
        );
    }

    #[test]
    fn test_plan_serializes_for_debug_logging() {
        let map = TableMap::from_pairs([("city", "property"), ("name", "amenities")]);
        let mut builder = SchemaBuilder::new(LoadConfig::default());
        builder.add_row(&row("amenities", json!({"name": "pool"})));

        let json = serde_json::to_value(builder.build(&map)).unwrap();
        assert_eq!(json["root_table"], "property");
        assert_eq!(json["tables"][0]["columns"][0]["kind"], "PrimaryKey");
        assert_eq!(json["tables"][1]["columns"][1]["kind"], "RootReference");
        assert_eq!(json["tables"][1]["columns"][2]["kind"], json!({"Data": {"VarChar": 32}}));
    }

    #[test]
    fn test_plan_without_root_table_keeps_mapping_order() {
        let map = TableMap::from_pairs([("beds", "details"), ("name", "amenities")]);
        let plan = SchemaBuilder::new(LoadConfig::default()).build(&map);

        assert_eq!(plan.table_names(), vec!["details", "amenities"]);
        assert!(plan.root().is_none());
    }
}
