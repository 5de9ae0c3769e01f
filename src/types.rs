use serde_json::{Map, Value};

/// One target table from the field mapping with its columns in mapping order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub name: String,
    pub columns: Vec<String>,
}

/// Ordered mapping from target table name to its ordered column list
///
/// Table order is the order in which each table first appeared in the field
/// mapping; column order within a table is mapping order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMap {
    tables: Vec<TableColumns>,
}

impl TableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table map from (column, table) pairs, as the loader does
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = TableMap::new();
        for (column, table) in pairs {
            map.push(table, column);
        }
        map
    }

    /// Append `column` to `table`, creating the table entry on first sight.
    ///
    /// Returns false when the column was already mapped to that table.
    pub fn push(&mut self, table: &str, column: &str) -> bool {
        let entry = match self.tables.iter().position(|t| t.name == table) {
            Some(idx) => &mut self.tables[idx],
            None => {
                self.tables.push(TableColumns {
                    name: table.to_string(),
                    columns: Vec::new(),
                });
                let last = self.tables.len() - 1;
                &mut self.tables[last]
            }
        };

        if entry.columns.iter().any(|c| c == column) {
            return false;
        }
        entry.columns.push(column.to_string());
        true
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.as_slice())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableColumns> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// A row bound for one table - column name to scalar JSON value
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Target table name
    pub table: String,

    /// Column values in mapping order
    pub values: Map<String, Value>,
}

impl Row {
    pub fn new(table: impl Into<String>, values: Map<String, Value>) -> Self {
        Row {
            table: table.into(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attach the generated root key under the reference column
    pub fn bind_root(&mut self, reference_column: &str, root_id: i64) {
        self.values
            .insert(reference_column.to_string(), Value::from(root_id));
    }
}

/// All rows produced from one source record, root row first
#[derive(Debug, Clone, PartialEq)]
pub struct ShreddedRecord {
    pub root: Row,
    pub children: Vec<Row>,
}

impl ShreddedRecord {
    /// Iterate root row then children, in insertion order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    pub fn children_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Row> {
        self.children.iter().filter(move |r| r.table == table)
    }
}

/// Configuration for a load run
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// The parent table every other table references
    pub root_table: String,

    /// Name of the synthetic auto-increment key on every table
    pub primary_key: String,

    /// Number of leading input lines considered for type inference
    pub sample_lines: usize,

    /// Narrowest bounded string column ever declared
    pub varchar_min: usize,

    /// Widest bounded string column; longer samples fall back to TEXT
    pub varchar_max: usize,
}

impl LoadConfig {
    /// Column on child tables holding the root row's generated key
    pub fn reference_column(&self) -> String {
        format!("{}_{}", self.root_table, self.primary_key)
    }

    pub fn with_root_table(mut self, root_table: impl Into<String>) -> Self {
        self.root_table = root_table.into();
        self
    }

    /// Whether `column` collides with a synthetic column
    pub fn is_reserved(&self, column: &str) -> bool {
        column == self.primary_key || column == self.reference_column()
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            root_table: String::from("property"),
            primary_key: String::from("id"),
            sample_lines: 201,
            varchar_min: 32,
            varchar_max: 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_map_preserves_order_and_dedupes() {
        let map = TableMap::from_pairs([
            ("beds", "details"),
            ("city", "property"),
            ("baths", "details"),
            ("beds", "details"),
        ]);

        assert_eq!(map.table_names(), vec!["details", "property"]);
        assert_eq!(map.columns("details").unwrap(), ["beds", "baths"]);
        assert!(map.columns("amenities").is_none());
    }

    #[test]
    fn test_reference_column_follows_root_table() {
        let config = LoadConfig::default();
        assert_eq!(config.reference_column(), "property_id");
        assert!(config.is_reserved("id"));
        assert!(config.is_reserved("property_id"));
        assert!(!config.is_reserved("listing_id"));

        let config = LoadConfig::default().with_root_table("listing");
        assert_eq!(config.reference_column(), "listing_id");
    }

    #[test]
    fn test_bind_root_sets_reference_value() {
        let mut row = Row::new("amenities", Map::new());
        row.bind_root("property_id", 42);
        assert_eq!(row.values.get("property_id"), Some(&json!(42)));
    }
}
