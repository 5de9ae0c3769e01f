//! SQL rendering for the supported backends.

use crate::schema::{ColumnKind, ColumnType, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier, doubling any embedded quote character
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    pub fn column_type(&self, column_type: ColumnType) -> String {
        column_type.to_string()
    }

    fn column_definition(&self, name: &str, kind: ColumnKind) -> String {
        let name = self.quote(name);
        match (self, kind) {
            (Dialect::MySql, ColumnKind::PrimaryKey) => {
                format!("{} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY", name)
            }
            (Dialect::Sqlite, ColumnKind::PrimaryKey) => {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name)
            }
            (_, ColumnKind::RootReference) => format!("{} BIGINT NULL", name),
            (_, ColumnKind::Data(column_type)) => {
                format!("{} {} NULL", name, self.column_type(column_type))
            }
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for a planned table
    pub fn create_table(&self, table: &TableSchema) -> String {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(&c.name, c.kind))
            .collect();

        let suffix = match self {
            Dialect::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            Dialect::Sqlite => "",
        };

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}){}",
            self.quote(&table.name),
            columns.join(", "),
            suffix
        )
    }

    /// Name of the foreign key constraint from `table` to the root table
    pub fn constraint_name(&self, table: &str, root_table: &str) -> String {
        format!("fk_{}_{}", table, root_table)
    }

    pub fn add_foreign_key(
        &self,
        table: &str,
        reference_column: &str,
        root_table: &str,
        primary_key: &str,
    ) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE CASCADE",
            self.quote(table),
            self.quote(&self.constraint_name(table, root_table)),
            self.quote(reference_column),
            self.quote(root_table),
            self.quote(primary_key),
        )
    }

    /// Parameterized insert for the given columns, using `?` placeholders.
    /// An empty column list inserts a row of defaults.
    pub fn insert<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> String {
        let table = self.quote(table);
        if columns.is_empty() {
            return match self {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", table),
                Dialect::Sqlite => format!("INSERT INTO {} DEFAULT VALUES", table),
            };
        }

        let names: Vec<String> = columns.iter().map(|c| self.quote(c.as_ref())).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!("INSERT INTO {} ({}) VALUES ({})", table, names.join(", "), placeholders)
    }

    pub fn begin(&self) -> &'static str {
        match self {
            Dialect::MySql => "START TRANSACTION",
            Dialect::Sqlite => "BEGIN",
        }
    }

    pub fn savepoint(&self, name: &str) -> String {
        format!("SAVEPOINT {}", self.quote(name))
    }

    pub fn rollback_to(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", self.quote(name))
    }

    pub fn release(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {}", self.quote(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;

    fn details() -> TableSchema {
        TableSchema {
            name: "details".to_string(),
            is_root: false,
            columns: vec![
                ColumnSpec { name: "id".into(), kind: ColumnKind::PrimaryKey },
                ColumnSpec { name: "property_id".into(), kind: ColumnKind::RootReference },
                ColumnSpec { name: "beds".into(), kind: ColumnKind::Data(ColumnType::BigInt) },
                ColumnSpec { name: "view".into(), kind: ColumnKind::Data(ColumnType::VarChar(40)) },
            ],
        }
    }

    #[test]
    fn test_mysql_create_table() {
        assert_eq!(
            Dialect::MySql.create_table(&details()),
            "CREATE TABLE IF NOT EXISTS `details` \
             (`id` BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY, \
             `property_id` BIGINT NULL, `beds` BIGINT NULL, `view` VARCHAR(40) NULL) \
             ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }

    #[test]
    fn test_sqlite_create_table() {
        assert_eq!(
            Dialect::Sqlite.create_table(&details()),
            "CREATE TABLE IF NOT EXISTS \"details\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"property_id\" BIGINT NULL, \"beds\" BIGINT NULL, \"view\" VARCHAR(40) NULL)"
        );
    }

    #[test]
    fn test_foreign_key_statement() {
        assert_eq!(
            Dialect::MySql.add_foreign_key("amenities", "property_id", "property", "id"),
            "ALTER TABLE `amenities` ADD CONSTRAINT `fk_amenities_property` \
             FOREIGN KEY (`property_id`) REFERENCES `property`(`id`) ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_insert_statements() {
        assert_eq!(
            Dialect::MySql.insert("amenities", &["name", "property_id"]),
            "INSERT INTO `amenities` (`name`, `property_id`) VALUES (?, ?)"
        );
        let none: [&str; 0] = [];
        assert_eq!(
            Dialect::MySql.insert("property", &none),
            "INSERT INTO `property` () VALUES ()"
        );
        assert_eq!(
            Dialect::Sqlite.insert("property", &none),
            "INSERT INTO \"property\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_identifiers_are_escaped() {
        assert_eq!(Dialect::MySql.quote("we`ird"), "`we``ird`");
        assert_eq!(Dialect::Sqlite.quote("we\"ird"), "\"we\"\"ird\"");
    }
}
