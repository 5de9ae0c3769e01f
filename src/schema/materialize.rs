//! Create the planned tables and wire foreign keys.

use crate::db::Session;
use crate::error::DbError;
use crate::schema::builder::SchemaPlan;
use std::collections::HashSet;

/// Which planned tables exist and can receive rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializedSchema {
    pub usable: Vec<String>,
    pub failed: Vec<String>,
    pub constraints_added: usize,
    pub constraints_skipped: usize,
}

impl MaterializedSchema {
    pub fn is_usable(&self, table: &str) -> bool {
        self.usable.iter().any(|t| t == table)
    }

    pub fn usable_set(&self) -> HashSet<String> {
        self.usable.iter().cloned().collect()
    }
}

/// Create every table in plan order, then try to add FK constraints.
///
/// Table failures are logged and skipped; constraint failures are expected
/// (already present, or unsupported by the engine) and only logged at debug.
/// A connection-class error aborts.
pub fn materialize_schema<S>(
    session: &mut S,
    plan: &SchemaPlan,
) -> Result<MaterializedSchema, DbError>
where
    S: Session + ?Sized,
{
    let dialect = session.dialect();
    let mut result = MaterializedSchema::default();

    for table in &plan.tables {
        let sql = dialect.create_table(table);
        match session.execute(&sql) {
            Ok(()) => {
                tracing::debug!(table = %table.name, columns = table.columns.len(), "table ready");
                result.usable.push(table.name.clone());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(table = %table.name, error = %e, "failed to create table; skipping");
                result.failed.push(table.name.clone());
            }
        }
    }

    if !result.is_usable(&plan.root_table) {
        return Ok(result);
    }

    for table in &plan.tables {
        if table.is_root || !result.is_usable(&table.name) {
            continue;
        }
        let Some(reference_column) = table.reference_column() else {
            continue;
        };

        let sql = dialect.add_foreign_key(
            &table.name,
            reference_column,
            &plan.root_table,
            &plan.primary_key,
        );
        match session.execute(&sql) {
            Ok(()) => {
                tracing::debug!(table = %table.name, "foreign key constraint added");
                result.constraints_added += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!(
                    table = %table.name,
                    error = %e,
                    "foreign key constraint not added"
                );
                result.constraints_skipped += 1;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Dialect, SqlValue, SqliteSession};
    use crate::schema::SchemaBuilder;
    use crate::types::{LoadConfig, TableMap};

    /// Session that records statements and fails any containing a marker
    #[derive(Default)]
    struct ScriptedSession {
        statements: Vec<String>,
        fail_on: Vec<&'static str>,
        connection_lost: bool,
    }

    impl Session for ScriptedSession {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        fn execute(&mut self, sql: &str) -> Result<(), DbError> {
            self.statements.push(sql.to_string());
            if self.fail_on.iter().any(|m| sql.contains(m)) {
                if self.connection_lost {
                    return Err(DbError::connection("server has gone away"));
                }
                return Err(DbError::statement("rejected"));
            }
            Ok(())
        }

        fn insert(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<i64, DbError> {
            Ok(1)
        }
    }

    fn plan() -> SchemaPlan {
        let map = TableMap::from_pairs([
            ("name", "amenities"),
            ("city", "property"),
            ("beds", "details"),
        ]);
        SchemaBuilder::new(LoadConfig::default()).build(&map)
    }

    #[test]
    fn test_root_created_before_children_and_fks_after_tables() {
        let mut session = ScriptedSession::default();
        let result = materialize_schema(&mut session, &plan()).unwrap();

        assert_eq!(result.usable, vec!["property", "amenities", "details"]);
        assert_eq!(result.constraints_added, 2);
        assert!(session.statements[0].starts_with("CREATE TABLE IF NOT EXISTS `property`"));
        assert!(session.statements[1].contains("`amenities`"));
        assert!(session.statements[3].starts_with("ALTER TABLE `amenities`"));
        assert!(session.statements[4].starts_with("ALTER TABLE `details`"));
    }

    #[test]
    fn test_failed_table_is_skipped() {
        let mut session = ScriptedSession {
            fail_on: vec!["CREATE TABLE IF NOT EXISTS `details`"],
            ..Default::default()
        };
        let result = materialize_schema(&mut session, &plan()).unwrap();

        assert_eq!(result.usable, vec!["property", "amenities"]);
        assert_eq!(result.failed, vec!["details"]);
        assert!(!session.statements.iter().any(|s| s.starts_with("ALTER TABLE `details`")));
    }

    #[test]
    fn test_constraint_failures_are_swallowed() {
        let mut session = ScriptedSession {
            fail_on: vec!["ADD CONSTRAINT"],
            ..Default::default()
        };
        let result = materialize_schema(&mut session, &plan()).unwrap();

        assert_eq!(result.usable.len(), 3);
        assert_eq!(result.constraints_added, 0);
        assert_eq!(result.constraints_skipped, 2);
    }

    #[test]
    fn test_lost_connection_during_create_aborts() {
        let mut session = ScriptedSession {
            fail_on: vec!["CREATE TABLE IF NOT EXISTS `amenities`"],
            connection_lost: true,
            ..Default::default()
        };
        let err = materialize_schema(&mut session, &plan()).unwrap_err();

        assert!(err.is_fatal());
        // nothing after the failing statement is attempted
        assert_eq!(session.statements.len(), 2);
    }

    #[test]
    fn test_lost_connection_during_constraints_aborts() {
        let mut session = ScriptedSession {
            fail_on: vec!["ADD CONSTRAINT"],
            connection_lost: true,
            ..Default::default()
        };
        let err = materialize_schema(&mut session, &plan()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.statements.len(), 4);
    }

    #[test]
    fn test_materializing_twice_is_idempotent_on_sqlite() {
        let mut session = SqliteSession::in_memory().unwrap();
        let plan = plan();

        let first = materialize_schema(&mut session, &plan).unwrap();
        let second = materialize_schema(&mut session, &plan).unwrap();
        assert_eq!(first.usable, second.usable);
        assert!(second.failed.is_empty());

        let tables: i64 = session
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('property', 'amenities', 'details')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
