use crate::melt::plan::{route, Route, ShredPlan, TablePlan};
use crate::types::{Row, ShreddedRecord};
use serde_json::{Map, Value};

/// Splits one decoded record into a root row and child rows
#[derive(Debug, Clone)]
pub struct RecordShredder {
    plan: ShredPlan,
}

impl RecordShredder {
    pub fn new(plan: ShredPlan) -> Self {
        RecordShredder { plan }
    }

    pub fn plan(&self) -> &ShredPlan {
        &self.plan
    }

    /// Shred a record into rows, root row first.
    ///
    /// Child rows do not carry the root key yet; the writer binds it once the
    /// root row has been inserted.
    pub fn shred(&self, record: &Map<String, Value>) -> ShreddedRecord {
        let root = Row::new(self.plan.root.table.clone(), project(record, &self.plan.root.columns));

        let mut children = Vec::new();
        for child in &self.plan.children {
            self.shred_child(record, child, &mut children);
        }

        ShreddedRecord { root, children }
    }

    fn shred_child(&self, record: &Map<String, Value>, child: &TablePlan, rows: &mut Vec<Row>) {
        match route(record, &child.table) {
            Route::Absent => {}
            Route::List(items) => {
                // one row per object element, even when nothing projects
                for item in items {
                    if let Value::Object(obj) = item {
                        rows.push(Row::new(child.table.clone(), project(obj, &child.columns)));
                    }
                }
            }
            Route::Object(obj) => {
                let values = project(obj, &child.columns);
                if !values.is_empty() {
                    rows.push(Row::new(child.table.clone(), values));
                }
            }
            Route::Fallback => {
                let values = project(record, &child.columns);
                if !values.is_empty() {
                    rows.push(Row::new(child.table.clone(), values));
                }
            }
        }
    }
}

/// Scalar-only projection of `source` onto `columns`, in column order.
/// Keys holding an object or array are left out.
pub fn project(source: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for column in columns {
        match source.get(column) {
            None | Some(Value::Array(_)) | Some(Value::Object(_)) => {}
            Some(value) => {
                out.insert(column.clone(), value.clone());
            }
        }
    }
    out
}
