//! Melting records into rows
//!
//! Each decoded JSON line is split into one root row plus child rows for
//! the other mapped tables, then written inside a single transaction.
//!
//! - [`plan`]: routing rules computed once from the table map
//! - [`shredder`]: per-record fan-out into rows
//! - [`writer`]: inserts, root key binding and commit per record

pub mod plan;
pub mod shredder;
pub mod writer;

pub use plan::{route, Route, ShredPlan, TablePlan};
pub use shredder::{project, RecordShredder};
pub use writer::{RecordOutcome, RowWriter};
