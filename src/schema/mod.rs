//! Relational schema synthesis
//!
//! Type inference over sampled values, a pure planning stage that produces a
//! typed [`SchemaPlan`], and materialization of that plan through a session.

pub mod builder;
pub mod infer;
pub mod materialize;

pub use builder::{ColumnKind, ColumnSpec, SchemaBuilder, SchemaPlan, TableSchema};
pub use infer::{infer_column_type, try_infer_column_type, ColumnType, VarCharBounds};
pub use materialize::{materialize_schema, MaterializedSchema};
