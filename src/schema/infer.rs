//! Column type inference from sampled values.
//!
//! Inference is advisory. Falling back to TEXT is always safe, so each
//! category only wins when every non-null sample agrees with it.

use crate::error::InferenceError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Storage category for a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    /// Unbounded text
    Text,
    /// 64-bit signed integer
    BigInt,
    /// Double precision float
    Double,
    /// Bounded string with declared max length
    VarChar(usize),
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Double => write!(f, "DOUBLE"),
            ColumnType::VarChar(len) => write!(f, "VARCHAR({})", len),
        }
    }
}

/// Bounds applied to inferred string columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarCharBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for VarCharBounds {
    fn default() -> Self {
        VarCharBounds { min: 32, max: 255 }
    }
}

/// Infer a column type, falling back to TEXT on any malformed sample
pub fn infer_column_type<'a, I>(column: &str, samples: I, bounds: VarCharBounds) -> ColumnType
where
    I: IntoIterator<Item = &'a Value>,
{
    match try_infer_column_type(column, samples, bounds) {
        Ok(column_type) => column_type,
        Err(err) => {
            tracing::debug!(error = %err, "type inference failed; using TEXT");
            ColumnType::Text
        }
    }
}

/// Infer a column type, rejecting nested arrays or objects in the sample
pub fn try_infer_column_type<'a, I>(
    column: &str,
    samples: I,
    bounds: VarCharBounds,
) -> Result<ColumnType, InferenceError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut present = Vec::new();
    for value in samples {
        match value {
            Value::Null => {}
            Value::Array(_) | Value::Object(_) => {
                return Err(InferenceError {
                    column: column.to_string(),
                    value: value.to_string(),
                });
            }
            _ => present.push(value),
        }
    }

    if present.is_empty() {
        return Ok(ColumnType::Text);
    }

    if present.iter().all(|v| v.as_i64().is_some()) {
        return Ok(ColumnType::BigInt);
    }

    if present.iter().all(|v| v.is_number()) {
        return Ok(ColumnType::Double);
    }

    let max_len = present.iter().map(|v| rendered_len(v)).max().unwrap_or(0);
    if max_len <= bounds.max {
        Ok(ColumnType::VarChar(max_len.clamp(bounds.min, bounds.max)))
    } else {
        Ok(ColumnType::Text)
    }
}

/// Length in characters of the value as it would be stored in a string column
fn rendered_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}
