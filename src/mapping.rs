//! Field mapping loader.
//!
//! Reads the tabular field config (one row per source column, naming the
//! table it belongs to) and turns it into a [`TableMap`]. Spreadsheets
//! (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`) are read from their first
//! sheet; `.tsv` is tab-delimited; anything else is read as CSV.

use crate::error::MappingError;
use crate::types::{LoadConfig, TableMap};
use calamine::{Data, Range, Reader};
use std::io::Read;
use std::path::Path;

/// One (column name, target table) pair from the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub column: String,
    pub table: String,
}

/// Positions of the two logical columns inside the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderPositions {
    column: usize,
    table: usize,
}

/// Read a field mapping file, picking the format from its extension
pub fn read_field_mapping(path: &Path) -> Result<Vec<FieldMapping>, MappingError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path),
        "tsv" => read_delimited(path, b'\t'),
        _ => read_delimited(path, b','),
    }
}

/// Read a comma-separated field mapping from any reader
pub fn read_field_mapping_from<R: Read>(
    reader: R,
    label: &Path,
) -> Result<Vec<FieldMapping>, MappingError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    read_from_csv(reader, label)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<FieldMapping>, MappingError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|source| MappingError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    read_from_csv(reader, path)
}

fn read_from_csv<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> Result<Vec<FieldMapping>, MappingError> {
    let read_error = |source| MappingError::Read {
        path: path.to_path_buf(),
        source,
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(read_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let rows = reader.records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect::<Vec<_>>())
            .map_err(read_error)
    });

    collect_mappings(headers, rows, path)
}

fn read_workbook(path: &Path) -> Result<Vec<FieldMapping>, MappingError> {
    let workbook_error = |source| MappingError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = calamine::open_workbook_auto(path).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MappingError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?
        .map_err(workbook_error)?;

    read_field_mapping_from_range(&range, path)
}

/// Read a field mapping from a worksheet range whose first row holds the
/// headers
pub fn read_field_mapping_from_range(
    range: &Range<Data>,
    label: &Path,
) -> Result<Vec<FieldMapping>, MappingError> {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default();

    let rows = rows.map(|row| Ok(row.iter().map(cell_text).collect::<Vec<_>>()));
    collect_mappings(headers, rows, label)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Locate the logical columns in `headers` and collect every complete row
fn collect_mappings<I>(
    headers: Vec<String>,
    rows: I,
    path: &Path,
) -> Result<Vec<FieldMapping>, MappingError>
where
    I: IntoIterator<Item = Result<Vec<String>, MappingError>>,
{
    let headers: Vec<String> = headers
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let positions = locate_headers(&headers).ok_or_else(|| MappingError::MissingColumns {
        path: path.to_path_buf(),
        found: headers.clone(),
    })?;

    let mut mappings = Vec::new();
    for row in rows {
        let row = row?;
        let cell = |idx: usize| row.get(idx).map(|c| c.trim()).unwrap_or("");

        let column = cell(positions.column);
        let table = cell(positions.table);
        if column.is_empty() || table.is_empty() {
            tracing::debug!(column, table, "skipping incomplete field mapping row");
            continue;
        }

        mappings.push(FieldMapping {
            column: column.to_string(),
            table: table.to_string(),
        });
    }

    Ok(mappings)
}

/// Match headers case-insensitively against the two logical columns.
/// Later matches win over earlier ones.
fn locate_headers(headers: &[String]) -> Option<HeaderPositions> {
    let mut column = None;
    let mut table = None;

    for (idx, header) in headers.iter().enumerate() {
        let lc = header.to_lowercase();
        if lc.contains("column") && lc.contains("name") {
            column = Some(idx);
        }
        if lc.contains("target") && lc.contains("table") {
            table = Some(idx);
        }
        if matches!(lc.as_str(), "column name" | "column_name") {
            column = Some(idx);
        }
        if matches!(lc.as_str(), "target table" | "target_table" | "target") {
            table = Some(idx);
        }
    }

    Some(HeaderPositions {
        column: column?,
        table: table?,
    })
}

/// Group mappings by target table, dropping duplicates and columns that
/// collide with the synthetic key or reference column.
pub fn build_table_map(mappings: &[FieldMapping], config: &LoadConfig) -> TableMap {
    let mut map = TableMap::new();
    for mapping in mappings {
        if config.is_reserved(&mapping.column) {
            tracing::warn!(
                table = %mapping.table,
                column = %mapping.column,
                "column name is reserved for a generated key; ignoring mapping"
            );
            continue;
        }
        if !map.push(&mapping.table, &mapping.column) {
            tracing::warn!(
                table = %mapping.table,
                column = %mapping.column,
                "duplicate column in field mapping; keeping the first occurrence"
            );
        }
    }
    map
}
