//! JSON Lines input.
//!
//! Lines are decoded with simd-json's serde bridge straight into
//! `serde_json` maps, with plain `serde_json` as a second attempt. A line
//! that neither accepts, or that decodes to anything other than an object,
//! is reported as malformed and the caller moves on.

use crate::error::{IngotError, ParseError};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One non-blank input line
#[derive(Debug)]
pub enum SourceLine {
    /// 1-based line number and the decoded object
    Record(usize, Map<String, Value>),
    /// 1-based line number and why it was rejected
    Malformed(usize, ParseError),
}

/// Decode one line into a JSON object
pub fn parse_line(line: &[u8]) -> Result<Map<String, Value>, ParseError> {
    let mut buf = line.to_vec();
    let value: Value = match simd_json::serde::from_slice(&mut buf) {
        Ok(value) => value,
        // simd-json rejects integers wider than 64 bits; serde_json reads them as doubles
        Err(_) => serde_json::from_slice(line).map_err(|e| ParseError::Json(e.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(ParseError::NotAnObject("null")),
        Value::Bool(_) => Err(ParseError::NotAnObject("boolean")),
        Value::Number(_) => Err(ParseError::NotAnObject("number")),
        Value::String(_) => Err(ParseError::NotAnObject("string")),
        Value::Array(_) => Err(ParseError::NotAnObject("array")),
    }
}

/// Streams records out of a JSON Lines reader
pub struct RecordReader<R> {
    reader: R,
    path: PathBuf,
    buf: Vec<u8>,
    line_no: usize,
    limit: Option<usize>,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, IngotError> {
        let file = File::open(path).map_err(|source| IngotError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(RecordReader::new(BufReader::new(file)).with_path(path))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            reader,
            path: PathBuf::from("<input>"),
            buf: Vec::new(),
            line_no: 0,
            limit: None,
        }
    }

    /// Name used when reporting read failures
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop after `lines` physical lines, blank and malformed ones included
    pub fn take_lines(mut self, lines: usize) -> Self {
        self.limit = Some(lines);
        self
    }

    /// Physical lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<SourceLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit.is_some_and(|limit| self.line_no >= limit) {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line_no += 1;

            let line = trim_line_end(&self.buf);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let item = match parse_line(line) {
                Ok(record) => SourceLine::Record(self.line_no, record),
                Err(e) => SourceLine::Malformed(self.line_no, e),
            };
            return Some(Ok(item));
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Decode the objects found in the first `max_lines` lines of `path`.
///
/// Malformed lines inside the window are skipped; they still count toward
/// the window.
pub fn read_sample(path: &Path, max_lines: usize) -> Result<Vec<Map<String, Value>>, IngotError> {
    let reader = RecordReader::open(path)?.take_lines(max_lines);
    collect_sample(reader)
}

fn collect_sample<R: BufRead>(
    mut reader: RecordReader<R>,
) -> Result<Vec<Map<String, Value>>, IngotError> {
    let mut sample = Vec::new();
    while let Some(line) = reader.next() {
        let line = line.map_err(|source| IngotError::Input {
            path: reader.path().to_path_buf(),
            source,
        })?;
        match line {
            SourceLine::Record(_, record) => sample.push(record),
            SourceLine::Malformed(line_no, e) => {
                tracing::debug!(line = line_no, error = %e, "skipping malformed sample line");
            }
        }
    }
    Ok(sample)
}
