//! Salvage JSON objects from a damaged export.
//!
//! Candidates are brace-delimited spans with at most one level of nesting.
//! Each one gets two textual repairs before parsing: single quotes become
//! double quotes, and `sqft` unit suffixes after a number are dropped.

use crate::error::IngotError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

static OBJECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").unwrap()
});

static SQFT_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d)\s+sqfts?").unwrap()
});

/// Counts reported after a recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Brace-delimited candidates found in the input
    pub found: usize,
    /// Candidates that parsed after repair and were written out
    pub recovered: usize,
}

/// Every brace-delimited candidate in `text`, in order of appearance
pub fn recover_objects(text: &str) -> Vec<&str> {
    OBJECT_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}

/// Apply the textual repairs and parse. `None` if it still isn't JSON.
pub fn repair_candidate(candidate: &str) -> Option<Value> {
    let fixed = candidate.replace('\'', "\"");
    let fixed = SQFT_SUFFIX_REGEX.replace_all(&fixed, "$1");
    serde_json::from_str(&fixed).ok()
}

/// Recover objects from `text`, writing each as one compact JSON line
pub fn recover<W: Write>(text: &str, out: &mut W) -> io::Result<RecoveryReport> {
    let candidates = recover_objects(text);
    let mut report = RecoveryReport {
        found: candidates.len(),
        recovered: 0,
    };

    for candidate in candidates {
        match repair_candidate(candidate) {
            Some(value) => {
                serde_json::to_writer(&mut *out, &value)?;
                out.write_all(b"\n")?;
                report.recovered += 1;
            }
            None => {
                tracing::trace!(candidate, "candidate not recoverable");
            }
        }
    }

    Ok(report)
}

/// Read `input` lossily as UTF-8 and write recovered objects to `output`
pub fn recover_file(input: &Path, output: &Path) -> Result<RecoveryReport, IngotError> {
    let bytes = fs::read(input).map_err(|source| IngotError::Input {
        path: input.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);

    let output_error = |source| IngotError::Output {
        path: output.to_path_buf(),
        source,
    };
    let file = File::create(output).map_err(output_error)?;
    let mut writer = BufWriter::new(file);
    let report = recover(&text, &mut writer).map_err(output_error)?;
    writer.flush().map_err(output_error)?;

    tracing::info!(
        found = report.found,
        recovered = report.recovered,
        output = %output.display(),
        "recovery finished"
    );
    Ok(report)
}
