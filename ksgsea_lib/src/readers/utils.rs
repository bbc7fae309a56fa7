use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;

use crate::{MalformedError, Result};

/// Tab-delimited reader over `path`. Lines starting with `#` are skipped and
/// rows may have any number of fields.
pub fn tsv_reader(path: impl AsRef<Path>, has_headers: bool) -> Result<Reader<File>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .has_headers(has_headers)
        .comment(Some(b'#'))
        .from_reader(file))
}

/// 1-based line of `record` in its file, falling back to `fallback`.
pub fn line_of(record: &StringRecord, fallback: usize) -> usize {
    record.position().map_or(fallback, |p| p.line() as usize)
}

pub fn require_columns(record: &StringRecord, line: usize, expected: usize) -> Result<()> {
    if record.len() < expected {
        return Err(MalformedError::NoColumnsFound {
            line,
            expected,
            found: record.len(),
        }
        .into());
    }
    Ok(())
}

/// Parses a score. Empty cells and `NA`/`NaN` become NaN.
pub fn parse_score(value: &str, line: usize) -> Result<f64> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    value.parse::<f64>().map_err(|_| {
        MalformedError::WrongFormat {
            line,
            value: value.to_owned(),
        }
        .into()
    })
}

/// Splits class labels on tabs, spaces or newlines.
pub fn split_labels(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}
