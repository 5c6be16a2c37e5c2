use std::io;
use std::path::Path;

use serde_json::Value;

use crate::domain::repository::ExpectedListReader;
use crate::domain::types::ExpectedItem;
use crate::error::ReconcilerError;

/// Reads expected-inventory files from the local filesystem.
///
/// `.json` files hold an array of objects; anything else is parsed as CSV with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsExpectedListReader;

impl ExpectedListReader for FsExpectedListReader {
    async fn read(&self, path: &Path) -> Result<Option<Vec<ExpectedItem>>, ReconcilerError> {
        let invalid = |e: &dyn std::fmt::Display| {
            ReconcilerError::ExpectedList(format!("{}: {e}", path.display()))
        };
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(invalid(&e)),
        };
        let items = if is_json(path) {
            parse_json(&contents).map_err(|e| invalid(&e))?
        } else {
            parse_csv(&contents).map_err(|e| invalid(&e))?
        };
        tracing::debug!(path = %path.display(), rows = items.len(), "expected inventory loaded");
        Ok(Some(items))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// One item per data row, header names as keys and every cell as a string.
/// Blank lines are skipped; rows with a different number of cells than the header are an error.
pub fn parse_csv(contents: &str) -> Result<Vec<ExpectedItem>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());
    let headers = reader.headers()?.clone();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let item = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_owned(), Value::String(cell.to_owned())))
            .collect();
        items.push(item);
    }
    Ok(items)
}

pub fn parse_json(contents: &str) -> Result<Vec<ExpectedItem>, serde_json::Error> {
    serde_json::from_str(contents)
}
