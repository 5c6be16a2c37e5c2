//! Tolerant field decoders for snapshots written by producers we do not control.
//!
//! The CRUD layer serializes numeric columns as decimal strings (`"12.50"`), so snapshot
//! fields accept either a JSON number or a numeric string.

use serde::de::{Deserializer, Error};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn parse_text<E: Error>(text: &str) -> Result<Option<f64>, E> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| E::custom(format!("expected a number, got {text:?}")))
}

/// Number or numeric string. Null and blank strings decode as `0.0`.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_number(deserializer)?.unwrap_or_default())
}

/// Number or numeric string. Null and blank strings decode as `None`.
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => parse_text(&text),
    }
}

/// Decodes an optional string through `parse`; values `parse` rejects become `None`.
pub fn opt_parsed<'de, D, T>(
    deserializer: D,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|s| parse(&s)))
}
