//! JSON codec for quote batches.
//!
//! # Responsibility
//! - Turn untrusted JSON (import files, persisted values) into validated records.
//! - Render collections as human-readable JSON for export.
//!
//! # Invariants
//! - Decoding is all-or-nothing: one bad element rejects the whole batch.
//! - Errors name the zero-based position of the offending element.
//! - `decode_batch(&encode_pretty(c)?) == c` for any collection of valid records.

use crate::model::record::{Record, RecordValidationError};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Batch-level validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Input is not valid JSON at all.
    MalformedJson(String),
    /// Top-level value is not an array.
    NotAnArray,
    /// Element at `index` is not a JSON object.
    NotAnObject { index: usize },
    /// Element at `index` lacks `field` or it is not a string.
    MissingField { index: usize, field: &'static str },
    /// Element at `index` has a blank `text` or `category`.
    InvalidRecord {
        index: usize,
        reason: RecordValidationError,
    },
}

impl ValidationError {
    /// Returns the offending element position, when the error is element-level.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::NotAnObject { index }
            | Self::MissingField { index, .. }
            | Self::InvalidRecord { index, .. } => Some(*index),
            Self::MalformedJson(_) | Self::NotAnArray => None,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson(message) => write!(f, "malformed quote JSON: {message}"),
            Self::NotAnArray => write!(f, "quote batch must be a JSON array"),
            Self::NotAnObject { index } => write!(f, "quote #{index} is not an object"),
            Self::MissingField { index, field } => {
                write!(f, "quote #{index} is missing string field `{field}`")
            }
            Self::InvalidRecord { index, reason } => write!(f, "quote #{index} is invalid: {reason}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Decodes a JSON document into a validated batch.
pub fn decode_batch(json: &str) -> Result<Vec<Record>, ValidationError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| ValidationError::MalformedJson(err.to_string()))?;
    records_from_value(&value)
}

/// Validates an already-parsed JSON value as a batch of records.
pub fn records_from_value(value: &Value) -> Result<Vec<Record>, ValidationError> {
    let items = value.as_array().ok_or(ValidationError::NotAnArray)?;
    let mut records = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or(ValidationError::NotAnObject { index })?;
        let text = string_field(object, index, "text")?;
        let category = string_field(object, index, "category")?;
        let record = Record::new(text, category)
            .map_err(|reason| ValidationError::InvalidRecord { index, reason })?;
        records.push(record);
    }

    Ok(records)
}

/// Renders a collection as pretty-printed JSON.
pub fn encode_pretty(quotes: &[Record]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(quotes)
}

/// Renders a collection as compact JSON (persistence format).
pub fn encode_compact(quotes: &[Record]) -> serde_json::Result<String> {
    serde_json::to_string(quotes)
}

fn string_field<'a>(
    object: &'a serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField { index, field })
}

#[cfg(test)]
mod tests {
    use super::{decode_batch, encode_pretty, ValidationError};
    use crate::model::record::{seed_quotes, Record, RecordValidationError};

    #[test]
    fn export_then_import_preserves_order_and_content() {
        let mut quotes = seed_quotes();
        quotes.push(Record::new("Quote with \"quotes\" and ünïcode", "Misc").expect("valid"));

        let json = encode_pretty(&quotes).expect("encode");
        assert!(json.contains('\n'), "export should be human-readable");
        assert_eq!(decode_batch(&json).expect("decode"), quotes);
    }

    #[test]
    fn empty_array_is_a_valid_batch() {
        assert!(decode_batch("[]").expect("decode").is_empty());
    }

    #[test]
    fn rejects_non_array_documents() {
        assert_eq!(
            decode_batch(r#"{"text":"a","category":"b"}"#).expect_err("object"),
            ValidationError::NotAnArray
        );
        assert!(matches!(
            decode_batch("not json").expect_err("garbage"),
            ValidationError::MalformedJson(_)
        ));
    }

    #[test]
    fn reports_position_of_blank_text() {
        let err = decode_batch(r#"[{"text":"ok","category":"X"},{"text":"  ","category":"X"}]"#)
            .expect_err("blank text");
        assert_eq!(
            err,
            ValidationError::InvalidRecord {
                index: 1,
                reason: RecordValidationError::EmptyText,
            }
        );
        assert_eq!(err.position(), Some(1));
    }

    #[test]
    fn reports_missing_or_mistyped_fields() {
        assert_eq!(
            decode_batch(r#"[{"text":"ok"}]"#).expect_err("missing category"),
            ValidationError::MissingField {
                index: 0,
                field: "category",
            }
        );
        assert_eq!(
            decode_batch(r#"[{"text":7,"category":"X"}]"#).expect_err("numeric text"),
            ValidationError::MissingField {
                index: 0,
                field: "text",
            }
        );
        assert_eq!(
            decode_batch(r#"["loose string"]"#).expect_err("string element"),
            ValidationError::NotAnObject { index: 0 }
        );
    }

    #[test]
    fn trims_imported_fields() {
        let batch = decode_batch(r#"[{"text":"  padded ","category":" Life "}]"#).expect("decode");
        assert_eq!(batch, vec![Record::new("padded", "Life").expect("valid")]);
    }
}
