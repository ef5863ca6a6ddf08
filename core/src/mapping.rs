//! JSON-to-model decoding with optional key-path extraction.
//!
//! A key path is a dotted address into the response document
//! (`"data.items"`); numeric segments index into arrays (`"data.items.0"`).
//! The addressed value is then decoded with serde into one model or a list.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, SdkError};

/// A decoded payload: one model or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped<T> {
    Object(T),
    Array(Vec<T>),
}

impl<T> Mapped<T> {
    pub fn into_object(self) -> Option<T> {
        match self {
            Mapped::Object(value) => Some(value),
            Mapped::Array(_) => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<T>> {
        match self {
            Mapped::Array(values) => Some(values),
            Mapped::Object(_) => None,
        }
    }
}

/// Follow `path` into `value`. An empty path addresses the root.
pub fn extract_key_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Decode `body` into `T` (or `Vec<T>` when `array` is set), after following
/// `key_path` when one is given.
pub fn decode<T: DeserializeOwned>(body: &[u8], key_path: Option<&str>, array: bool) -> Result<Mapped<T>> {
    let document: Value =
        serde_json::from_slice(body).map_err(|e| SdkError::Deserialization(e.to_string()))?;
    let target = match key_path {
        Some(path) => extract_key_path(&document, path)
            .cloned()
            .ok_or_else(|| SdkError::KeyPathNotFound(path.to_string()))?,
        None => document,
    };
    if array {
        serde_json::from_value(target)
            .map(Mapped::Array)
            .map_err(|e| SdkError::Deserialization(e.to_string()))
    } else {
        serde_json::from_value(target)
            .map(Mapped::Object)
            .map_err(|e| SdkError::Deserialization(e.to_string()))
    }
}
