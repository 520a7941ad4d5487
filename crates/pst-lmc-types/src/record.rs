//! Key/value configuration payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered key/value record used for beam, scan, and start-scan payloads.
///
/// The record serialises as a flat JSON object of strings and loads from
/// ASCII header text with one `KEY value` pair per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigRecord {
    entries: BTreeMap<String, String>,
}

/// Errors raised while reading a [`ConfigRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigRecordError {
    /// A header line had a key but no value.
    #[error("line {line}: key '{key}' has no value")]
    MissingValue {
        /// One-based line number.
        line: usize,
        /// Key found on the line.
        key: String,
    },
    /// A required key is absent.
    #[error("missing key '{key}'")]
    MissingKey {
        /// Requested key.
        key: String,
    },
    /// A value could not be converted to the requested type.
    #[error("key '{key}' has unparsable value '{value}': {message}")]
    InvalidValue {
        /// Requested key.
        key: String,
        /// Raw value.
        value: String,
        /// Conversion error text.
        message: String,
    },
}

impl ConfigRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `KEY value` pairs from header text.
    ///
    /// Blank lines and lines starting with `#` are skipped. Later keys
    /// overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRecordError::MissingValue`] when a line holds a key
    /// without a value.
    pub fn parse_header(text: &str) -> Result<Self, ConfigRecordError> {
        let mut record = Self::new();
        record.load_header(text)?;
        Ok(record)
    }

    /// Merges `KEY value` pairs from header text into this record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRecordError::MissingValue`] when a line holds a key
    /// without a value. Pairs before the failing line are kept.
    pub fn load_header(&mut self, text: &str) -> Result<(), ConfigRecordError> {
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (line, ""),
            };
            if value.is_empty() {
                return Err(ConfigRecordError::MissingValue {
                    line: index + 1,
                    key: key.to_owned(),
                });
            }
            self.entries.insert(key.to_owned(), value.to_owned());
        }
        Ok(())
    }

    /// Stores a value, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.insert(key.into(), value.to_string());
    }

    /// Builder-style variant of [`ConfigRecord::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Raw string value for a key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Typed value for a key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRecordError::MissingKey`] when the key is absent and
    /// [`ConfigRecordError::InvalidValue`] when the value does not parse.
    pub fn get<T>(&self, key: &str) -> Result<T, ConfigRecordError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self
            .get_str(key)
            .ok_or_else(|| ConfigRecordError::MissingKey {
                key: key.to_owned(),
            })?;
        value
            .parse::<T>()
            .map_err(|error| ConfigRecordError::InvalidValue {
                key: key.to_owned(),
                value: value.to_owned(),
                message: error.to_string(),
            })
    }

    /// Returns `true` when the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no pairs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Renders the record back to header text.
    #[must_use]
    pub fn to_header(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{key} {value}\n"))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigRecord
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.set(key, value);
        }
        record
    }
}
