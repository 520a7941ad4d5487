//! Monitoring samples, environment reports, and log levels.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single untyped monitoring value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Free text.
    Text(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

macro_rules! scalar_map {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name {
            values: BTreeMap<String, Scalar>,
        }

        impl $name {
            /// Creates an empty map.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Stores a value under `key`.
            pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
                self.values.insert(key.into(), value.into());
            }

            /// Builder-style variant of `insert`.
            #[must_use]
            pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
                self.insert(key, value);
                self
            }

            /// Looks up a value.
            #[must_use]
            pub fn get(&self, key: &str) -> Option<&Scalar> {
                self.values.get(key)
            }

            /// Returns `true` when no values are stored.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.values.is_empty()
            }

            /// Iterates over values in key order.
            pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
                self.values.iter().map(|(key, value)| (key.as_str(), value))
            }
        }
    };
}

scalar_map! {
    /// One sample emitted on a monitor stream.
    MonitorData
}

scalar_map! {
    /// Key/value description of the application's runtime environment.
    Environment
}

/// Log verbosity exposed through `set_log_level` / `get_log_level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debugging detail.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Lower-case level name, usable as a `tracing` filter directive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned when a log level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{value}'")]
pub struct LogLevelParseError {
    /// Rejected input.
    pub value: String,
}

impl FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LogLevelParseError {
                value: value.to_owned(),
            }),
        }
    }
}
