//! Declarative component parameters.
//!
//! `Params` is an ordered map so that serialized configs (and therefore run
//! hashes) are deterministic. Typed accessors produce a `ParamError`
//! diagnostic instead of panicking, which lets pipeline assembly collect every
//! malformed entry before reporting.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("missing required parameter '{key}'")]
    Missing { key: String },

    #[error("parameter '{key}' should be {expected}, found {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("parameter '{key}' is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

impl ParamError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Declarative construction from a parameter table.
///
/// Failures are returned as diagnostics so that a pipeline builder can keep
/// going and report every malformed entry at once.
pub trait FromConfig: Sized {
    fn from_config(params: &Params) -> Result<Self, ParamError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    // ─── Typed accessors ─────────────────────────────────────────────

    pub fn f64(&self, key: &str) -> Result<f64, ParamError> {
        let value = self.required(key)?;
        value
            .as_f64()
            .ok_or_else(|| wrong_type(key, "a number", value))
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ParamError> {
        if self.contains(key) {
            self.f64(key)
        } else {
            Ok(default)
        }
    }

    pub fn usize(&self, key: &str) -> Result<usize, ParamError> {
        let value = self.required(key)?;
        if let Some(n) = value.as_u64() {
            return Ok(n as usize);
        }
        match value.as_f64() {
            Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
            _ => Err(wrong_type(key, "a non-negative integer", value)),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ParamError> {
        if self.contains(key) {
            self.usize(key)
        } else {
            Ok(default)
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ParamError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| wrong_type(key, "a boolean", value)),
        }
    }

    pub fn str(&self, key: &str) -> Result<&str, ParamError> {
        let value = self.required(key)?;
        value
            .as_str()
            .ok_or_else(|| wrong_type(key, "a string", value))
    }

    /// Parse a string parameter through `FromStr`, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ParamError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if !self.contains(key) {
            return Ok(default);
        }
        self.str(key)?
            .parse()
            .map_err(|e: T::Err| ParamError::invalid(key, e.to_string()))
    }

    /// A nested table, e.g. an anchor block inside a rule entry.
    pub fn nested(&self, key: &str) -> Result<Option<Params>, ParamError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Params(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ))),
            Some(other) => Err(wrong_type(key, "a table", other)),
        }
    }

    fn required(&self, key: &str) -> Result<&Value, ParamError> {
        self.get(key).ok_or_else(|| ParamError::Missing {
            key: key.to_string(),
        })
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> ParamError {
    ParamError::WrongType {
        key: key.to_string(),
        expected,
        found: found.to_string(),
    }
}

/// Check that a fraction lies in `[0, 1]`.
pub fn check_fraction(key: &str, value: f64) -> Result<f64, ParamError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::invalid(key, format!("{value} is outside [0, 1]")))
    }
}
