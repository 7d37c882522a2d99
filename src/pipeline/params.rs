//! Merged construction parameters handed to producer/filter factories.

use crate::pipeline::error::{NodeError, NodeResult};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. Later inserts win.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn require(&self, key: &str) -> NodeResult<&str> {
        self.get(key)
            .ok_or_else(|| NodeError::MissingParam(key.to_string()))
    }

    /// Parse an optional value.
    pub fn parse<T>(&self, key: &str) -> NodeResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| NodeError::invalid(key, raw, e))
            })
            .transpose()
    }

    /// Parse an optional duration such as `250ms`, `1s`, `5m`, `2h` or `1.5`.
    pub fn duration(&self, key: &str) -> NodeResult<Option<Duration>> {
        self.get(key)
            .map(|raw| parse_duration(raw).map_err(|reason| NodeError::invalid(key, raw, reason)))
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `<number><unit>` with unit `ms`, `s`, `m` or `h`. A bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a duration"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` is not a positive duration"));
    }
    let secs = match unit {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit `{other}`")),
    };
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{raw}` is out of range: {e}"))
}
