//! Live parameter values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Latest known value of a telemetry parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    /// Engineering value
    pub eng_value: Value,
    /// Time the value was generated on board
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<DateTime<Utc>>,
    /// Monitoring result (e.g. `IN_LIMITS`, `WARNING`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_result: Option<String>,
}

impl ParameterValue {
    /// Value without time or monitoring result
    #[inline]
    #[must_use]
    pub fn new(eng_value: impl Into<Value>) -> Self {
        Self {
            eng_value: eng_value.into(),
            generation_time: None,
            monitoring_result: None,
        }
    }

    /// With generation time
    #[inline]
    #[must_use]
    pub fn with_generation_time(mut self, time: DateTime<Utc>) -> Self {
        self.generation_time = Some(time);
        self
    }

    /// With monitoring result
    #[inline]
    #[must_use]
    pub fn with_monitoring_result(mut self, result: impl Into<String>) -> Self {
        self.monitoring_result = Some(result.into());
        self
    }

    /// Engineering value as display text
    #[must_use]
    pub fn display_value(&self) -> String {
        match &self.eng_value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A parameter name with its sampled value (none if never received)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParameterValue {
    /// Parameter name
    pub parameter: String,
    /// Sampled value
    pub value: Option<ParameterValue>,
}

/// Single mutable map of parameter name to latest value
///
/// Batches are applied in one call so readers never observe half of a
/// delivery.
#[derive(Debug, Clone, Default)]
pub struct ParameterCache {
    values: HashMap<String, ParameterValue>,
}

impl ParameterCache {
    /// Empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one delivered batch
    pub fn apply<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = (String, ParameterValue)>,
    {
        self.values.extend(batch);
    }

    /// Latest value of a parameter
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Sample the given parameters, in order
    #[must_use]
    pub fn snapshot<'a, I>(&self, names: I) -> Vec<NamedParameterValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| NamedParameterValue {
                parameter: name.to_string(),
                value: self.values.get(name).cloned(),
            })
            .collect()
    }

    /// Number of parameters with a value
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no value was received
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
