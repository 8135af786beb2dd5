//! Job parameters
//!
//! Parameters are typed name/value pairs attached to a job launch. Each is
//! flagged identifying or not: the identifying subset determines the
//! `JobInstance` the launch belongs to, non-identifying ones travel with
//! the execution only (run timestamps, operator notes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    String(String),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Long(v) => write!(f, "{}", v),
            ParameterValue::Double(v) => write!(f, "{}", v),
            ParameterValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

/// A single parameter: value plus identifying flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameter {
    pub value: ParameterValue,
    pub identifying: bool,
}

/// An ordered set of job parameters.
///
/// Backed by a `BTreeMap` so iteration order is stable, which makes the
/// identity key deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobParameters {
    params: BTreeMap<String, JobParameter>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> JobParametersBuilder {
        JobParametersBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&JobParameter> {
        self.params.get(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.params.get(name).map(|p| &p.value) {
            Some(ParameterValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.params.get(name).map(|p| &p.value) {
            Some(ParameterValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        match self.params.get(name).map(|p| &p.value) {
            Some(ParameterValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.params.get(name).map(|p| &p.value) {
            Some(ParameterValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobParameter)> {
        self.params.iter()
    }

    /// Stable digest of the identifying parameters, used as the uniqueness
    /// key for a `JobInstance`. Two parameter sets that differ only in
    /// non-identifying entries produce the same key.
    pub fn identity_key(&self) -> String {
        let mut canonical = String::new();
        for (name, param) in &self.params {
            if !param.identifying {
                continue;
            }
            let type_tag = match &param.value {
                ParameterValue::String(_) => "string",
                ParameterValue::Long(_) => "long",
                ParameterValue::Double(_) => "double",
                ParameterValue::Date(_) => "date",
            };
            canonical.push_str(name);
            canonical.push('=');
            canonical.push_str(type_tag);
            canonical.push(':');
            canonical.push_str(&param.value.to_string());
            canonical.push(';');
        }
        format!("{:x}", md5::compute(canonical.as_bytes()))
    }
}

/// Builder for [`JobParameters`].
///
/// The convenience methods add identifying parameters; `add` takes the
/// full [`JobParameter`] for non-identifying entries.
#[derive(Debug, Default)]
pub struct JobParametersBuilder {
    params: BTreeMap<String, JobParameter>,
}

impl JobParametersBuilder {
    pub fn string(self, name: &str, value: impl Into<String>) -> Self {
        self.add(name, ParameterValue::String(value.into()), true)
    }

    pub fn long(self, name: &str, value: i64) -> Self {
        self.add(name, ParameterValue::Long(value), true)
    }

    pub fn double(self, name: &str, value: f64) -> Self {
        self.add(name, ParameterValue::Double(value), true)
    }

    pub fn date(self, name: &str, value: DateTime<Utc>) -> Self {
        self.add(name, ParameterValue::Date(value), true)
    }

    pub fn add(mut self, name: &str, value: ParameterValue, identifying: bool) -> Self {
        self.params
            .insert(name.to_string(), JobParameter { value, identifying });
        self
    }

    pub fn build(self) -> JobParameters {
        JobParameters {
            params: self.params,
        }
    }
}
