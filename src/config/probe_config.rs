use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache_probe::prelude::*;

use super::error::ConfigError;

/// A probe target: one endpoint and the ordered cases sent to it.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// The endpoint receiving the POST requests.
    pub endpoint: String,

    /// The request cases, sent in this order.
    pub cases: Vec<CaseConfig>,

    /// JSON pointer to the primary numeric result in a 200 body,
    /// e.g. `/monthly_cost/total`.
    #[serde(default)]
    pub numeric_field: Option<String>,

    /// Per-request timeout. Defaults to 10 seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Send `If-None-Match` for repeated payloads. Defaults to true.
    #[serde(default = "default_true")]
    pub conditional_requests: bool,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// When set, the target is probed again on this interval until interrupted.
    #[serde(default)]
    pub polling_interval_seconds: Option<u64>,

    /// Tenant for metric pushes; translates to the `X-Scope-OrgID` header.
    #[serde(default)]
    pub organisation_id: Option<String>,
}

/// A single case: a literal payload, or a repeat of an earlier case.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseConfig {
    pub label: String,

    #[serde(default)]
    pub payload: Option<Value>,

    /// Label of an earlier case whose payload is sent again.
    #[serde(default)]
    pub repeat_of: Option<String>,
}

fn default_timeout_seconds() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_true() -> bool {
    true
}

pub type Config = HashMap<String, TargetConfig>;

impl TargetConfig {
    pub fn probe_options(&self) -> Result<ProbeOptions, ConfigError> {
        let timeout = Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or(ConfigError::InvalidTimeout(self.timeout_seconds))?;

        let mut options = ProbeOptions {
            timeout,
            conditional_requests: self.conditional_requests,
            accept_invalid_certs: self.accept_invalid_certs,
            ..ProbeOptions::default()
        };
        if let Some(pointer) = &self.numeric_field {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(ConfigError::InvalidPointer(pointer.clone()));
            }
            options.numeric_field = Some(json_pointer(pointer.as_str()));
        }
        Ok(options)
    }

    /// Resolves `repeat_of` references into concrete request cases.
    pub fn request_cases(&self) -> Result<Vec<RequestCase>, ConfigError> {
        if self.cases.is_empty() {
            return Err(ConfigError::NoCases);
        }

        let mut payloads: HashMap<&str, &Value> = HashMap::new();
        let mut labels = HashSet::new();
        let mut cases = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            if !labels.insert(case.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(case.label.clone()));
            }
            let payload = match (&case.payload, &case.repeat_of) {
                (Some(payload), None) => payload,
                (None, Some(original)) => payloads.get(original.as_str()).copied().ok_or_else(
                    || ConfigError::UnknownRepeat {
                        label: case.label.clone(),
                        original: original.clone(),
                    },
                )?,
                _ => return Err(ConfigError::AmbiguousCase(case.label.clone())),
            };
            payloads.insert(case.label.as_str(), payload);
            cases.push(RequestCase::new(case.label.as_str(), payload)?);
        }
        Ok(cases)
    }
}
