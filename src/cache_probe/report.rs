use chrono::{DateTime, Utc};
use serde_json::Value;

use super::case::RequestCase;
use super::result::ProbeResult;

/// A case together with the result it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeEntry {
    pub case: RequestCase,
    pub result: ProbeResult,
}

/// The ordered outcome of one probe run.
///
/// Entries are in dispatch order and the report is never modified once the
/// run returns. Comparison facts are derived on demand from the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    endpoint: String,
    started_at: DateTime<Utc>,
    entries: Vec<ProbeEntry>,
    cancelled: bool,
}

impl ProbeReport {
    pub(crate) fn new(
        endpoint: String,
        started_at: DateTime<Utc>,
        entries: Vec<ProbeEntry>,
        cancelled: bool,
    ) -> Self {
        Self {
            endpoint,
            started_at,
            entries,
            cancelled,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn entries(&self) -> &[ProbeEntry] {
        &self.entries
    }

    /// True when the caller cancelled the run before every case was sent.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn total_seconds(&self) -> f64 {
        self.entries.iter().map(|e| e.result.elapsed_seconds).sum()
    }

    /// First entry carrying `label`.
    pub fn entry(&self, label: &str) -> Option<&ProbeEntry> {
        self.entries.iter().find(|e| e.case.label() == label)
    }

    /// Whether two named results carry the same ETag.
    ///
    /// `None` when either entry or either ETag is missing.
    pub fn etags_equal(&self, a: &str, b: &str) -> Option<bool> {
        let a = self.entry(a)?.result.etag()?;
        let b = self.entry(b)?.result.etag()?;
        Some(a == b)
    }

    /// The primary numeric field of a named result's body.
    pub fn numeric_value(
        &self,
        label: &str,
        accessor: &dyn Fn(&Value) -> Option<f64>,
    ) -> Option<f64> {
        self.entry(label)?.result.body.as_ref().and_then(accessor)
    }

    /// Whether two named results differ in their primary numeric field.
    pub fn numeric_differs(
        &self,
        a: &str,
        b: &str,
        accessor: &dyn Fn(&Value) -> Option<f64>,
    ) -> Option<bool> {
        let a = self.numeric_value(a, accessor)?;
        let b = self.numeric_value(b, accessor)?;
        Some(a != b)
    }
}
