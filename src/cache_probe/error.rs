//! Errors that prevent a probe run from starting.
//!
//! Failures that happen while a run is in progress are never returned through
//! this type: transport failures are stored in the case's `ProbeResult` and
//! cache-correctness problems are reported as findings in the summary.

/// Probe setup errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The case list was empty; nothing would be probed.
    #[error("no request cases configured")]
    NoCases,

    /// The endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A case payload could not be serialized to canonical JSON.
    #[error("payload for case {label} cannot be serialized: {source}")]
    Payload {
        label: String,
        #[source]
        source: serde_json::Error,
    },
}
