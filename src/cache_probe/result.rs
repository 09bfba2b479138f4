use serde_json::Value;

/// Status recorded when no HTTP response was received.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Response metadata captured for one request case.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub status: u16,
    pub etag: Option<String>,
    pub cache_control: Option<String>,
    /// Parsed JSON body, only ever present for a 200.
    pub body: Option<Value>,
    pub error: Option<String>,
    /// Whether the request carried `If-None-Match`.
    pub conditional: bool,
    pub elapsed_seconds: f64,
}

impl ProbeResult {
    pub fn transport_failure(error: String, conditional: bool, elapsed_seconds: f64) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            etag: None,
            cache_control: None,
            body: None,
            error: Some(error),
            conditional,
            elapsed_seconds,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }

    /// 200 and 304 responses must carry an ETag.
    pub fn requires_etag(&self) -> bool {
        matches!(self.status, 200 | 304)
    }

    /// The ETag, ignoring an empty header value.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref().filter(|e| !e.is_empty())
    }
}
