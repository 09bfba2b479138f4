use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, IF_NONE_MATCH};
use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use super::error_chain;
use super::prelude::*;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("cachebox/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every run of a [`CacheProbeRunner`].
#[derive(Clone)]
pub struct ProbeOptions {
    /// Hard limit for a single request, including reading its body.
    pub timeout: Duration,
    /// Reads the primary numeric result from a 200 body.
    pub numeric_field: Option<FieldAccessor>,
    /// Send `If-None-Match` when a payload repeats one that returned an ETag.
    pub conditional_requests: bool,
    pub accept_invalid_certs: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            numeric_field: None,
            conditional_requests: true,
            accept_invalid_certs: false,
        }
    }
}

impl fmt::Debug for ProbeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeOptions")
            .field("timeout", &self.timeout)
            .field("numeric_field", &self.numeric_field.is_some())
            .field("conditional_requests", &self.conditional_requests)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl ProbeOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_numeric_field(mut self, accessor: FieldAccessor) -> Self {
        self.numeric_field = Some(accessor);
        self
    }

    pub fn with_conditional_requests(mut self, enabled: bool) -> Self {
        self.conditional_requests = enabled;
        self
    }
}

/// Sends request cases to one endpoint, strictly in order, and records what
/// came back.
#[derive(Debug, Clone, Default)]
pub struct CacheProbeRunner {
    options: ProbeOptions,
}

impl CacheProbeRunner {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Runs every case against `endpoint`.
    pub async fn run(
        &self,
        endpoint: &str,
        cases: &[RequestCase],
    ) -> Result<ProbeReport, ProbeError> {
        let (_cancel_tx, cancel) = watch::channel(false);
        self.run_until_cancelled(endpoint, cases, cancel).await
    }

    /// Runs every case against `endpoint`, checking `cancel` before each
    /// dispatch. Once it reads `true` the remaining cases are skipped and the
    /// report is returned truncated.
    pub async fn run_until_cancelled(
        &self,
        endpoint: &str,
        cases: &[RequestCase],
        cancel: watch::Receiver<bool>,
    ) -> Result<ProbeReport, ProbeError> {
        if cases.is_empty() {
            return Err(ProbeError::NoCases);
        }
        let url = parse_endpoint(endpoint)?;

        // Every run gets its own client and therefore its own connection pool.
        let client = Client::builder()
            .timeout(self.options.timeout)
            .danger_accept_invalid_certs(self.options.accept_invalid_certs)
            .user_agent(USER_AGENT)
            .build()?;

        let started_at = Utc::now();
        let mut entries = Vec::with_capacity(cases.len());
        let mut seen_etags: HashMap<&str, String> = HashMap::new();
        let mut cancelled = false;

        for case in cases {
            if *cancel.borrow() {
                log::info!(
                    "Probe of {url} cancelled, skipping {} remaining case(s)",
                    cases.len() - entries.len()
                );
                cancelled = true;
                break;
            }

            let if_none_match = if self.options.conditional_requests {
                seen_etags.get(case.fingerprint()).map(String::as_str)
            } else {
                None
            };

            let result = probe_case(&client, &url, case, if_none_match, self.options.timeout).await;

            if let Some(etag) = result.etag() {
                seen_etags
                    .entry(case.fingerprint())
                    .or_insert_with(|| etag.to_string());
            }
            entries.push(ProbeEntry {
                case: case.clone(),
                result,
            });
        }

        Ok(ProbeReport::new(url.to_string(), started_at, entries, cancelled))
    }

    /// Evaluates the cache predicates for a report produced by this runner.
    pub fn summarize(&self, report: &ProbeReport) -> ProbeSummary {
        ProbeSummary::evaluate(report, self.options.numeric_field.as_ref())
    }

    /// Like [`summarize`](Self::summarize), also flagging ETags that changed
    /// since the runs recorded in `history`.
    pub fn summarize_with_history(
        &self,
        report: &ProbeReport,
        history: &mut EtagHistory,
    ) -> ProbeSummary {
        ProbeSummary::evaluate_with_history(report, self.options.numeric_field.as_ref(), history)
    }
}

/// Runs `cases` against `endpoint` and evaluates the result in one call.
pub async fn verify_endpoint(
    endpoint: &str,
    cases: &[RequestCase],
    options: ProbeOptions,
) -> Result<(ProbeReport, ProbeSummary), ProbeError> {
    let runner = CacheProbeRunner::new(options);
    let report = runner.run(endpoint, cases).await?;
    let summary = runner.summarize(&report);
    Ok((report, summary))
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(format!("unsupported scheme {scheme}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

async fn probe_case(
    client: &Client,
    url: &Url,
    case: &RequestCase,
    if_none_match: Option<&str>,
    timeout: Duration,
) -> ProbeResult {
    let conditional = if_none_match.is_some();
    log::debug!(
        "POST {url} case={} fingerprint={} if-none-match={:?}",
        case.label(),
        case.fingerprint(),
        if_none_match
    );

    let mut request = client
        .post(url.clone())
        .header(CONTENT_TYPE, "application/json")
        .body(case.canonical_body().to_string());
    if let Some(etag) = if_none_match {
        request = request.header(IF_NONE_MATCH, etag);
    }

    let start = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let error = describe(&e, timeout);
            log::warn!("Case {} failed: {error}", case.label());
            return ProbeResult::transport_failure(error, conditional, start.elapsed().as_secs_f64());
        }
    };

    let status = response.status().as_u16();
    let etag = header_value(response.headers(), &ETAG);
    let cache_control = header_value(response.headers(), &CACHE_CONTROL);

    let (body, error) = if status == 200 {
        match response.bytes().await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => (Some(body), None),
                Err(e) => (None, Some(format!("invalid JSON body: {e}"))),
            },
            Err(e) => {
                let error = describe(&e, timeout);
                log::warn!("Case {} failed reading body: {error}", case.label());
                return ProbeResult::transport_failure(
                    error,
                    conditional,
                    start.elapsed().as_secs_f64(),
                );
            }
        }
    } else {
        (None, None)
    };
    let elapsed_seconds = start.elapsed().as_secs_f64();

    log::debug!(
        "Case {} -> {status} etag={etag:?} cache-control={cache_control:?} in {:.2}ms",
        case.label(),
        elapsed_seconds * 1000.0
    );

    ProbeResult {
        status,
        etag,
        cache_control,
        body,
        error,
        conditional,
        elapsed_seconds,
    }
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn describe(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {:?}: {}", timeout, error_chain(err))
    } else {
        error_chain(err)
    }
}
