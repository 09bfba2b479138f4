//! Verifies that an HTTP service implements ETag based conditional caching.
//!
//! A [`CacheProbeRunner`](cache_probe::runner::CacheProbeRunner) POSTs an ordered list of
//! JSON payloads to one endpoint and records status, `ETag`, `Cache-Control` and body for
//! each. [`ProbeSummary`](cache_probe::verify::ProbeSummary) then checks the recorded
//! results: fresh payloads return 200 with an ETag, different payloads return different
//! results, repeated payloads are served by a 304 or an identical 200, and an ETag only
//! ever depends on the payload.

pub mod cache_probe;
pub mod config;
pub mod format;
pub mod mimir;

pub use cache_probe::prelude;
