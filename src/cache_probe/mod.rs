pub mod case;
pub mod error;
pub mod report;
pub mod result;
pub mod runner;
pub mod verify;

pub mod prelude {
    pub use super::case::RequestCase;
    pub use super::error::ProbeError;
    pub use super::report::{ProbeEntry, ProbeReport};
    pub use super::result::{ProbeResult, TRANSPORT_FAILURE_STATUS};
    pub use super::runner::{CacheProbeRunner, DEFAULT_TIMEOUT, ProbeOptions, verify_endpoint};
    pub use super::verify::{
        EtagHistory, FieldAccessor, Finding, FindingKind, Predicate, PredicateVerdict, ProbeSummary, Verdict,
        json_pointer,
    };
}

use std::fmt::Write;

/// Flattens an error and all of its sources into a single line per cause.
pub(crate) fn error_chain(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": caused by: {}", src);
        err = src;
    }
    s
}
