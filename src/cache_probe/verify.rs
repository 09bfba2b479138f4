//! Cache-correctness predicates evaluated over a finished [`ProbeReport`].
//!
//! Cases are grouped by payload fingerprint. The first case of a group is its
//! original, later cases are repeats. Evaluation is pure: it never touches the
//! network and never fails, every problem becomes a [`Finding`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::report::{ProbeEntry, ProbeReport};

/// Extracts the primary numeric field from a response body.
pub type FieldAccessor = Arc<dyn Fn(&Value) -> Option<f64> + Send + Sync>;

/// Accessor reading a number at an RFC 6901 JSON pointer, e.g. `/monthly_cost/total`.
pub fn json_pointer(pointer: impl Into<String>) -> FieldAccessor {
    let pointer = pointer.into();
    Arc::new(move |body: &Value| body.pointer(&pointer).and_then(Value::as_f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// First request for an unseen payload yields 200 with an ETag.
    Freshness,
    /// Different payloads yield different ETags and numeric results.
    Distinctness,
    /// A repeated payload is served by a 304 or an identical 200.
    Reuse,
    /// The same payload always yields the same ETag.
    EtagDeterminism,
}

impl Predicate {
    pub const ALL: [Predicate; 4] = [
        Predicate::Freshness,
        Predicate::Distinctness,
        Predicate::Reuse,
        Predicate::EtagDeterminism,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Freshness => "freshness",
            Predicate::Distinctness => "distinctness",
            Predicate::Reuse => "reuse",
            Predicate::EtagDeterminism => "etag_determinism",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The report holds nothing this predicate could compare.
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    /// The endpoint could not be reached for a case.
    Transport,
    /// A response broke the wire contract, e.g. a 200 without an ETag.
    ProtocolViolation,
    /// The service cached incorrectly.
    CorrectnessViolation,
    /// A predicate could not be checked because a case it depends on has
    /// no usable result. The root cause is reported once, as a transport
    /// failure or protocol violation of that case.
    Inconclusive,
}

impl FindingKind {
    pub fn name(&self) -> &'static str {
        match self {
            FindingKind::Transport => "transport",
            FindingKind::ProtocolViolation => "protocol_violation",
            FindingKind::CorrectnessViolation => "correctness_violation",
            FindingKind::Inconclusive => "inconclusive",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: FindingKind,
    /// Labels of the cases involved, in report order.
    pub cases: Vec<String>,
    pub message: String,
}

impl Finding {
    fn new(kind: FindingKind, cases: &[&ProbeEntry], message: impl Into<String>) -> Self {
        Self {
            kind,
            cases: cases.iter().map(|e| e.case.label().to_string()).collect(),
            message: message.into(),
        }
    }

    /// A case whose result cannot take part in a comparison.
    fn unavailable(entry: &ProbeEntry, what: &str) -> Self {
        let result = &entry.result;
        let cause = if result.is_transport_failure() {
            result.error.as_deref().unwrap_or("no response").to_string()
        } else if result.requires_etag() {
            format!("status {} without ETag", result.status)
        } else {
            format!("status {}", result.status)
        };
        Self::new(
            FindingKind::Inconclusive,
            &[entry],
            format!("{}: {what}: {cause}", entry.case.label()),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredicateVerdict {
    pub predicate: Predicate,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
}

impl PredicateVerdict {
    fn from_findings(predicate: Predicate, compared: bool, findings: Vec<Finding>) -> Self {
        let verdict = if !findings.is_empty() {
            Verdict::Fail
        } else if compared {
            Verdict::Pass
        } else {
            Verdict::NotApplicable
        };
        Self {
            predicate,
            verdict,
            findings,
        }
    }
}

/// Pass/fail outcome of every predicate for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSummary {
    pub verdicts: Vec<PredicateVerdict>,
    /// Responses that broke the wire contract, one finding per case.
    pub protocol_violations: Vec<Finding>,
    /// Cases that never received a response.
    pub transport_failures: Vec<Finding>,
    /// Repeats served by a true `304 Not Modified` rather than an equal 200.
    pub not_modified_repeats: usize,
    /// Every repeated payload kept its ETag; `None` when nothing was repeated.
    pub same_input_same_etag: Option<bool>,
    /// Every pair of distinct payloads produced distinct numeric results;
    /// `None` when no pair could be compared.
    pub different_input_different_value: Option<bool>,
    pub cancelled: bool,
}

impl ProbeSummary {
    pub fn evaluate(report: &ProbeReport, accessor: Option<&FieldAccessor>) -> Self {
        let entries = report.entries();
        let groups = group_by_fingerprint(entries);

        let mut transport_failures = Vec::new();
        let mut protocol_violations = Vec::new();
        for entry in entries {
            let result = &entry.result;
            if result.is_transport_failure() {
                transport_failures.push(Finding::new(
                    FindingKind::Transport,
                    &[entry],
                    format!(
                        "{}: {}",
                        entry.case.label(),
                        result.error.as_deref().unwrap_or("no response")
                    ),
                ));
                continue;
            }
            if result.requires_etag() && result.etag().is_none() {
                protocol_violations.push(Finding::new(
                    FindingKind::ProtocolViolation,
                    &[entry],
                    format!(
                        "{}: status {} without ETag header",
                        entry.case.label(),
                        result.status
                    ),
                ));
            }
            if let (Some(accessor), Some(body)) = (accessor, result.body.as_ref()) {
                if accessor(body).is_none() {
                    protocol_violations.push(Finding::new(
                        FindingKind::ProtocolViolation,
                        &[entry],
                        format!("{}: body has no configured numeric field", entry.case.label()),
                    ));
                }
            }
            if result.status == 200 && result.body.is_none() {
                protocol_violations.push(Finding::new(
                    FindingKind::ProtocolViolation,
                    &[entry],
                    format!(
                        "{}: 200 without a JSON body: {}",
                        entry.case.label(),
                        result.error.as_deref().unwrap_or("empty body")
                    ),
                ));
            }
        }

        let freshness = freshness(entries, &groups);
        let (distinctness, different_input_different_value) =
            distinctness(entries, &groups, accessor);
        let (reuse, not_modified_repeats) = reuse(entries, &groups, accessor);
        let determinism = etag_determinism(entries, &groups);

        let same_input_same_etag = match determinism.verdict {
            Verdict::NotApplicable => None,
            verdict => Some(verdict == Verdict::Pass),
        };

        Self {
            verdicts: vec![freshness, distinctness, reuse, determinism],
            protocol_violations,
            transport_failures,
            not_modified_repeats,
            same_input_same_etag,
            different_input_different_value,
            cancelled: report.cancelled(),
        }
    }

    /// Evaluates `report` and additionally compares its ETags with those
    /// earlier runs returned for the same payloads, then records this run
    /// in `history`.
    pub fn evaluate_with_history(
        report: &ProbeReport,
        accessor: Option<&FieldAccessor>,
        history: &mut EtagHistory,
    ) -> Self {
        let mut summary = Self::evaluate(report, accessor);
        let (drift_compared, drift) = etag_drift(report.entries(), history);

        if let Some(determinism) = summary
            .verdicts
            .iter_mut()
            .find(|v| v.predicate == Predicate::EtagDeterminism)
        {
            let compared = determinism.verdict != Verdict::NotApplicable || drift_compared;
            let mut findings = std::mem::take(&mut determinism.findings);
            findings.extend(drift);
            *determinism =
                PredicateVerdict::from_findings(Predicate::EtagDeterminism, compared, findings);
            summary.same_input_same_etag = match determinism.verdict {
                Verdict::NotApplicable => None,
                verdict => Some(verdict == Verdict::Pass),
            };
        }

        history.record(report);
        summary
    }

    pub fn verdict(&self, predicate: Predicate) -> Verdict {
        self.verdicts
            .iter()
            .find(|v| v.predicate == predicate)
            .map(|v| v.verdict)
            .unwrap_or(Verdict::NotApplicable)
    }

    /// The run completed, no predicate failed and every response honoured
    /// the wire contract. A cancelled run never passes: the cases it skipped
    /// were not verified.
    pub fn passed(&self) -> bool {
        !self.cancelled
            && self.protocol_violations.is_empty()
            && self.verdicts.iter().all(|v| v.verdict != Verdict::Fail)
    }

    /// All predicate findings plus the per-case protocol and transport findings.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.verdicts
            .iter()
            .flat_map(|v| v.findings.iter())
            .chain(self.protocol_violations.iter())
            .chain(self.transport_failures.iter())
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings().filter(|f| f.kind == kind).count()
    }
}

/// The ETag each payload fingerprint received in the most recent run of a
/// target, carried from one run to the next.
#[derive(Debug, Clone, Default)]
pub struct EtagHistory {
    etags: HashMap<String, String>,
}

impl EtagHistory {
    pub fn get(&self, fingerprint: &str) -> Option<&str> {
        self.etags.get(fingerprint).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.etags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.etags.is_empty()
    }

    fn record(&mut self, report: &ProbeReport) {
        let mut latest: HashMap<&str, &str> = HashMap::new();
        for entry in report.entries() {
            if let Some(etag) = entry.result.etag() {
                latest.entry(entry.case.fingerprint()).or_insert(etag);
            }
        }
        for (fingerprint, etag) in latest {
            self.etags.insert(fingerprint.to_string(), etag.to_string());
        }
    }
}

/// ETags that changed since an earlier run, one finding per payload.
fn etag_drift(entries: &[ProbeEntry], history: &EtagHistory) -> (bool, Vec<Finding>) {
    let mut compared = false;
    let mut reported = HashSet::new();
    let mut findings = Vec::new();

    for entry in entries {
        let Some(etag) = entry.result.etag() else {
            continue;
        };
        let Some(previous) = history.get(entry.case.fingerprint()) else {
            continue;
        };
        compared = true;
        if etag != previous && reported.insert(entry.case.fingerprint()) {
            findings.push(Finding::new(
                FindingKind::CorrectnessViolation,
                &[entry],
                format!(
                    "{}: ETag {etag} differs from {previous} returned by an earlier run",
                    entry.case.label()
                ),
            ));
        }
    }
    (compared, findings)
}

/// Entry indices per fingerprint; the first index of each group is the original.
struct Groups {
    groups: Vec<Vec<usize>>,
}

impl Groups {
    fn originals(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().map(|g| g[0])
    }

    fn repeats(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g[1..].iter().map(move |&r| (g[0], r)))
    }
}

fn group_by_fingerprint(entries: &[ProbeEntry]) -> Groups {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        match index.get(entry.case.fingerprint()) {
            Some(&g) => groups[g].push(i),
            None => {
                index.insert(entry.case.fingerprint(), groups.len());
                groups.push(vec![i]);
            }
        }
    }
    Groups { groups }
}

fn freshness(entries: &[ProbeEntry], groups: &Groups) -> PredicateVerdict {
    let mut findings = Vec::new();
    let mut compared = false;
    for i in groups.originals() {
        compared = true;
        let entry = &entries[i];
        let result = &entry.result;
        if result.is_transport_failure() {
            findings.push(Finding::unavailable(entry, "fresh request failed"));
        } else if result.status != 200 {
            findings.push(Finding::new(
                FindingKind::CorrectnessViolation,
                &[entry],
                format!(
                    "{}: fresh request returned status {}, expected 200",
                    entry.case.label(),
                    result.status
                ),
            ));
        } else if result.etag().is_none() {
            findings.push(Finding::unavailable(entry, "fresh response"));
        }
    }
    PredicateVerdict::from_findings(Predicate::Freshness, compared, findings)
}

fn distinctness(
    entries: &[ProbeEntry],
    groups: &Groups,
    accessor: Option<&FieldAccessor>,
) -> (PredicateVerdict, Option<bool>) {
    let originals: Vec<usize> = groups.originals().collect();
    let mut findings = Vec::new();
    let mut compared = false;
    let mut values_compared = false;
    let mut values_all_differ = true;

    for (n, &i) in originals.iter().enumerate() {
        for &j in &originals[n + 1..] {
            compared = true;
            let (a, b) = (&entries[i], &entries[j]);

            match (a.result.etag(), b.result.etag()) {
                (Some(ea), Some(eb)) if ea == eb => findings.push(Finding::new(
                    FindingKind::CorrectnessViolation,
                    &[a, b],
                    format!(
                        "{} and {}: different payloads share ETag {ea}",
                        a.case.label(),
                        b.case.label()
                    ),
                )),
                (Some(_), Some(_)) => {}
                (None, _) => findings.push(Finding::unavailable(a, "cannot compare ETags")),
                (_, None) => findings.push(Finding::unavailable(b, "cannot compare ETags")),
            }

            let Some(accessor) = accessor else { continue };
            let va = a.result.body.as_ref().and_then(|body| accessor(body));
            let vb = b.result.body.as_ref().and_then(|body| accessor(body));
            if let (Some(va), Some(vb)) = (va, vb) {
                values_compared = true;
                if va == vb {
                    values_all_differ = false;
                    findings.push(Finding::new(
                        FindingKind::CorrectnessViolation,
                        &[a, b],
                        format!(
                            "{} and {}: different payloads produced the same result {va}",
                            a.case.label(),
                            b.case.label()
                        ),
                    ));
                }
            }
        }
    }

    let verdict = PredicateVerdict::from_findings(Predicate::Distinctness, compared, findings);
    (verdict, values_compared.then_some(values_all_differ))
}

fn reuse(
    entries: &[ProbeEntry],
    groups: &Groups,
    accessor: Option<&FieldAccessor>,
) -> (PredicateVerdict, usize) {
    let mut findings = Vec::new();
    let mut compared = false;
    let mut not_modified = 0;

    for (o, r) in groups.repeats() {
        compared = true;
        let (original, repeat) = (&entries[o], &entries[r]);
        let labels = format!("{} repeating {}", repeat.case.label(), original.case.label());

        if repeat.result.is_transport_failure() {
            findings.push(Finding::unavailable(repeat, "repeat request failed"));
            continue;
        }
        let Some(original_etag) = original.result.etag() else {
            findings.push(Finding::unavailable(original, "no ETag to reuse"));
            continue;
        };

        match repeat.result.status {
            304 => match repeat.result.etag() {
                Some(etag) if etag == original_etag => not_modified += 1,
                Some(etag) => findings.push(Finding::new(
                    FindingKind::CorrectnessViolation,
                    &[original, repeat],
                    format!("{labels}: 304 with ETag {etag}, original was {original_etag}"),
                )),
                None => findings.push(Finding::unavailable(repeat, "cannot confirm reuse")),
            },
            200 => {
                match repeat.result.etag() {
                    Some(etag) if etag == original_etag => {}
                    Some(etag) => findings.push(Finding::new(
                        FindingKind::CorrectnessViolation,
                        &[original, repeat],
                        format!(
                            "{labels}: identical payload produced ETag {etag}, original was {original_etag}"
                        ),
                    )),
                    None => findings.push(Finding::unavailable(repeat, "cannot confirm reuse")),
                }
                if let Some(finding) = compare_bodies(original, repeat, accessor, &labels) {
                    findings.push(finding);
                }
            }
            status => findings.push(Finding::new(
                FindingKind::CorrectnessViolation,
                &[original, repeat],
                format!("{labels}: status {status}, expected 304 or 200"),
            )),
        }
    }

    (
        PredicateVerdict::from_findings(Predicate::Reuse, compared, findings),
        not_modified,
    )
}

/// Compares a repeated 200 with its original, by numeric field when an
/// accessor is configured and by whole body otherwise.
fn compare_bodies(
    original: &ProbeEntry,
    repeat: &ProbeEntry,
    accessor: Option<&FieldAccessor>,
    labels: &str,
) -> Option<Finding> {
    let (Some(ob), Some(rb)) = (&original.result.body, &repeat.result.body) else {
        return Some(Finding::new(
            FindingKind::Inconclusive,
            &[original, repeat],
            format!("{labels}: cannot confirm reuse, a response body is missing"),
        ));
    };

    match accessor {
        Some(accessor) => match (accessor(ob), accessor(rb)) {
            (Some(a), Some(b)) if a == b => None,
            (Some(a), Some(b)) => Some(Finding::new(
                FindingKind::CorrectnessViolation,
                &[original, repeat],
                format!("{labels}: identical payload produced result {b}, original was {a}"),
            )),
            _ => Some(Finding::new(
                FindingKind::Inconclusive,
                &[original, repeat],
                format!("{labels}: cannot confirm reuse, numeric field missing"),
            )),
        },
        None if ob == rb => None,
        None => Some(Finding::new(
            FindingKind::CorrectnessViolation,
            &[original, repeat],
            format!("{labels}: identical payload produced a different body"),
        )),
    }
}

fn etag_determinism(entries: &[ProbeEntry], groups: &Groups) -> PredicateVerdict {
    let mut findings = Vec::new();
    let mut compared = false;

    for group in &groups.groups {
        let tagged: Vec<&ProbeEntry> = group
            .iter()
            .map(|&i| &entries[i])
            .filter(|e| e.result.etag().is_some())
            .collect();
        if tagged.len() < 2 {
            continue;
        }
        compared = true;

        let mut etags: Vec<&str> = tagged.iter().filter_map(|e| e.result.etag()).collect();
        etags.sort_unstable();
        etags.dedup();
        if etags.len() > 1 {
            findings.push(Finding::new(
                FindingKind::CorrectnessViolation,
                &tagged,
                format!(
                    "payload {} produced differing ETags: {}",
                    tagged[0].case.fingerprint(),
                    etags.join(", ")
                ),
            ));
        }
    }

    PredicateVerdict::from_findings(Predicate::EtagDeterminism, compared, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_probe::case::RequestCase;
    use crate::cache_probe::result::ProbeResult;
    use chrono::Utc;
    use serde_json::json;

    fn payload_a() -> Value {
        json!({"architecture": "microservices", "traffic": {"daily_active_users": 10000}, "currency": "USD"})
    }

    fn payload_b() -> Value {
        json!({"architecture": "monolith", "traffic": {"daily_active_users": 50000}, "currency": "USD"})
    }

    fn ok(etag: &str, total: f64) -> ProbeResult {
        ProbeResult {
            status: 200,
            etag: Some(etag.to_string()),
            cache_control: Some("private, max-age=300".to_string()),
            body: Some(json!({"monthly_cost": {"total": total}})),
            error: None,
            conditional: false,
            elapsed_seconds: 0.01,
        }
    }

    fn not_modified(etag: Option<&str>) -> ProbeResult {
        ProbeResult {
            status: 304,
            etag: etag.map(String::from),
            cache_control: None,
            body: None,
            error: None,
            conditional: true,
            elapsed_seconds: 0.01,
        }
    }

    fn report(cases: Vec<(&str, Value, ProbeResult)>) -> ProbeReport {
        let entries = cases
            .into_iter()
            .map(|(label, payload, result)| ProbeEntry {
                case: RequestCase::new(label, payload).unwrap(),
                result,
            })
            .collect();
        ProbeReport::new("http://localhost:8000/estimate".into(), Utc::now(), entries, false)
    }

    fn total() -> FieldAccessor {
        json_pointer("/monthly_cost/total")
    }

    #[test]
    fn test_scenario_with_not_modified_passes() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 512.4)),
            ("b", payload_b(), ok("\"etag-b\"", 2310.0)),
            ("a-repeat", payload_a(), not_modified(Some("\"etag-a\""))),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert!(summary.passed(), "{:?}", summary);
        for predicate in Predicate::ALL {
            assert_eq!(summary.verdict(predicate), Verdict::Pass, "{predicate}");
        }
        assert_eq!(summary.not_modified_repeats, 1);
        assert_eq!(summary.same_input_same_etag, Some(true));
        assert_eq!(summary.different_input_different_value, Some(true));
    }

    #[test]
    fn test_repeat_served_by_identical_200_passes() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 512.4)),
            ("b", payload_b(), ok("\"etag-b\"", 2310.0)),
            ("a-repeat", payload_a(), ok("\"etag-a\"", 512.4)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert!(summary.passed());
        assert_eq!(summary.not_modified_repeats, 0);
        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Pass);
    }

    #[test]
    fn test_repeat_with_different_etag_is_flagged() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 512.4)),
            ("a-repeat", payload_a(), ok("\"etag-a2\"", 512.4)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert!(!summary.passed());
        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Fail);
        assert_eq!(summary.verdict(Predicate::EtagDeterminism), Verdict::Fail);
        assert_eq!(summary.same_input_same_etag, Some(false));
        assert!(summary.count(FindingKind::CorrectnessViolation) >= 2);
    }

    #[test]
    fn test_repeat_with_different_value_is_flagged() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 512.4)),
            ("a-repeat", payload_a(), ok("\"etag-a\"", 600.0)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Fail);
        assert_eq!(summary.verdict(Predicate::EtagDeterminism), Verdict::Pass);
        let finding = &summary.verdicts[2].findings[0];
        assert_eq!(finding.cases, vec!["a", "a-repeat"]);
        assert!(finding.message.contains("600"));
    }

    #[test]
    fn test_constant_result_fails_distinctness() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 100.0)),
            ("b", payload_b(), ok("\"etag-b\"", 100.0)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert_eq!(summary.verdict(Predicate::Distinctness), Verdict::Fail);
        assert_eq!(summary.different_input_different_value, Some(false));
        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::NotApplicable);
        assert_eq!(summary.same_input_same_etag, None);
    }

    #[test]
    fn test_shared_etag_fails_distinctness() {
        let report = report(vec![
            ("a", payload_a(), ok("\"same\"", 100.0)),
            ("b", payload_b(), ok("\"same\"", 200.0)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));
        assert_eq!(summary.verdict(Predicate::Distinctness), Verdict::Fail);
        assert_eq!(summary.different_input_different_value, Some(true));
    }

    #[test]
    fn test_missing_etag_is_protocol_violation() {
        let mut fresh = ok("", 100.0);
        fresh.etag = None;
        let report = report(vec![("a", payload_a(), fresh)]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert!(!summary.passed());
        assert_eq!(summary.protocol_violations.len(), 1);
        assert_eq!(summary.verdict(Predicate::Freshness), Verdict::Fail);
    }

    #[test]
    fn test_not_modified_without_etag_cannot_confirm_reuse() {
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 1.0)),
            ("a-repeat", payload_a(), not_modified(None)),
        ]);
        let summary = ProbeSummary::evaluate(&report, None);

        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Fail);
        assert_eq!(summary.protocol_violations.len(), 1);
        assert_eq!(summary.not_modified_repeats, 0);
    }

    #[test]
    fn test_transport_failure_is_reported_not_fatal() {
        let report = report(vec![
            (
                "a",
                payload_a(),
                ProbeResult::transport_failure("connection refused".into(), false, 0.0),
            ),
            ("b", payload_b(), ok("\"etag-b\"", 2.0)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert_eq!(summary.transport_failures.len(), 1);
        assert_eq!(summary.verdict(Predicate::Freshness), Verdict::Fail);
        assert!(summary.verdicts[0].findings[0].message.contains("connection refused"));
        assert_eq!(summary.verdicts[0].findings[0].kind, FindingKind::Inconclusive);
    }

    #[test]
    fn test_one_failed_case_is_counted_once() {
        let report = report(vec![
            (
                "a",
                payload_a(),
                ProbeResult::transport_failure("connection refused".into(), false, 0.0),
            ),
            ("b", payload_b(), ok("\"etag-b\"", 2.0)),
            ("a-repeat", payload_a(), ok("\"etag-a\"", 1.0)),
        ]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert_eq!(summary.count(FindingKind::Transport), 1);
        assert_eq!(summary.transport_failures.len(), 1);
        assert_eq!(summary.count(FindingKind::ProtocolViolation), 0);
        assert_eq!(summary.count(FindingKind::CorrectnessViolation), 0);
        assert!(summary.count(FindingKind::Inconclusive) >= 1);
        assert!(!summary.passed());
    }

    #[test]
    fn test_cancelled_report_does_not_pass() {
        let entries = vec![ProbeEntry {
            case: RequestCase::new("a", payload_a()).unwrap(),
            result: ok("\"etag-a\"", 1.0),
        }];
        let report = ProbeReport::new("http://localhost:8000/estimate".into(), Utc::now(), entries, true);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert!(summary.cancelled);
        assert_eq!(summary.verdict(Predicate::Freshness), Verdict::Pass);
        assert!(!summary.passed());
    }

    #[test]
    fn test_etag_drift_between_runs_is_flagged() {
        let mut history = EtagHistory::default();

        let first = report(vec![("a", payload_a(), ok("\"etag-a\"", 1.0))]);
        let summary = ProbeSummary::evaluate_with_history(&first, Some(&total()), &mut history);
        assert_eq!(summary.verdict(Predicate::EtagDeterminism), Verdict::NotApplicable);
        assert!(summary.passed());
        assert_eq!(history.len(), 1);

        let stable = report(vec![("a", payload_a(), ok("\"etag-a\"", 1.0))]);
        let summary = ProbeSummary::evaluate_with_history(&stable, Some(&total()), &mut history);
        assert_eq!(summary.verdict(Predicate::EtagDeterminism), Verdict::Pass);
        assert_eq!(summary.same_input_same_etag, Some(true));

        let drifted = report(vec![
            ("a", payload_a(), ok("\"etag-a2\"", 1.0)),
            ("a-repeat", payload_a(), not_modified(Some("\"etag-a2\""))),
        ]);
        let summary = ProbeSummary::evaluate_with_history(&drifted, Some(&total()), &mut history);
        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Pass);
        assert_eq!(summary.verdict(Predicate::EtagDeterminism), Verdict::Fail);
        assert_eq!(summary.same_input_same_etag, Some(false));
        assert_eq!(summary.count(FindingKind::CorrectnessViolation), 1);
        assert!(!summary.passed());

        let key = RequestCase::new("a", payload_a()).unwrap();
        assert_eq!(history.get(key.fingerprint()), Some("\"etag-a2\""));
    }

    #[test]
    fn test_without_accessor_compares_whole_bodies() {
        let mut changed = ok("\"etag-a\"", 1.0);
        changed.body = Some(json!({"monthly_cost": {"total": 1.0}, "generated_at": "later"}));
        let report = report(vec![
            ("a", payload_a(), ok("\"etag-a\"", 1.0)),
            ("a-repeat", payload_a(), changed),
        ]);
        let summary = ProbeSummary::evaluate(&report, None);

        assert_eq!(summary.verdict(Predicate::Reuse), Verdict::Fail);
        assert_eq!(summary.different_input_different_value, None);
    }

    #[test]
    fn test_body_without_numeric_field_is_protocol_violation() {
        let mut odd = ok("\"etag-a\"", 1.0);
        odd.body = Some(json!({"error": "unsupported architecture"}));
        let report = report(vec![("a", payload_a(), odd)]);
        let summary = ProbeSummary::evaluate(&report, Some(&total()));

        assert_eq!(summary.protocol_violations.len(), 1);
        assert!(!summary.passed());
    }

    #[test]
    fn test_empty_report_is_not_applicable() {
        let summary = ProbeSummary::evaluate(&report(vec![]), None);
        for predicate in Predicate::ALL {
            assert_eq!(summary.verdict(predicate), Verdict::NotApplicable);
        }
        assert!(summary.passed());
    }

    #[test]
    fn test_json_pointer_reads_nested_numbers() {
        let accessor = json_pointer("/monthly_cost/total");
        assert_eq!(accessor(&json!({"monthly_cost": {"total": 3}})), Some(3.0));
        assert_eq!(accessor(&json!({"monthly_cost": {"total": "3"}})), None);
        assert_eq!(accessor(&json!({})), None);
    }
}
