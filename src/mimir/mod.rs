use client::prometheus::prompb;

use crate::cache_probe::prelude::*;

pub mod client;

const INSTANCE_LABEL: &str = "instance";
const JOB_LABEL: &str = "job";
const MODULE_LABEL: &str = "module";
const TARGET_LABEL: &str = "target";
const CASE_LABEL: &str = "case";
const PREDICATE_LABEL: &str = "predicate";
const KIND_LABEL: &str = "kind";
const PROBE_SUCCESS_METRIC: &str = "cache_probe_success";
const PROBE_DURATION_METRIC: &str = "cache_probe_duration_seconds";
const PROBE_PREDICATE_METRIC: &str = "cache_probe_predicate_success";
const PROBE_HTTP_STATUS_METRIC: &str = "cache_probe_http_status_code";
const PROBE_HTTP_DURATION_METRIC: &str = "cache_probe_http_duration_seconds";
const PROBE_FINDINGS_METRIC: &str = "cache_probe_findings";

const CACHEBOX_JOB: &str = "cachebox";
const CACHE_MODULE: &str = "cache_probe";

fn create_time_series(
    metric_name: &str,
    target: &str,
    instance: &str,
    value: f64,
    additional_labels: &[(&str, &str)],
) -> prompb::TimeSeries {
    let mut labels: Vec<(&str, &str)> = vec![
        (INSTANCE_LABEL, instance),
        (JOB_LABEL, CACHEBOX_JOB),
        (MODULE_LABEL, CACHE_MODULE),
        (TARGET_LABEL, target),
    ];
    labels.extend_from_slice(additional_labels);

    client::create_time_series(metric_name, &labels, value, None)
}

fn as_gauge(ok: bool) -> f64 {
    if ok { 1.0 } else { 0.0 }
}

/// Creates the metrics describing one probe run.
/// The metrics include:
///    - `cache_probe_success`: 1.0 when every predicate held and no protocol violation was seen.
///    - `cache_probe_duration_seconds`: summed request time of the run.
///    - `cache_probe_predicate_success{predicate}`: one series per applicable predicate.
///    - `cache_probe_http_status_code{case}`: status per case, 0 for transport failures.
///    - `cache_probe_http_duration_seconds{case}`: request time per case.
///    - `cache_probe_findings{kind}`: number of findings per kind.
pub fn create_report_metrics(
    target: &str,
    report: &ProbeReport,
    summary: &ProbeSummary,
) -> Vec<prompb::TimeSeries> {
    let instance = report.endpoint();
    let mut metrics = vec![
        create_time_series(
            PROBE_SUCCESS_METRIC,
            target,
            instance,
            as_gauge(summary.passed()),
            &[],
        ),
        create_time_series(
            PROBE_DURATION_METRIC,
            target,
            instance,
            report.total_seconds(),
            &[],
        ),
    ];

    for verdict in &summary.verdicts {
        if verdict.verdict == Verdict::NotApplicable {
            continue;
        }
        metrics.push(create_time_series(
            PROBE_PREDICATE_METRIC,
            target,
            instance,
            as_gauge(verdict.verdict == Verdict::Pass),
            &[(PREDICATE_LABEL, verdict.predicate.name())],
        ));
    }

    for entry in report.entries() {
        let case = [(CASE_LABEL, entry.case.label())];
        metrics.push(create_time_series(
            PROBE_HTTP_STATUS_METRIC,
            target,
            instance,
            f64::from(entry.result.status),
            &case,
        ));
        metrics.push(create_time_series(
            PROBE_HTTP_DURATION_METRIC,
            target,
            instance,
            entry.result.elapsed_seconds,
            &case,
        ));
    }

    for kind in [
        FindingKind::Transport,
        FindingKind::ProtocolViolation,
        FindingKind::CorrectnessViolation,
        FindingKind::Inconclusive,
    ] {
        metrics.push(create_time_series(
            PROBE_FINDINGS_METRIC,
            target,
            instance,
            summary.count(kind) as f64,
            &[(KIND_LABEL, kind.name())],
        ));
    }

    metrics
}
