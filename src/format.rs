//! Console rendering of probe reports. The harness itself never prints.

use std::fmt::Write;

use unicode_truncate::UnicodeTruncateStr;

use crate::cache_probe::prelude::*;

pub fn to_fixed_width(input: &str, width: usize) -> String {
    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

fn mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

fn fact(value: Option<bool>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// Renders reports line by line, prefixing each line with a padded target name.
pub struct ReportPrinter<'a> {
    prefix: String,
    accessor: Option<&'a FieldAccessor>,
}

impl<'a> ReportPrinter<'a> {
    pub fn new(target: &str, width: usize, accessor: Option<&'a FieldAccessor>) -> Self {
        Self {
            prefix: format!("[{}]", to_fixed_width(target, width)),
            accessor,
        }
    }

    pub fn render(&self, report: &ProbeReport, summary: &ProbeSummary) -> String {
        let mut out = String::new();
        let p = &self.prefix;

        let _ = writeln!(
            out,
            "{p} {} Endpoint: {}, Cases: {}, Elapsed: {:.2}ms, Started: {}",
            mark(summary.passed()),
            report.endpoint(),
            report.entries().len(),
            report.total_seconds() * 1000.0,
            report.started_at().format("%Y-%m-%dT%H:%M:%SZ")
        );

        for entry in report.entries() {
            let _ = writeln!(out, "{p}   {}", self.render_entry(entry));
        }

        if report.cancelled() {
            let _ = writeln!(out, "{p}   ⚠️  Run cancelled, remaining cases skipped");
        }

        for verdict in &summary.verdicts {
            let symbol = match verdict.verdict {
                Verdict::Pass => "✅",
                Verdict::Fail => "❌",
                Verdict::NotApplicable => "➖",
            };
            let _ = writeln!(out, "{p}   {symbol} {}", verdict.predicate);
        }

        let _ = writeln!(
            out,
            "{p}   Same input → Same ETag: {}",
            fact(summary.same_input_same_etag)
        );
        let _ = writeln!(
            out,
            "{p}   Different inputs → Different costs: {}",
            fact(summary.different_input_different_value)
        );
        if summary.not_modified_repeats > 0 {
            let _ = writeln!(
                out,
                "{p}   Repeats served by 304 Not Modified: {}",
                summary.not_modified_repeats
            );
        }

        for finding in summary.findings() {
            let _ = writeln!(out, "{p}   [{}] {}", finding.kind.name(), finding.message);
        }

        out
    }

    fn render_entry(&self, entry: &ProbeEntry) -> String {
        let result = &entry.result;
        let label = entry.case.label();

        if result.is_transport_failure() {
            return format!(
                "❌ {label}: no response: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut line = format!(
            "{} {label}: Status: {}, ETag: {}, Cache-Control: {}, Elapsed: {:.2}ms",
            mark(matches!(result.status, 200 | 304)),
            result.status,
            result.etag.as_deref().unwrap_or("N/A"),
            result.cache_control.as_deref().unwrap_or("N/A"),
            result.elapsed_seconds * 1000.0
        );
        if result.conditional {
            line.push_str(", If-None-Match sent");
        }
        if let Some(value) = self
            .accessor
            .zip(result.body.as_ref())
            .and_then(|(accessor, body)| accessor(body))
        {
            let _ = write!(line, ", Value: {value:.2}");
        }
        if let Some(error) = &result.error {
            let _ = write!(line, ", Error: {error}");
        }
        line
    }
}
