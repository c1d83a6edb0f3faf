//! # Failure Reporting
//!
//! Buckets aggregated resolution failures into missing, invalid and
//! invalid-configuration groups and renders a deterministic categorized
//! report. The report content depends only on the failure list, so the
//! same failures always produce the same text.

use std::io::Write;

use crate::errors::{Failure, FailureKind};
use crate::resolver::SourceMap;

const RULE: &str = "================================";

/// Receives the aggregated failures and the raw source a resolution pass
/// read from. The default writes a framed report to stderr; applications
/// substitute their own via the options.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failures: &[Failure], source: &SourceMap);
}

/// Default reporter: framed categorized report on stderr, flushed so it
/// survives an immediately following process exit.
pub struct StderrReporter;

impl FailureReporter for StderrReporter {
    fn report(&self, failures: &[Failure], _source: &SourceMap) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(render_report(failures).as_bytes());
        let _ = stderr.flush();
    }
}

/// Render the categorized report. Buckets appear in a fixed order; within
/// a bucket, failures keep spec declaration order.
pub fn render_report(failures: &[Failure]) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');

    push_bucket(
        &mut out,
        "Missing environment variables:",
        failures,
        FailureKind::Missing,
    );
    push_bucket(
        &mut out,
        "Invalid environment variables:",
        failures,
        FailureKind::Invalid,
    );
    push_bucket(
        &mut out,
        "Invalid validator configuration:",
        failures,
        FailureKind::InvalidConfig,
    );

    out.push_str(RULE);
    out.push('\n');
    out
}

fn push_bucket(out: &mut String, heading: &str, failures: &[Failure], kind: FailureKind) {
    let mut wrote_heading = false;
    for failure in failures.iter().filter(|f| f.kind == kind) {
        if !wrote_heading {
            out.push(' ');
            out.push_str(heading);
            out.push('\n');
            wrote_heading = true;
        }
        out.push_str("    ");
        out.push_str(&failure.key);
        out.push_str(": ");
        out.push_str(&failure.summary());
        out.push('\n');
    }
}
