//! Human-readable diagnostic output.
//!
//! One line per trace step, outermost call first. Continuation steps are
//! indented with a tab so a trace reads as a block:
//!
//! ```text
//! testdata.go:44:19: possible nil pointer dereference: expectNonNilParam(nil)
//!     testdata.go:18:6: possible nil pointer dereference: a
//! ```

use std::fmt::Write as _;

use crate::diagnostic::{AnalysisSummary, Diagnostic};

/// Format diagnostics as trace blocks.
pub fn format_text(diags: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diags {
        for (i, line) in diag.trace.iter().enumerate() {
            if i > 0 {
                out.push('\t');
            }
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{}: {}: {}", line.location, diag.title, line.source);
        }
    }
    out
}

/// One-line run summary, written to stderr by the CLI.
pub fn format_summary(summary: &AnalysisSummary) -> String {
    if summary.is_clean() {
        return format!(
            "No issues found ({} functions analyzed in {}ms)\n",
            summary.functions_analyzed, summary.analysis_time_ms
        );
    }
    let mut line = format!(
        "Found {} trace(s) at {} dereference site(s) ({} functions analyzed in {}ms)",
        summary.traces, summary.sites, summary.functions_analyzed, summary.analysis_time_ms
    );
    if summary.truncated > 0 {
        let _ = write!(line, "; {} more trace(s) not shown", summary.truncated);
    }
    line.push('\n');
    line
}
