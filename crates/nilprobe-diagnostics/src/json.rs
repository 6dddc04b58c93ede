//! Machine-readable JSON output.

use serde::{Deserialize, Serialize};

use crate::diagnostic::{AnalysisSummary, Diagnostic};

/// Top-level JSON document written by `--format json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub tool: String,
    pub version: String,
    pub summary: AnalysisSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl JsonReport {
    pub fn new(diagnostics: &[Diagnostic], summary: &AnalysisSummary, version: &str) -> Self {
        Self {
            tool: "nilprobe".into(),
            version: version.into(),
            summary: summary.clone(),
            diagnostics: diagnostics.to_vec(),
        }
    }
}

/// Pretty-printed JSON report.
pub fn to_json(
    diagnostics: &[Diagnostic],
    summary: &AnalysisSummary,
    version: &str,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport::new(diagnostics, summary, version))
}
