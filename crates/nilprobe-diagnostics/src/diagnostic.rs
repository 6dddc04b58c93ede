//! Core diagnostic types for nilprobe.
//!
//! The analyzer produces one `Diagnostic` per fault trace, and all formatters
//! (text, JSON, SARIF) consume them.

use serde::{Deserialize, Serialize};

/// A diagnostic produced by the nil analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unique ID: RULE_CODE-file:line:col (e.g., "NIL001-handler.go:18:5").
    pub id: String,
    /// Rule code ("NIL001").
    pub rule: String,
    pub severity: Severity,
    /// One-line summary.
    pub title: String,
    /// Detailed explanation of why this is a bug.
    pub explanation: String,
    /// Where the dereference happens (the last trace step).
    pub location: Location,
    /// Fully qualified name of the function containing the dereference.
    pub function: String,
    /// Where the nil value enters the path, when that is a different step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<RootCause>,
    /// Steps from the outermost analyzed function down to the dereference.
    pub trace: Vec<TraceLine>,
}

impl Diagnostic {
    /// Key identifying the same fault reached along the same path.
    pub fn signature(&self) -> Vec<String> {
        self.trace
            .iter()
            .map(|l| format!("{}|{}", l.location, l.source))
            .collect()
    }
}

/// Severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Critical safety issue (nil deref).
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Source code location.
///
/// Lines and columns are 1-based (matching Go's `token.Position`).
/// A zero line means the frontend supplied no position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Self::new("-", 0, 0)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One located step of a fault trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLine {
    pub location: Location,
    /// Source rendering of the step (call expression or dereferenced value).
    pub source: String,
    /// Function containing the step.
    pub function: String,
}

/// Root cause information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub location: Location,
    pub description: String,
}

/// Builder for creating diagnostics conveniently.
pub struct DiagnosticBuilder {
    rule: String,
    severity: Severity,
    title: String,
    location: Location,
    function: String,
    explanation: String,
    root_cause: Option<RootCause>,
    trace: Vec<TraceLine>,
}

impl DiagnosticBuilder {
    pub fn new(rule: impl Into<String>, severity: Severity, title: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            title: title.into(),
            location: Location::unknown(),
            function: String::new(),
            explanation: String::new(),
            root_cause: None,
            trace: Vec::new(),
        }
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn root_cause(mut self, location: Location, description: impl Into<String>) -> Self {
        self.root_cause = Some(RootCause {
            location,
            description: description.into(),
        });
        self
    }

    pub fn trace(mut self, trace: Vec<TraceLine>) -> Self {
        self.trace = trace;
        self
    }

    /// Build the diagnostic.
    pub fn build(self) -> Diagnostic {
        let id = format!("{}-{}", self.rule, self.location);
        Diagnostic {
            id,
            rule: self.rule,
            severity: self.severity,
            title: self.title,
            explanation: self.explanation,
            location: self.location,
            function: self.function,
            root_cause: self.root_cause,
            trace: self.trace,
        }
    }
}

/// Summary of analysis results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Number of reported traces.
    pub traces: usize,
    /// Number of distinct dereference sites among them.
    pub sites: usize,
    pub functions_analyzed: usize,
    /// Traces dropped by `max_traces`.
    pub truncated: usize,
    pub analysis_time_ms: u64,
}

impl AnalysisSummary {
    pub fn from_diagnostics(
        diagnostics: &[Diagnostic],
        functions_analyzed: usize,
        analysis_time_ms: u64,
    ) -> Self {
        let sites: std::collections::HashSet<&Location> =
            diagnostics.iter().map(|d| &d.location).collect();
        Self {
            traces: diagnostics.len(),
            sites: sites.len(),
            functions_analyzed,
            truncated: 0,
            analysis_time_ms,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.traces == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(file: &str, l: u32, source: &str) -> TraceLine {
        TraceLine {
            location: Location::new(file, l, 2),
            source: source.into(),
            function: "testdata.nilArg".into(),
        }
    }

    fn sample() -> Diagnostic {
        DiagnosticBuilder::new("NIL001", Severity::Critical, "possible nil pointer dereference")
            .location(Location::new("testdata.go", 18, 6))
            .function("testdata.expectNonNilParam")
            .explanation("In function `expectNonNilParam`, `a` may be nil when dereferenced")
            .root_cause(Location::new("testdata.go", 44, 2), "nil flows in through `expectNonNilParam(nil)`")
            .trace(vec![
                line("testdata.go", 44, "expectNonNilParam(nil)"),
                line("testdata.go", 18, "a"),
            ])
            .build()
    }

    #[test]
    fn test_diagnostic_builder() {
        let diag = sample();
        assert_eq!(diag.id, "NIL001-testdata.go:18:6");
        assert_eq!(diag.rule, "NIL001");
        assert_eq!(diag.severity, Severity::Critical);
        assert_eq!(diag.function, "testdata.expectNonNilParam");
        assert_eq!(diag.trace.len(), 2);
        assert!(diag.root_cause.is_some());
    }

    #[test]
    fn test_builder_defaults() {
        let diag = DiagnosticBuilder::new("NIL001", Severity::Critical, "t").build();
        assert_eq!(diag.location, Location::unknown());
        assert_eq!(diag.id, "NIL001--:0:0");
        assert!(diag.trace.is_empty());
    }

    #[test]
    fn test_signature_ignores_ids() {
        let a = sample();
        let mut b = sample();
        b.id = "other".into();
        b.explanation.clear();
        assert_eq!(a.signature(), b.signature());
        b.trace.pop();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_analysis_summary() {
        let mut other_path = sample();
        other_path.trace.remove(0);
        let diagnostics = vec![sample(), other_path];
        let summary = AnalysisSummary::from_diagnostics(&diagnostics, 6, 12);
        assert_eq!(summary.traces, 2);
        assert_eq!(summary.sites, 1);
        assert_eq!(summary.functions_analyzed, 6);
        assert!(!summary.is_clean());
        assert!(AnalysisSummary::from_diagnostics(&[], 1, 0).is_clean());
    }

    #[test]
    fn test_diagnostic_json_roundtrip() {
        let diag = sample();
        let json = serde_json::to_string_pretty(&diag).unwrap();
        let parsed: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, diag);
    }

    #[test]
    fn test_root_cause_omitted_from_json_when_absent() {
        let mut diag = sample();
        diag.root_cause = None;
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("root_cause"));
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("handler.go", 18, 5).to_string(), "handler.go:18:5");
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
