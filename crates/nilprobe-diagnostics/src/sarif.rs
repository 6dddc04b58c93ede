//! SARIF v2.1.0 output formatter for CI/CD integration.
//!
//! Each diagnostic becomes one result; its trace is rendered as a single
//! code flow so viewers can step from the call site to the dereference.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostic::{Diagnostic, Location, Severity};

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

// ---------------------------------------------------------------------------
// SARIF v2.1.0 data model
// ---------------------------------------------------------------------------

/// SARIF v2.1.0 root object.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub short_description: SarifMessage,
    pub default_configuration: SarifRuleConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRuleConfig {
    pub level: String,
}

/// A SARIF result (one fault trace).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_locations: Vec<SarifLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub code_flows: Vec<SarifCodeFlow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<SarifMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifArtifactLocation {
    pub uri: String,
}

/// A region within a file (1-based).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRegion {
    pub start_line: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub start_column: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifCodeFlow {
    pub thread_flows: Vec<SarifThreadFlow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifThreadFlow {
    pub locations: Vec<SarifThreadFlowLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifThreadFlowLocation {
    pub location: SarifLocation,
    pub nesting_level: u32,
}

// ---------------------------------------------------------------------------
// Conversion functions
// ---------------------------------------------------------------------------

/// Convert diagnostics to a pretty-printed SARIF JSON string.
pub fn to_sarif(diagnostics: &[Diagnostic], version: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_sarif_log(diagnostics, version))
}

/// Convert diagnostics to a [`SarifLog`] struct.
pub fn to_sarif_log(diagnostics: &[Diagnostic], version: &str) -> SarifLog {
    let rules = collect_rules(diagnostics);
    let results = diagnostics.iter().map(diagnostic_to_sarif_result).collect();

    SarifLog {
        schema: SARIF_SCHEMA.into(),
        version: "2.1.0".into(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "nilprobe".into(),
                    version: version.into(),
                    rules,
                },
            },
            results,
        }],
    }
}

fn severity_to_sarif_level(severity: Severity) -> String {
    match severity {
        Severity::Critical | Severity::Error => "error".into(),
        Severity::Warning => "warning".into(),
        Severity::Info => "note".into(),
    }
}

fn sarif_location(loc: &Location, message: Option<String>) -> SarifLocation {
    SarifLocation {
        physical_location: SarifPhysicalLocation {
            artifact_location: SarifArtifactLocation {
                uri: loc.file.clone(),
            },
            region: SarifRegion {
                start_line: loc.line.max(1),
                start_column: loc.column,
            },
        },
        message: message.map(|text| SarifMessage { text }),
    }
}

fn diagnostic_to_sarif_result(diag: &Diagnostic) -> SarifResult {
    let related_locations = diag
        .root_cause
        .iter()
        .map(|rc| sarif_location(&rc.location, Some(rc.description.clone())))
        .collect();

    // Calls nest one level deeper per step, the dereference is the innermost.
    let code_flows = if diag.trace.is_empty() {
        vec![]
    } else {
        let locations = diag
            .trace
            .iter()
            .enumerate()
            .map(|(depth, line)| SarifThreadFlowLocation {
                location: sarif_location(&line.location, Some(line.source.clone())),
                nesting_level: depth as u32,
            })
            .collect();
        vec![SarifCodeFlow {
            thread_flows: vec![SarifThreadFlow { locations }],
        }]
    };

    let message_text = if diag.explanation.is_empty() {
        diag.title.clone()
    } else {
        diag.explanation.clone()
    };

    SarifResult {
        rule_id: diag.rule.clone(),
        level: severity_to_sarif_level(diag.severity),
        message: SarifMessage { text: message_text },
        locations: vec![sarif_location(&diag.location, None)],
        related_locations,
        code_flows,
    }
}

/// Unique rule definitions, first occurrence wins.
fn collect_rules(diagnostics: &[Diagnostic]) -> Vec<SarifRule> {
    let mut seen: BTreeMap<&str, SarifRule> = BTreeMap::new();
    for diag in diagnostics {
        seen.entry(diag.rule.as_str()).or_insert_with(|| SarifRule {
            id: diag.rule.clone(),
            short_description: SarifMessage {
                text: diag.title.clone(),
            },
            default_configuration: SarifRuleConfig {
                level: severity_to_sarif_level(diag.severity),
            },
        });
    }
    seen.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
