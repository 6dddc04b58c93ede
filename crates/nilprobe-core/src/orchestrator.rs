//! Analysis orchestrator: load IR, run the nil analysis, post-process.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use nilprobe_diagnostics::diagnostic::{AnalysisSummary, Diagnostic};
use nilprobe_engine::NilAnalyzer;
use nilprobe_ir::ir::AnalysisInput;
use nilprobe_ir::LoadError;

use crate::config::Config;

/// Complete output from an analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub summary: AnalysisSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no IR files given")]
    NoInput,
}

/// Load every IR document in `paths` and analyze them as one program.
///
/// Packages of later documents are appended to the first, so calls across
/// documents resolve. The documents must come from one frontend run: type
/// ids are shared.
pub fn analyze_files(paths: &[PathBuf], config: &Config) -> Result<AnalysisOutput, OrchestratorError> {
    let ir = load_program(paths)?;
    Ok(analyze_ir(&ir, config))
}

pub fn load_program(paths: &[PathBuf]) -> Result<AnalysisInput, OrchestratorError> {
    let mut docs = paths.iter().map(|p| nilprobe_ir::load_json_file(p));
    let mut program = docs.next().ok_or(OrchestratorError::NoInput)??;
    for doc in docs {
        program.packages.extend(doc?.packages);
    }
    Ok(program)
}

/// Convenience for a single document.
pub fn analyze_file(path: &Path, config: &Config) -> Result<AnalysisOutput, OrchestratorError> {
    analyze_files(&[path.to_path_buf()], config)
}

/// Run the analysis on already-loaded IR.
/// Used by both the CLI and tests (from fixtures).
pub fn analyze_ir(ir: &AnalysisInput, config: &Config) -> AnalysisOutput {
    let start = Instant::now();
    let report = NilAnalyzer::run(ir, &config.analysis);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let output = postprocess_diagnostics(report.diagnostics, config, report.functions_analyzed, elapsed_ms);
    tracing::info!(
        packages = ir.packages.len(),
        functions = output.summary.functions_analyzed,
        traces = output.summary.traces,
        truncated = output.summary.truncated,
        elapsed_ms,
        "nil analysis finished"
    );
    output
}

/// Optional de-duplication, then truncation to `max_traces`. Order is the
/// engine's discovery order throughout.
fn postprocess_diagnostics(
    mut diags: Vec<Diagnostic>,
    config: &Config,
    functions_analyzed: usize,
    elapsed_ms: u64,
) -> AnalysisOutput {
    if config.output.dedupe {
        let mut seen = HashSet::new();
        diags.retain(|d| seen.insert(d.signature()));
    }

    let max = config.output.max_traces;
    let mut truncated = 0;
    if max > 0 && diags.len() > max {
        truncated = diags.len() - max;
        diags.truncate(max);
    }

    let mut summary = AnalysisSummary::from_diagnostics(&diags, functions_analyzed, elapsed_ms);
    summary.truncated = truncated;

    AnalysisOutput {
        diagnostics: diags,
        summary,
    }
}
