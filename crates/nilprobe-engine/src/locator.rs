//! Turning trace steps into printable lines.

use std::collections::HashMap;

use nilprobe_diagnostics::diagnostic::{Location, TraceLine};
use nilprobe_ir::ir::Span;

use crate::sink::TraceStep;

/// Resolves a trace step to a location and the source text shown for it.
pub trait SourceLocator {
    fn locate(&mut self, step: &TraceStep<'_>) -> TraceLine;
}

/// Locator backed by the spans in the IR.
///
/// Source text is the frontend's rendering when present, else the spanned
/// text read from disk, else the SSA value name. Files are read at most once.
#[derive(Debug, Default)]
pub struct SpanLocator {
    file_cache: HashMap<String, Vec<String>>,
}

impl SpanLocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn source_line(&mut self, file: &str, line: u32) -> Option<&str> {
        if !self.file_cache.contains_key(file) {
            let lines = match std::fs::read_to_string(file) {
                Ok(content) => content.lines().map(String::from).collect(),
                Err(e) => {
                    tracing::debug!(file, error = %e, "source file not readable");
                    Vec::new()
                }
            };
            self.file_cache.insert(file.to_string(), lines);
        }
        let lines = self.file_cache.get(file)?;
        lines.get(line.checked_sub(1)? as usize).map(String::as_str)
    }

    /// Text covered by a single-line span. Columns are 1-based byte offsets.
    fn span_text(&mut self, span: &Span) -> Option<String> {
        if span.end_line != span.start_line || span.end_col <= span.start_col {
            return None;
        }
        let line = self.source_line(&span.file, span.start_line)?;
        let start = span.start_col.checked_sub(1)? as usize;
        let end = span.end_col.checked_sub(1)? as usize;
        line.get(start..end).map(|s| s.trim().to_string())
    }
}

impl SourceLocator for SpanLocator {
    fn locate(&mut self, step: &TraceStep<'_>) -> TraceLine {
        let instr = step.instruction;
        let location = instr
            .span
            .as_ref()
            .map(|s| Location::new(&s.file, s.start_line, s.start_col))
            .unwrap_or_else(Location::unknown);
        let source = match (&instr.source, &instr.span) {
            (Some(text), _) => text.clone(),
            (None, Some(span)) => self
                .span_text(span)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| instr.name.clone()),
            (None, None) => instr.name.clone(),
        };
        TraceLine {
            location,
            source,
            function: step.function.name.clone(),
        }
    }
}

/// Locate every step of a trace, outermost first.
pub fn locate_trace<L: SourceLocator>(locator: &mut L, trace: &[TraceStep<'_>]) -> Vec<TraceLine> {
    trace.iter().map(|step| locator.locate(step)).collect()
}
