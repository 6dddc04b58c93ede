//! Nil safety rules.

use nilprobe_diagnostics::diagnostic::{Diagnostic, DiagnosticBuilder, Location, Severity, TraceLine};

pub const NIL001: &str = "NIL001";
pub const NIL001_TITLE: &str = "possible nil pointer dereference";

/// NIL001: possible nil pointer dereference, with the located trace.
///
/// The last line is the dereference. When the trace passes through calls,
/// the first line is where the nil value enters the path.
pub fn build_nil001(trace: Vec<TraceLine>, func_name: &str) -> Diagnostic {
    let (location, function, site) = match trace.last() {
        Some(last) => (last.location.clone(), last.function.clone(), last.source.clone()),
        None => (Location::unknown(), String::new(), String::new()),
    };
    let mut builder = DiagnosticBuilder::new(NIL001, Severity::Critical, NIL001_TITLE)
        .location(location)
        .function(function)
        .explanation(format!(
            "In function `{func_name}`, `{site}` may dereference a nil pointer"
        ));
    if trace.len() > 1 {
        let entry = &trace[0];
        builder = builder.root_cause(
            entry.location.clone(),
            format!("nil flows in through `{}`", entry.source),
        );
    }
    builder.trace(trace).build()
}
