//! Fault reporting.
//!
//! The evaluator reports every confirmed dereference of a possibly-zero
//! pointer as soon as it finds it. Traces stay as borrowed IR references
//! until the analysis pass is over; locating them is a separate step.

use std::cell::RefCell;

use nilprobe_ir::ir::{Function, Instruction};

/// One step of a trace: an instruction and the function containing it.
#[derive(Debug, Clone, Copy)]
pub struct TraceStep<'p> {
    pub function: &'p Function,
    pub instruction: &'p Instruction,
}

impl<'p> TraceStep<'p> {
    pub fn new(function: &'p Function, instruction: &'p Instruction) -> Self {
        Self {
            function,
            instruction,
        }
    }
}

// Steps are IR positions, so identity is by reference.
impl PartialEq for TraceStep<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.function, other.function)
            && std::ptr::eq(self.instruction, other.instruction)
    }
}

impl Eq for TraceStep<'_> {}

/// Call steps from the outermost analyzed function, ending at the
/// dereferencing instruction.
pub type Trace<'p> = Vec<TraceStep<'p>>;

/// Receives faults as they are discovered.
pub trait FaultSink<'p> {
    fn report(&self, trace: Trace<'p>);
}

impl<'p, S: FaultSink<'p> + ?Sized> FaultSink<'p> for &S {
    fn report(&self, trace: Trace<'p>) {
        (**self).report(trace)
    }
}

/// Append-only list of traces, in discovery order.
#[derive(Debug, Default)]
pub struct TraceCollector<'p> {
    traces: RefCell<Vec<Trace<'p>>>,
}

impl<'p> TraceCollector<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_traces(self) -> Vec<Trace<'p>> {
        self.traces.into_inner()
    }
}

impl<'p> FaultSink<'p> for TraceCollector<'p> {
    fn report(&self, trace: Trace<'p>) {
        tracing::debug!(
            function = %trace.last().map(|s| s.function.name.as_str()).unwrap_or("?"),
            steps = trace.len(),
            "possible nil dereference"
        );
        self.traces.borrow_mut().push(trace);
    }
}
