//! Interprocedural symbolic evaluation.
//!
//! The engine walks each function's CFG from its entry block, computing the
//! abstract state of values on demand. Calls to functions with a body are
//! evaluated in a fresh [`Frame`] whose parameters stay bound to the caller's
//! values, so a `nil` argument is seen where the callee dereferences it.
//!
//! Every `FieldAddr` whose base may be zero is reported to the [`FaultSink`]
//! as soon as it is found. The engine never deduplicates.

use std::cell::Cell;

use nilprobe_diagnostics::diagnostic::Diagnostic;
use nilprobe_ir::ir::{AnalysisInput, BasicBlock, Instruction, ValueKind};
use nilprobe_ir::program::{FunctionView, ProgramIndex};
use serde::{Deserialize, Serialize};

use crate::frame::{ArgShape, Frame, Slot};
use crate::lattice::{const_is_zero, operand_pairs, AbstractState, BinOpClass, Outcome};
use crate::locator::{locate_trace, SpanLocator};
use crate::rules;
use crate::sink::{FaultSink, TraceCollector};

const NO_BINDINGS: &[u32] = &[];

/// Resource bounds of one analysis pass. Also the `[analysis]` table of
/// `nilprobe.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NilOptions {
    /// Calls deeper than this below a seed are not followed.
    pub max_call_depth: usize,
    /// A call is not followed when the same callee, with arguments of the
    /// same zero/non-zero shape, is already this many times on the frame
    /// chain.
    pub max_reentry: usize,
    /// Blocks a single frame may visit before it stops exploring.
    pub max_block_visits: usize,
    /// Callee frames opened while analyzing one function. Calls past the
    /// budget yield no information.
    pub max_frames: usize,
    /// Cache value states per frame.
    pub memoize: bool,
}

impl Default for NilOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_reentry: 2,
            max_block_visits: 4096,
            max_frames: 10_000,
            memoize: true,
        }
    }
}

/// Result of [`NilAnalyzer::run`].
#[derive(Debug, Clone)]
pub struct NilReport {
    /// One diagnostic per trace, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    pub functions_analyzed: usize,
}

pub struct NilAnalyzer;

impl NilAnalyzer {
    /// Analyze every function in `input` and return one diagnostic per trace.
    pub fn analyze(input: &AnalysisInput) -> Vec<Diagnostic> {
        Self::analyze_with_options(input, &NilOptions::default())
    }

    pub fn analyze_with_options(input: &AnalysisInput, options: &NilOptions) -> Vec<Diagnostic> {
        Self::run(input, options).diagnostics
    }

    pub fn run(input: &AnalysisInput, options: &NilOptions) -> NilReport {
        let program = ProgramIndex::new(input);
        let collector = TraceCollector::new();
        let functions_analyzed = Engine::new(&program, &collector, options.clone()).run();

        let mut locator = SpanLocator::new();
        let diagnostics = collector
            .into_traces()
            .iter()
            .filter_map(|trace| {
                let fault = trace.last()?;
                let lines = locate_trace(&mut locator, trace);
                Some(rules::build_nil001(lines, &fault.function.short_name))
            })
            .collect();

        NilReport {
            diagnostics,
            functions_analyzed,
        }
    }
}

/// The evaluator proper. Faults go to `sink`.
pub struct Engine<'p, S> {
    program: &'p ProgramIndex<'p>,
    sink: S,
    options: NilOptions,
    frames_opened: Cell<usize>,
}

impl<'p, S: FaultSink<'p>> Engine<'p, S> {
    pub fn new(program: &'p ProgramIndex<'p>, sink: S, options: NilOptions) -> Self {
        Self {
            program,
            sink,
            options,
            frames_opened: Cell::new(0),
        }
    }

    /// Seed a context-free frame for every function with a body, in input
    /// order. Returns the number of functions analyzed.
    pub fn run(&self) -> usize {
        let mut analyzed = 0;
        for view in self.program.functions() {
            if !view.func.has_body() {
                continue;
            }
            tracing::trace!(function = %view.name(), "seeding");
            self.frames_opened.set(0);
            let frame = Frame::seed(view, self.options.memoize);
            self.eval_entry(&frame, 0);
            analyzed += 1;
        }
        analyzed
    }

    /// Abstract state of value `id` in `frame`.
    pub fn evaluate(&self, frame: &Frame<'p, '_>, id: u32) -> AbstractState<'p> {
        let slot = Slot::Value(id);
        if let Some(state) = frame.lookup(slot) {
            return state;
        }
        let Some(instr) = frame.view.value(id) else {
            return AbstractState::unknown();
        };
        let state = self.transfer(frame, instr);
        frame.store(slot, &state);
        state
    }

    fn transfer(&self, frame: &Frame<'p, '_>, instr: &'p Instruction) -> AbstractState<'p> {
        match instr.kind {
            ValueKind::Alloc => self.alloc(instr),
            ValueKind::BinOp => {
                let (x, y) = self.binop_operands(frame, instr);
                combine_binop(instr, &x, &y)
            }
            ValueKind::Call => self.eval_call(frame, instr, 0),
            ValueKind::Const => self.constant(instr),
            ValueKind::Extract => self.extract(frame, instr),
            ValueKind::FieldAddr => self.field_addr(frame, instr),
            ValueKind::Lookup if !instr.comma_ok => self.lookup(frame, instr),
            ValueKind::Parameter => self.bound(frame, frame.arg(instr.index)),
            ValueKind::FreeVar => self.bound(frame, frame.free_var(instr.index)),
            ValueKind::Global => AbstractState::unknown(),
            _ => AbstractState::unknown(),
        }
    }

    // -- transfer functions ------------------------------------------------

    fn alloc(&self, instr: &Instruction) -> AbstractState<'p> {
        let types = self.program.types();
        let pointee_zero = types
            .pointee(instr.type_id)
            .is_some_and(|elem| types.is_reference_composite(elem));
        AbstractState::single(Outcome::new(instr.type_id, false).with_pointee_zero(pointee_zero))
    }

    fn constant(&self, instr: &Instruction) -> AbstractState<'p> {
        // A typed constant of pointer-to-struct type can only be nil.
        if instr.is_nil || self.program.types().is_pointer_to_struct(instr.type_id) {
            return AbstractState::single(Outcome::new(instr.type_id, true));
        }
        match &instr.const_value {
            Some(literal) => AbstractState::single(Outcome::new(instr.type_id, const_is_zero(literal))),
            None => AbstractState::unknown(),
        }
    }

    fn binop_operands(
        &self,
        frame: &Frame<'p, '_>,
        instr: &Instruction,
    ) -> (AbstractState<'p>, AbstractState<'p>) {
        match *instr.operands.as_slice() {
            [x, y] => (self.evaluate(frame, x), self.evaluate(frame, y)),
            _ => (AbstractState::unknown(), AbstractState::unknown()),
        }
    }

    /// The dereference point.
    fn field_addr(&self, frame: &Frame<'p, '_>, instr: &'p Instruction) -> AbstractState<'p> {
        let Some(&base_id) = instr.operands.first() else {
            return AbstractState::unknown();
        };
        let base = self.evaluate(frame, base_id);

        let mut fields = AbstractState::unknown();
        for alt in base {
            if alt.zero {
                let mut trace = frame.trace().to_vec();
                trace.extend(alt.origin.iter().copied());
                trace.push(frame.step(instr));
                self.sink.report(trace);
                continue;
            }
            fields.push(Outcome {
                type_id: instr.type_id,
                zero: false,
                pointee_zero: true,
                origin: alt.origin.clone(),
            });
            if !alt.pointee_zero {
                fields.push(Outcome {
                    type_id: instr.type_id,
                    zero: false,
                    pointee_zero: false,
                    origin: alt.origin,
                });
            }
        }
        fields
    }

    fn lookup(&self, frame: &Frame<'p, '_>, instr: &Instruction) -> AbstractState<'p> {
        let Some(&map_id) = instr.operands.first() else {
            return AbstractState::unknown();
        };
        // String indexing is also a Lookup.
        let is_map = frame
            .view
            .value(map_id)
            .is_some_and(|map| self.program.types().is_map(map.type_id));
        if !is_map {
            return AbstractState::unknown();
        }
        map_entries(&self.evaluate(frame, map_id), instr.type_id)
    }

    fn extract(&self, frame: &Frame<'p, '_>, instr: &Instruction) -> AbstractState<'p> {
        let Some(tuple) = instr.operands.first().and_then(|&id| frame.view.value(id)) else {
            return AbstractState::unknown();
        };
        match tuple.kind {
            ValueKind::Call => self.eval_call(frame, tuple, instr.extract_index),
            ValueKind::Lookup if tuple.comma_ok => match tuple.operands.first() {
                Some(&map_id) => map_entries(&self.evaluate(frame, map_id), instr.type_id),
                None => AbstractState::unknown(),
            },
            _ => AbstractState::unknown(),
        }
    }

    /// A parameter or free variable: the bound value, evaluated where the
    /// binding was made.
    fn bound(&self, frame: &Frame<'p, '_>, binding: Option<u32>) -> AbstractState<'p> {
        match (frame.caller(), binding) {
            (Some(caller), Some(id)) => self.evaluate(caller, id),
            _ => AbstractState::unknown(),
        }
    }

    // -- calls -------------------------------------------------------------

    fn eval_call(
        &self,
        frame: &Frame<'p, '_>,
        call: &'p Instruction,
        index: u32,
    ) -> AbstractState<'p> {
        let slot = Slot::CallResult {
            call: call.id,
            index,
        };
        if let Some(state) = frame.lookup(slot) {
            return state;
        }
        let state = match self.resolve_call(frame, call) {
            Some((view, free_vars)) => self.enter_call(frame, call, view, free_vars, index),
            None => AbstractState::unknown(),
        };
        frame.store(slot, &state);
        state
    }

    /// Statically known callee and its free variable bindings.
    fn resolve_call(
        &self,
        frame: &Frame<'p, '_>,
        call: &'p Instruction,
    ) -> Option<(&'p FunctionView<'p>, &'p [u32])> {
        if call.callee_is_interface {
            return None;
        }
        if let Some(name) = call.callee.as_deref() {
            return self.program.function(name).map(|view| (view, NO_BINDINGS));
        }
        let closure = frame.view.value(call.callee_value?)?;
        if closure.kind != ValueKind::MakeClosure {
            return None;
        }
        let view = self.program.function(closure.callee.as_deref()?)?;
        Some((view, closure.operands.as_slice()))
    }

    fn enter_call(
        &self,
        frame: &Frame<'p, '_>,
        call: &'p Instruction,
        view: &'p FunctionView<'p>,
        free_vars: &'p [u32],
        index: u32,
    ) -> AbstractState<'p> {
        if !view.func.has_body() {
            return AbstractState::unknown();
        }
        let args = call.operands.as_slice();
        if frame.depth() >= self.options.max_call_depth {
            tracing::debug!(
                caller = %frame.view.name(),
                callee = %view.name(),
                depth = frame.depth(),
                "call depth limit reached"
            );
            return AbstractState::unknown();
        }
        let shape: Vec<ArgShape> = args
            .iter()
            .map(|&id| ArgShape::of(&self.evaluate(frame, id)))
            .collect();
        if frame.reentries(view.name(), &shape) >= self.options.max_reentry {
            tracing::debug!(
                caller = %frame.view.name(),
                callee = %view.name(),
                "recursive call cut"
            );
            return AbstractState::unknown();
        }
        let opened = self.frames_opened.get() + 1;
        self.frames_opened.set(opened);
        if opened > self.options.max_frames {
            if opened == self.options.max_frames + 1 {
                tracing::debug!(callee = %view.name(), opened, "frame budget exhausted");
            }
            return AbstractState::unknown();
        }

        let callee = frame.callee(view, call, args, free_vars, shape);
        self.eval_entry(&callee, index)
            .through_call(frame.step(call))
    }

    // -- blocks ------------------------------------------------------------

    fn eval_entry(&self, frame: &Frame<'p, '_>, index: u32) -> AbstractState<'p> {
        match frame.view.cfg.entry_block() {
            Some(entry) => self.eval_block(frame, entry, index),
            None => AbstractState::unknown(),
        }
    }

    /// States of result `index` over every feasible path from `block`.
    fn eval_block(
        &self,
        frame: &Frame<'p, '_>,
        block: &'p BasicBlock,
        index: u32,
    ) -> AbstractState<'p> {
        if block.instructions.is_empty() {
            return AbstractState::unknown();
        }
        let visits = frame.count_visit();
        if visits > self.options.max_block_visits {
            if visits == self.options.max_block_visits + 1 {
                tracing::debug!(function = %frame.view.name(), visits, "block visit budget exhausted");
            }
            return AbstractState::unknown();
        }
        if !frame.enter_block(block.id) {
            return AbstractState::unknown();
        }
        let result = self.eval_block_body(frame, block, index);
        frame.leave_block();
        result
    }

    fn eval_block_body(
        &self,
        frame: &Frame<'p, '_>,
        block: &'p BasicBlock,
        index: u32,
    ) -> AbstractState<'p> {
        for instr in &block.instructions {
            match instr.kind {
                // Not served from the cache: every path into a join block
                // reports its own fault.
                ValueKind::FieldAddr => {
                    let state = self.field_addr(frame, instr);
                    frame.store(Slot::Value(instr.id), &state);
                }
                ValueKind::Call => {
                    self.evaluate(frame, instr.id);
                }
                _ => {}
            }
        }

        let Some(term) = block.terminator() else {
            malformed(frame, block, "block does not end in a terminator")
        };
        match term.kind {
            ValueKind::If => self.eval_branch(frame, block, term, index),
            ValueKind::Jump => match frame.view.cfg.jump_successor(block.id) {
                Some(next) => self.eval_block(frame, next, index),
                None => malformed(frame, block, "jump without successor"),
            },
            ValueKind::Return => match term.operands.get(index as usize) {
                Some(&id) => self.evaluate(frame, id),
                None => AbstractState::unknown(),
            },
            _ => AbstractState::unknown(),
        }
    }

    fn eval_branch(
        &self,
        frame: &Frame<'p, '_>,
        block: &'p BasicBlock,
        term: &'p Instruction,
        index: u32,
    ) -> AbstractState<'p> {
        let Some(&cond_id) = term.operands.first() else {
            malformed(frame, block, "if without condition")
        };
        let Some((on_true, on_false)) = frame.view.cfg.cond_successors(block.id) else {
            malformed(frame, block, "if without both successors")
        };

        // Comparisons are computed here so their operand states can refine
        // the successors.
        let (cond, check) = match frame.view.value(cond_id) {
            Some(instr) if instr.kind == ValueKind::BinOp => {
                let (x, y) = self.binop_operands(frame, instr);
                let cond = combine_binop(instr, &x, &y);
                frame.store(Slot::Value(cond_id), &cond);
                (cond, NilCheck::new(instr, x, y))
            }
            _ => (self.evaluate(frame, cond_id), None),
        };

        let mut result = AbstractState::unknown();
        if cond.any_non_zero() {
            let refinement = check.as_ref().and_then(|c| c.refinement(true));
            result.extend(self.eval_successor(frame, on_true, index, refinement));
        }
        if cond.any_zero() {
            let refinement = check.as_ref().and_then(|c| c.refinement(false));
            result.extend(self.eval_successor(frame, on_false, index, refinement));
        }
        result
    }

    fn eval_successor(
        &self,
        frame: &Frame<'p, '_>,
        block: &'p BasicBlock,
        index: u32,
        refinement: Option<(Slot, AbstractState<'p>)>,
    ) -> AbstractState<'p> {
        let Some((slot, state)) = refinement else {
            return self.eval_block(frame, block, index);
        };
        frame.push_refinement(slot, state);
        let result = self.eval_block(frame, block, index);
        frame.pop_scope();
        result
    }
}

fn combine_binop<'p>(
    instr: &Instruction,
    x: &AbstractState<'p>,
    y: &AbstractState<'p>,
) -> AbstractState<'p> {
    if x.is_unknown() || y.is_unknown() {
        return AbstractState::unknown();
    }
    let class = instr
        .bin_op
        .as_deref()
        .map_or(BinOpClass::Unsupported, BinOpClass::from_op);
    let mut out = AbstractState::unknown();
    for (a, b) in operand_pairs(x, y) {
        for &zero in class.outcomes(a.zero, b.zero) {
            out.push(Outcome::new(instr.type_id, zero));
        }
    }
    out
}

/// Per map alternative: the key may be absent, and a non-nil map may also
/// hold it.
fn map_entries<'p>(map: &AbstractState<'p>, type_id: u32) -> AbstractState<'p> {
    let mut out = AbstractState::unknown();
    for alt in map {
        out.push(Outcome {
            type_id,
            zero: true,
            pointee_zero: false,
            origin: alt.origin.clone(),
        });
        if !alt.zero {
            out.push(Outcome {
                type_id,
                zero: false,
                pointee_zero: false,
                origin: alt.origin.clone(),
            });
        }
    }
    out
}

#[track_caller]
fn malformed(frame: &Frame<'_, '_>, block: &BasicBlock, what: &str) -> ! {
    panic!(
        "malformed CFG in `{}`, block {}: {what}",
        frame.view.name(),
        block.id
    )
}

/// `x == y` or `x != y` where one side is certainly zero.
struct NilCheck<'p> {
    subject: u32,
    state: AbstractState<'p>,
    equal: bool,
}

impl<'p> NilCheck<'p> {
    fn new(cond: &Instruction, x: AbstractState<'p>, y: AbstractState<'p>) -> Option<Self> {
        let equal = match cond.bin_op.as_deref() {
            Some("==") => true,
            Some("!=") => false,
            _ => return None,
        };
        let [x_id, y_id] = *cond.operands.as_slice() else {
            return None;
        };
        let (subject, state) = if y.certainly_zero() && !x.is_unknown() {
            (x_id, x)
        } else if x.certainly_zero() && !y.is_unknown() {
            (y_id, y)
        } else {
            return None;
        };
        Some(Self {
            subject,
            state,
            equal,
        })
    }

    /// What the subject is known to be on the successor taken when the
    /// condition is `taken`.
    fn refinement(&self, taken: bool) -> Option<(Slot, AbstractState<'p>)> {
        let narrowed = self.state.narrowed(taken == self.equal);
        if narrowed.is_empty() {
            return None;
        }
        Some((Slot::Value(self.subject), narrowed))
    }
}
