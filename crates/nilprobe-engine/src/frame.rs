//! Activation records for the symbolic evaluator.
//!
//! A [`Frame`] is one evaluation of one function. Parameters and closure
//! free variables are bound to value ids of the calling frame and evaluated
//! there on first use. A frame without a caller is a context-free seed: its
//! parameters carry no information.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use nilprobe_ir::ir::Instruction;
use nilprobe_ir::program::FunctionView;

use crate::lattice::AbstractState;
use crate::sink::{Trace, TraceStep};

/// Cache key inside one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Value(u32),
    /// Result `index` of the call instruction `call`.
    CallResult { call: u32, index: u32 },
}

/// Coarse state of one call argument: which kinds of outcome it may have.
/// Recursion is cut on the callee together with these shapes, so the
/// number of distinct keys per callee is finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgShape {
    pub zero: bool,
    pub non_zero: bool,
}

impl ArgShape {
    pub fn of(state: &AbstractState<'_>) -> Self {
        Self {
            zero: state.any_zero(),
            non_zero: state.any_non_zero(),
        }
    }
}

pub struct Frame<'p, 'c> {
    pub view: &'p FunctionView<'p>,
    caller: Option<&'c Frame<'p, 'c>>,
    args: &'p [u32],
    free_vars: &'p [u32],
    shape: Vec<ArgShape>,
    trace: Trace<'p>,
    depth: usize,
    memoize: bool,
    scopes: RefCell<Vec<HashMap<Slot, AbstractState<'p>>>>,
    path: RefCell<Vec<u32>>,
    block_visits: Cell<usize>,
}

impl<'p, 'c> Frame<'p, 'c> {
    /// A context-free frame with an empty trace.
    pub fn seed(view: &'p FunctionView<'p>, memoize: bool) -> Self {
        Self::build(view, None, &[], &[], Vec::new(), Vec::new(), 0, memoize)
    }

    fn build(
        view: &'p FunctionView<'p>,
        caller: Option<&'c Frame<'p, 'c>>,
        args: &'p [u32],
        free_vars: &'p [u32],
        shape: Vec<ArgShape>,
        trace: Trace<'p>,
        depth: usize,
        memoize: bool,
    ) -> Self {
        Self {
            view,
            caller,
            args,
            free_vars,
            shape,
            trace,
            depth,
            memoize,
            scopes: RefCell::new(vec![HashMap::new()]),
            path: RefCell::new(Vec::new()),
            block_visits: Cell::new(0),
        }
    }

    /// Frame for a call made from this frame. `args` bind the callee's
    /// parameters and `free_vars` its closure bindings, both as value ids of
    /// this frame. `shape` summarizes the argument states.
    pub fn callee<'s>(
        &'s self,
        view: &'p FunctionView<'p>,
        call: &'p Instruction,
        args: &'p [u32],
        free_vars: &'p [u32],
        shape: Vec<ArgShape>,
    ) -> Frame<'p, 's> {
        let mut trace = self.trace.clone();
        trace.push(self.step(call));
        Frame::build(
            view,
            Some(self),
            args,
            free_vars,
            shape,
            trace,
            self.depth + 1,
            self.memoize,
        )
    }

    pub fn step(&self, instruction: &'p Instruction) -> TraceStep<'p> {
        TraceStep::new(self.view.func, instruction)
    }

    pub fn caller(&self) -> Option<&'c Frame<'p, 'c>> {
        self.caller
    }

    /// Caller value id bound to parameter `index`.
    pub fn arg(&self, index: u32) -> Option<u32> {
        self.args.get(index as usize).copied()
    }

    /// Caller value id bound to free variable `index`.
    pub fn free_var(&self, index: u32) -> Option<u32> {
        self.free_vars.get(index as usize).copied()
    }

    pub fn trace(&self) -> &[TraceStep<'p>] {
        &self.trace
    }

    /// Number of calls between the seed and this frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// How many frames from this one up to the seed evaluate `callee` with
    /// arguments of the given shape.
    pub fn reentries(&self, callee: &str, shape: &[ArgShape]) -> usize {
        let mut count = 0;
        let mut frame = Some(self);
        while let Some(f) = frame {
            if f.view.name() == callee && f.shape == shape {
                count += 1;
            }
            frame = f.caller;
        }
        count
    }

    // -- value cache ------------------------------------------------------

    /// Innermost cached or refined state for `slot`.
    pub fn lookup(&self, slot: Slot) -> Option<AbstractState<'p>> {
        self.scopes
            .borrow()
            .iter()
            .rev()
            .find_map(|scope| scope.get(&slot).cloned())
    }

    /// Cache a computed state in the innermost scope.
    pub fn store(&self, slot: Slot, state: &AbstractState<'p>) {
        if !self.memoize {
            return;
        }
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.insert(slot, state.clone());
        }
    }

    /// Open a scope in which `slot` is known to be `state`. Everything
    /// cached until the matching [`Frame::pop_scope`] is discarded with it.
    pub fn push_refinement(&self, slot: Slot, state: AbstractState<'p>) {
        let mut scope = HashMap::new();
        scope.insert(slot, state);
        self.scopes.borrow_mut().push(scope);
    }

    pub fn pop_scope(&self) {
        let mut scopes = self.scopes.borrow_mut();
        if scopes.len() > 1 {
            scopes.pop();
        }
    }

    // -- traversal guards -------------------------------------------------

    /// Mark `block` as being on the current path. Returns false when it
    /// already is (a loop back edge).
    pub fn enter_block(&self, block: u32) -> bool {
        let mut path = self.path.borrow_mut();
        if path.contains(&block) {
            return false;
        }
        path.push(block);
        true
    }

    pub fn leave_block(&self) {
        self.path.borrow_mut().pop();
    }

    /// Count one block visit. Returns the number of visits so far.
    pub fn count_visit(&self) -> usize {
        let visits = self.block_visits.get() + 1;
        self.block_visits.set(visits);
        visits
    }
}
