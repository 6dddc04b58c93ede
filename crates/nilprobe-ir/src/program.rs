//! Program-wide lookup for inter-procedural analysis.
//!
//! Static calls in the IR name their callee by its fully qualified name;
//! operands name values by per-function id. `ProgramIndex` resolves both.

use crate::cfg::Cfg;
use crate::ir::{AnalysisInput, Function, Instruction};
use crate::types::TypeMap;
use std::collections::HashMap;

/// A function together with its CFG view and value table.
pub struct FunctionView<'p> {
    pub func: &'p Function,
    pub cfg: Cfg<'p>,
    values: HashMap<u32, &'p Instruction>,
}

impl<'p> FunctionView<'p> {
    pub fn new(func: &'p Function) -> Self {
        Self {
            func,
            cfg: Cfg::from_function(func),
            values: build_value_map(func),
        }
    }

    /// Resolve a value id (instruction or non-instruction value).
    pub fn value(&self, id: u32) -> Option<&'p Instruction> {
        self.values.get(&id).copied()
    }

    pub fn name(&self) -> &'p str {
        &self.func.name
    }
}

/// Build a lookup map from value ID to instruction.
pub fn build_value_map(func: &Function) -> HashMap<u32, &Instruction> {
    func.all_values().map(|v| (v.id, v)).collect()
}

/// Indexed view of a whole `AnalysisInput`.
pub struct ProgramIndex<'p> {
    functions: Vec<FunctionView<'p>>,
    by_name: HashMap<&'p str, usize>,
    types: TypeMap,
}

impl<'p> ProgramIndex<'p> {
    pub fn new(input: &'p AnalysisInput) -> Self {
        let functions: Vec<FunctionView<'p>> = input
            .packages
            .iter()
            .flat_map(|p| p.functions.iter())
            .map(FunctionView::new)
            .collect();

        let mut by_name = HashMap::new();
        for (idx, view) in functions.iter().enumerate() {
            // First declaration wins if the bridge emitted a name twice.
            by_name.entry(view.name()).or_insert(idx);
        }

        Self {
            functions,
            by_name,
            types: TypeMap::from_input(input),
        }
    }

    /// Look up a function by fully qualified name.
    pub fn function(&self, name: &str) -> Option<&FunctionView<'p>> {
        self.by_name.get(name).map(|&idx| &self.functions[idx])
    }

    /// All functions, in input order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionView<'p>> {
        self.functions.iter()
    }

    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}
