//! High-level IR for nil-dereference analysis.
//!
//! These types mirror the JSON document produced by the Go bridge
//! (go/ssa lowered to typed basic blocks) and are the only input the
//! symbolic evaluator consumes.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::LoadError;

/// Root type - complete analysis input from the Go bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub packages: Vec<Package>,
    #[serde(default)]
    pub go_version: String,
    #[serde(default)]
    pub bridge_version: String,
}

/// A Go package with its SSA functions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub import_path: String,
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileInfo>,
    /// Type table. Ids are unique across the whole `AnalysisInput`.
    #[serde(default)]
    pub types: Vec<TypeRef>,
    pub functions: Vec<Function>,
    /// Global variables in the package.
    #[serde(default)]
    pub global_vars: Vec<Variable>,
}

/// File-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub package_name: String,
    #[serde(default)]
    pub is_generated: bool,
    #[serde(default)]
    pub is_test: bool,
}

/// Type reference with unique ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: u32,
    pub kind: TypeKind,
    pub name: String,
    /// For `Named`: the underlying type.
    #[serde(default)]
    pub underlying: u32,
    /// For `Pointer`, `Slice`, `Array`, `Chan`: the element type.
    /// For `Map`: the value type.
    #[serde(default)]
    pub elem: u32,
    /// For `Map`: the key type.
    #[serde(default)]
    pub key: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic,
    Named,
    Pointer,
    Slice,
    Array,
    Map,
    Chan,
    Struct,
    Interface,
    Signature,
    Tuple,
    #[serde(other)]
    Unknown,
}

/// A global variable reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub span: Option<Span>,
}

/// Source location span
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub end_col: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }
}

/// An SSA value: either a block instruction or a non-instruction value
/// (constant, parameter, free variable, global) listed in `Function::values`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub id: u32,
    pub kind: ValueKind,
    /// SSA register name (`t3`) or value name (`a`, `nil:*A`).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_id: u32,
    #[serde(default)]
    pub span: Option<Span>,
    /// Rendering of the source expression, as printed by the bridge.
    /// For `FieldAddr` this is the selector expression (`a.X`).
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub operands: Vec<u32>,
    /// For `Extract` instructions: which tuple index is being extracted (0-based).
    #[serde(default)]
    pub extract_index: u32,
    /// For `Parameter` and `FreeVar`: position in the function's parameter
    /// (or free variable) list.
    #[serde(default)]
    pub index: u32,

    // Call-specific
    /// Fully qualified name of a statically known callee (also set on
    /// `MakeClosure` to name the closure body).
    #[serde(default)]
    pub callee: Option<String>,
    /// Value id of the called function value for indirect calls.
    #[serde(default)]
    pub callee_value: Option<u32>,
    #[serde(default)]
    pub callee_is_interface: bool,

    // Lookup / TypeAssert
    #[serde(default)]
    pub comma_ok: bool,

    // Const-specific
    /// Exact constant value as printed by go/constant (`0`, `false`, `"s"`).
    #[serde(default)]
    pub const_value: Option<String>,
    #[serde(default)]
    pub is_nil: bool,

    // BinOp-specific
    #[serde(default)]
    pub bin_op: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Const,
    Parameter,
    FreeVar,
    Global,
    Alloc,
    FieldAddr,
    IndexAddr,
    Call,
    BinOp,
    UnOp,
    Phi,
    Extract,
    TypeAssert,
    MakeChan,
    MakeMap,
    MakeSlice,
    MakeInterface,
    MakeClosure,
    Lookup,
    Next,
    Slice,
    Convert,
    ChangeType,
    Store,
    MapUpdate,
    Send,
    Return,
    If,
    Jump,
    Panic,
    #[serde(other)]
    Unknown,
}

impl ValueKind {
    /// True for the instructions that end a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            ValueKind::If | ValueKind::Jump | ValueKind::Panic | ValueKind::Return
        )
    }
}

/// CFG edge between basic blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from_block: u32,
    pub to_block: u32,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EdgeKind {
    Unconditional,
    CondTrue,
    CondFalse,
    #[serde(other)]
    Unknown,
}

/// SSA Basic Block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// The last instruction, if it is a terminator.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.kind.is_terminator())
    }
}

/// SSA Function with full CFG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub span: Option<Span>,
    /// Empty for external functions (no source available).
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub cfg_edges: Vec<CfgEdge>,
    /// Non-instruction values referenced by operands.
    #[serde(default)]
    pub values: Vec<Instruction>,
    #[serde(default)]
    pub is_method: bool,
    #[serde(default)]
    pub is_exported: bool,
}

impl Function {
    /// True if the bridge emitted a body for this function.
    pub fn has_body(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// All values of the function: block instructions first, then `values`.
    pub fn all_values(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .chain(self.values.iter())
    }
}

// ---------------------------------------------------------------------------
// JSON loading and validation
// ---------------------------------------------------------------------------

impl AnalysisInput {
    /// Deserialize a bridge JSON document.
    pub fn from_json(data: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Total number of functions across all packages.
    pub fn function_count(&self) -> usize {
        self.packages.iter().map(|p| p.functions.len()).sum()
    }

    /// Check that every function with a body has a well-formed CFG.
    ///
    /// The evaluator trusts the result of this check: it never sees a block
    /// whose terminator cannot be followed.
    pub fn validate(&self) -> Result<(), LoadError> {
        for pkg in &self.packages {
            for func in &pkg.functions {
                validate_function(func)?;
            }
        }
        Ok(())
    }
}

fn validate_function(func: &Function) -> Result<(), LoadError> {
    let malformed = |reason: String| LoadError::Malformed {
        function: func.name.clone(),
        reason,
    };

    let mut value_ids = HashSet::new();
    for v in func.all_values() {
        if !value_ids.insert(v.id) {
            return Err(malformed(format!("duplicate value id {}", v.id)));
        }
    }

    let block_ids: HashSet<u32> = func.blocks.iter().map(|b| b.id).collect();
    if block_ids.len() != func.blocks.len() {
        return Err(malformed("duplicate block id".into()));
    }

    let mut out_edges: HashMap<u32, Vec<EdgeKind>> = HashMap::new();
    for edge in &func.cfg_edges {
        if !block_ids.contains(&edge.from_block) || !block_ids.contains(&edge.to_block) {
            return Err(malformed(format!(
                "edge {} -> {} names a missing block",
                edge.from_block, edge.to_block
            )));
        }
        out_edges.entry(edge.from_block).or_default().push(edge.kind);
    }

    for v in func.all_values() {
        let referenced = v.operands.iter().chain(v.callee_value.iter());
        for op in referenced {
            if !value_ids.contains(op) {
                return Err(malformed(format!(
                    "value {} references unknown operand {op}",
                    v.id
                )));
            }
        }
    }

    for block in &func.blocks {
        if block.instructions.is_empty() {
            continue;
        }
        let Some(term) = block.terminator() else {
            return Err(malformed(format!("block {} has no terminator", block.id)));
        };
        let edges = out_edges.get(&block.id).map(Vec::as_slice).unwrap_or(&[]);
        let count = |kind: EdgeKind| edges.iter().filter(|&&k| k == kind).count();
        match term.kind {
            ValueKind::If => {
                if term.operands.is_empty() {
                    return Err(malformed(format!("block {}: If without condition", block.id)));
                }
                if count(EdgeKind::CondTrue) != 1 || count(EdgeKind::CondFalse) != 1 {
                    return Err(malformed(format!(
                        "block {}: If needs one CondTrue and one CondFalse edge",
                        block.id
                    )));
                }
            }
            ValueKind::Jump => {
                if count(EdgeKind::Unconditional) != 1 {
                    return Err(malformed(format!(
                        "block {}: Jump needs exactly one Unconditional edge",
                        block.id
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "go_version": "1.22",
        "bridge_version": "0.1.0",
        "packages": [{
            "import_path": "example.com/pkg",
            "name": "pkg",
            "types": [
                {"id": 1, "kind": "Pointer", "name": "*pkg.A", "elem": 2},
                {"id": 2, "kind": "Named", "name": "pkg.A", "underlying": 3},
                {"id": 3, "kind": "Struct", "name": "struct{X int}"}
            ],
            "functions": [{
                "name": "pkg.npd",
                "short_name": "npd",
                "values": [
                    {"id": 100, "kind": "Const", "name": "nil:*pkg.A", "type_id": 1, "is_nil": true}
                ],
                "blocks": [{
                    "id": 0,
                    "name": "entry",
                    "instructions": [
                        {"id": 0, "kind": "FieldAddr", "name": "t0", "type_id": 4, "operands": [100],
                         "span": {"file": "a.go", "start_line": 9, "start_col": 6},
                         "source": "(*A)(nil)"},
                        {"id": 1, "kind": "Return", "name": ""}
                    ]
                }],
                "cfg_edges": []
            }]
        }]
    }"#;

    fn load(json: &str) -> AnalysisInput {
        AnalysisInput::from_json(json).unwrap()
    }

    #[test]
    fn test_deserialize_analysis_input() {
        let input = load(MINIMAL);
        assert_eq!(input.go_version, "1.22");
        assert_eq!(input.packages.len(), 1);
        assert_eq!(input.function_count(), 1);

        let func = &input.packages[0].functions[0];
        assert_eq!(func.short_name, "npd");
        assert!(func.has_body());
        assert_eq!(func.values[0].kind, ValueKind::Const);
        assert!(func.values[0].is_nil);

        let deref = &func.blocks[0].instructions[0];
        assert_eq!(deref.kind, ValueKind::FieldAddr);
        assert_eq!(deref.operands, vec![100]);
        assert_eq!(deref.source.as_deref(), Some("(*A)(nil)"));
        assert_eq!(deref.span.as_ref().unwrap().start_line, 9);
        input.validate().unwrap();
    }

    #[test]
    fn test_unknown_kinds_deserialize() {
        let json = r#"{"id": 7, "kind": "RunDefers"}"#;
        let instr: Instruction = serde_json::from_str(json).unwrap();
        assert_eq!(instr.kind, ValueKind::Unknown);
        let ty: TypeRef = serde_json::from_str(r#"{"id": 1, "kind": "Nil", "name": "untyped nil"}"#).unwrap();
        assert_eq!(ty.kind, TypeKind::Unknown);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = AnalysisInput::from_json("{not json").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_terminator_detection() {
        assert!(ValueKind::If.is_terminator());
        assert!(ValueKind::Return.is_terminator());
        assert!(!ValueKind::Call.is_terminator());
        assert!(!ValueKind::FieldAddr.is_terminator());
    }

    #[test]
    fn test_validate_rejects_missing_terminator() {
        let mut input = load(MINIMAL);
        input.packages[0].functions[0].blocks[0].instructions.pop();
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("no terminator"), "got: {err}");
    }

    #[test]
    fn test_validate_rejects_unknown_operand() {
        let mut input = load(MINIMAL);
        input.packages[0].functions[0].blocks[0].instructions[0].operands = vec![999];
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("unknown operand 999"), "got: {err}");
    }

    #[test]
    fn test_validate_rejects_if_without_edges() {
        let mut input = load(MINIMAL);
        let block = &mut input.packages[0].functions[0].blocks[0];
        let mut cond = block.instructions[1].clone();
        cond.kind = ValueKind::If;
        cond.operands = vec![100];
        block.instructions[1] = cond;
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("CondTrue"), "got: {err}");
    }

    #[test]
    fn test_validate_accepts_empty_blocks_and_external_functions() {
        let mut input = load(MINIMAL);
        let func = &mut input.packages[0].functions[0];
        func.blocks.push(BasicBlock {
            id: 1,
            name: "unreachable".into(),
            instructions: vec![],
        });
        input.packages[0].functions.push(Function {
            name: "fmt.Println".into(),
            short_name: "Println".into(),
            span: None,
            blocks: vec![],
            cfg_edges: vec![],
            values: vec![],
            is_method: false,
            is_exported: true,
        });
        input.validate().unwrap();
    }

    #[test]
    fn test_span_creation() {
        let span = Span::new("main.go", 10, 5);
        assert_eq!(span.file, "main.go");
        assert_eq!(span.start_line, 10);
        assert_eq!(span.start_col, 5);
        assert_eq!(span.end_line, 10);
        assert_eq!(span.end_col, 5);
    }
}
