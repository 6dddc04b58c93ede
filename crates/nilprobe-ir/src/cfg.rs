//! CFG navigation helpers over deserialized bridge data.
//!
//! The graph itself was built by go/ssa; this view only indexes blocks and
//! edges so the evaluator can follow terminators.

use crate::ir::{BasicBlock, EdgeKind, Function};
use std::collections::HashMap;

/// A traversable view of a function's CFG
pub struct Cfg<'a> {
    func: &'a Function,
    successors: HashMap<u32, Vec<(u32, EdgeKind)>>,
    block_map: HashMap<u32, &'a BasicBlock>,
}

impl<'a> Cfg<'a> {
    /// Build traversal indices from a deserialized function
    pub fn from_function(func: &'a Function) -> Self {
        let mut successors: HashMap<u32, Vec<(u32, EdgeKind)>> = HashMap::new();
        let block_map = func.blocks.iter().map(|b| (b.id, b)).collect();

        for edge in &func.cfg_edges {
            successors
                .entry(edge.from_block)
                .or_default()
                .push((edge.to_block, edge.kind));
        }

        Self {
            func,
            successors,
            block_map,
        }
    }

    /// Entry block: the first block emitted by go/ssa.
    pub fn entry_block(&self) -> Option<&'a BasicBlock> {
        self.func.blocks.first()
    }

    /// Get block by ID
    pub fn block(&self, id: u32) -> Option<&'a BasicBlock> {
        self.block_map.get(&id).copied()
    }

    /// Successors of a block
    pub fn successors(&self, block_id: u32) -> &[(u32, EdgeKind)] {
        self.successors
            .get(&block_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn successor_of_kind(&self, block_id: u32, kind: EdgeKind) -> Option<&'a BasicBlock> {
        self.successors(block_id)
            .iter()
            .find(|(_, k)| *k == kind)
            .and_then(|&(to, _)| self.block(to))
    }

    /// `(true, false)` successors of a block ending in `If`.
    pub fn cond_successors(&self, block_id: u32) -> Option<(&'a BasicBlock, &'a BasicBlock)> {
        Some((
            self.successor_of_kind(block_id, EdgeKind::CondTrue)?,
            self.successor_of_kind(block_id, EdgeKind::CondFalse)?,
        ))
    }

    /// The single successor of a block ending in `Jump`.
    pub fn jump_successor(&self, block_id: u32) -> Option<&'a BasicBlock> {
        self.successor_of_kind(block_id, EdgeKind::Unconditional)
    }
}
