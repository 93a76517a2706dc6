//! The SSA control flow graph and its owning aggregate.
//!
//! An [`SsaCfg`] owns two dense tables — blocks and values — plus the
//! literal dedup map; every cross-reference in the graph is an id into one
//! of those tables. Deleting never happens in place: trivial-phi elimination
//! rewrites the whole graph, and unreachable-edge pruning only drops entries
//! and phi arguments (see [`CfgBuilder`]). This keeps referential integrity
//! trivial — ids never dangle.
//!
//! A [`ControlFlow`] owns the main graph of a compilation unit plus one
//! graph per function definition, identified by [`FunctionGraphId`], along
//! with the [`CallSites`] registry shared by all of them.
//!
//! [`CfgBuilder`]: crate::analysis::ssa::CfgBuilder

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::analysis::ssa::{BasicBlock, BlockId, PhiValue, ValueId, ValueInfo, ValueKind};
use crate::ast::{DebugData, FunctionCall, Word};
use crate::scope::{FunctionId, VarId};

/// Identifier of a function graph within a [`ControlFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionGraphId(pub(crate) u32);

impl FunctionGraphId {
    /// Returns the raw index into the function-graph table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a call site within a [`CallSites`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteId(pub(crate) u32);

impl CallSiteId {
    /// Returns the raw index into the call-site table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registry of function-call sites.
///
/// Lowered call operations refer back to their originating AST call through
/// a [`CallSiteId`]; this is where literal-only builtin arguments (which are
/// never evaluated into operation inputs) remain accessible, and where the
/// return labels of the stack layer get their identity.
#[derive(Debug, Default)]
pub struct CallSites {
    calls: Vec<FunctionCall>,
}

impl CallSites {
    /// Registers a call site and returns its id.
    pub fn add_call_site(&mut self, call: &FunctionCall) -> CallSiteId {
        let id = CallSiteId(u32::try_from(self.calls.len()).expect("call-site table overflow"));
        self.calls.push(call.clone());
        id
    }

    /// Returns the AST call registered under `id`.
    #[must_use]
    pub fn function_call(&self, id: CallSiteId) -> &FunctionCall {
        &self.calls[id.index()]
    }

    /// Number of registered call sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no call site has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// One SSA control flow graph: the block and value tables plus the graph's
/// signature when it lowers a function definition.
#[derive(Debug)]
pub struct SsaCfg {
    /// The entry block.
    pub entry: BlockId,
    /// Blocks whose exit leaves the graph.
    pub exits: BTreeSet<BlockId>,
    blocks: Vec<BasicBlock>,
    values: Vec<ValueInfo>,
    literals: FxHashMap<Word, ValueId>,
    unreachable: ValueId,
    /// Parameter symbols paired with their entry-block values; empty for the
    /// main graph.
    pub arguments: Vec<(VarId, ValueId)>,
    /// Return variable symbols; empty for the main graph.
    pub returns: Vec<VarId>,
    /// The function this graph lowers, if any.
    pub function: Option<FunctionId>,
    /// Whether calls into this graph can return (from side-effect analysis).
    pub can_continue: bool,
    /// Source tag of the lowered construct.
    pub debug: DebugData,
}

impl SsaCfg {
    /// Creates an empty graph. The entry block is not allocated here —
    /// builders call [`SsaCfg::make_block`] and assign [`SsaCfg::entry`].
    #[must_use]
    pub fn new() -> Self {
        SsaCfg {
            entry: BlockId(0),
            exits: BTreeSet::new(),
            blocks: Vec::new(),
            // value 0 is the canonical bottom
            values: vec![ValueInfo::Unreachable],
            literals: FxHashMap::default(),
            unreachable: ValueId {
                payload: 0,
                kind: ValueKind::Unreachable,
            },
            arguments: Vec::new(),
            returns: Vec::new(),
            function: None,
            can_continue: true,
            debug: DebugData::EMPTY,
        }
    }

    /// Allocates a fresh block and returns its id.
    pub fn make_block(&mut self, debug: DebugData) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("block table overflow"));
        self.blocks.push(BasicBlock {
            debug,
            ..BasicBlock::default()
        });
        id
    }

    /// Returns the block for an id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// Returns the block for an id, mutably.
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Number of blocks, pruned ones included.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates over all block ids in allocation order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId::new)
    }

    /// Returns the id of the literal `value`, allocating it on first use.
    /// Requesting the same literal twice yields the same id.
    pub fn new_literal(&mut self, debug: DebugData, value: Word) -> ValueId {
        if let Some(existing) = self.literals.get(&value) {
            return *existing;
        }
        let id = self.push_value(ValueInfo::Literal { value, debug });
        self.literals.insert(value, id);
        id
    }

    /// Allocates a fresh variable value defined in `block`.
    pub fn new_variable(&mut self, block: BlockId) -> ValueId {
        self.push_value(ValueInfo::Variable { defined_in: block })
    }

    /// Allocates a fresh operand-less phi belonging to `block`.
    pub fn new_phi(&mut self, block: BlockId) -> ValueId {
        self.push_value(ValueInfo::Phi(PhiValue {
            block,
            arguments: Vec::new(),
        }))
    }

    /// The canonical bottom value.
    #[must_use]
    pub const fn unreachable_value(&self) -> ValueId {
        self.unreachable
    }

    /// Returns the descriptor of a value.
    #[must_use]
    pub fn value_info(&self, id: ValueId) -> &ValueInfo {
        let info = &self.values[id.index()];
        debug_assert_eq!(info.kind(), id.kind());
        info
    }

    /// Returns the descriptor of a value, mutably. Mutation is reserved to
    /// construction; the kind of a value never changes.
    pub(crate) fn value_info_mut(&mut self, id: ValueId) -> &mut ValueInfo {
        let info = &mut self.values[id.index()];
        debug_assert_eq!(info.kind(), id.kind());
        info
    }

    /// Number of values, including the canonical bottom.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Whether `id` denotes a literal.
    #[must_use]
    pub fn is_literal_value(&self, id: ValueId) -> bool {
        id.is_literal()
    }

    /// Index at which `predecessor` appears in `successor`'s stable entry
    /// ordering; this is the phi argument slot fed over that edge.
    ///
    /// # Panics
    ///
    /// Panics when `predecessor` is not an entry of `successor`.
    #[must_use]
    pub fn phi_argument_index(&self, predecessor: BlockId, successor: BlockId) -> usize {
        self.block(successor)
            .entries
            .iter()
            .position(|entry| *entry == predecessor)
            .expect("phi argument index of a non-predecessor")
    }

    fn push_value(&mut self, info: ValueInfo) -> ValueId {
        let payload = u32::try_from(self.values.len()).expect("value table overflow");
        let kind = info.kind();
        self.values.push(info);
        ValueId { payload, kind }
    }
}

impl Default for SsaCfg {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SsaCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            let id = BlockId::new(index);
            write!(f, "{id}")?;
            if id == self.entry {
                write!(f, " (entry)")?;
            }
            writeln!(f, ":")?;
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

/// The graphs of one compilation unit: the main graph plus one graph per
/// function definition.
#[derive(Debug, Default)]
pub struct ControlFlow {
    /// The top-level graph.
    pub main: SsaCfg,
    /// Function graphs in definition order.
    pub function_graphs: Vec<SsaCfg>,
    mapping: FxHashMap<FunctionId, FunctionGraphId>,
    /// Call sites of every graph, shared so return labels are unique across
    /// the unit.
    pub call_sites: CallSites,
}

impl ControlFlow {
    /// Returns the graph lowered for `function`, if one was built.
    #[must_use]
    pub fn graph_for_function(&self, function: FunctionId) -> Option<&SsaCfg> {
        self.mapping
            .get(&function)
            .map(|id| &self.function_graphs[id.index()])
    }

    /// Returns the graph id for `function`, if one was built.
    #[must_use]
    pub fn function_graph_id(&self, function: FunctionId) -> Option<FunctionGraphId> {
        self.mapping.get(&function).copied()
    }

    /// Returns the function graph for an id.
    #[must_use]
    pub fn function_graph(&self, id: FunctionGraphId) -> &SsaCfg {
        &self.function_graphs[id.index()]
    }

    /// Registers a finished function graph.
    pub(crate) fn add_function_graph(&mut self, function: FunctionId, graph: SsaCfg) -> FunctionGraphId {
        let id = FunctionGraphId(
            u32::try_from(self.function_graphs.len()).expect("function graph table overflow"),
        );
        self.function_graphs.push(graph);
        self.mapping.insert(function, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_deduplication() {
        let mut cfg = SsaCfg::new();
        let a = cfg.new_literal(DebugData::EMPTY, 42);
        let b = cfg.new_literal(DebugData::EMPTY, 42);
        let c = cfg.new_literal(DebugData::EMPTY, 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_literal());
        assert_eq!(cfg.value_info(a).as_literal(), Some(42));
    }

    #[test]
    fn test_value_allocation_kinds() {
        let mut cfg = SsaCfg::new();
        let block = cfg.make_block(DebugData::EMPTY);
        let variable = cfg.new_variable(block);
        let phi = cfg.new_phi(block);

        assert_eq!(variable.kind(), ValueKind::Variable);
        assert_eq!(phi.kind(), ValueKind::Phi);
        assert!(cfg.unreachable_value().is_unreachable());
        assert!(matches!(
            cfg.value_info(variable),
            ValueInfo::Variable { defined_in } if *defined_in == block
        ));
    }

    #[test]
    fn test_phi_argument_index_follows_entry_order() {
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        let merge = cfg.make_block(DebugData::EMPTY);

        // inserted out of order on purpose
        cfg.block_mut(merge).entries.insert(c);
        cfg.block_mut(merge).entries.insert(a);
        cfg.block_mut(merge).entries.insert(b);

        assert_eq!(cfg.phi_argument_index(a, merge), 0);
        assert_eq!(cfg.phi_argument_index(b, merge), 1);
        assert_eq!(cfg.phi_argument_index(c, merge), 2);
    }

    #[test]
    #[should_panic(expected = "non-predecessor")]
    fn test_phi_argument_index_requires_edge() {
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let _ = cfg.phi_argument_index(a, b);
    }

    #[test]
    fn test_call_site_registry() {
        use crate::ast::{DebugData, Identifier};

        let mut sites = CallSites::default();
        assert!(sites.is_empty());
        let call = FunctionCall {
            function: Identifier {
                name: "mload".to_string(),
                debug: DebugData::EMPTY,
            },
            arguments: vec![],
            debug: DebugData::EMPTY,
        };
        let id = sites.add_call_site(&call);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites.function_call(id).function.name, "mload");
    }
}
