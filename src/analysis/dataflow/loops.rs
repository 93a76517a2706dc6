//! Loop-nesting forest of a reducible SSA CFG.
//!
//! Every back edge `(latch, header)` of the forward DFS defines a natural
//! loop: the header plus everything that reaches the latch without passing
//! through the header. Loops sharing a header are merged. Nesting follows
//! containment — each block's *loop parent* is the header of the innermost
//! loop properly containing it, which for a header is the next enclosing
//! loop.
//!
//! The structured input language only produces single-entry loops, so the
//! natural-loop construction is exact here; no irreducible-region handling
//! is needed.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::analysis::dataflow::TopologicalSort;
use crate::analysis::ssa::{BlockId, SsaCfg};

/// The loop hierarchy: headers and the per-block parent map.
#[derive(Debug)]
pub struct LoopNestingForest {
    /// All loop headers.
    loop_nodes: BTreeSet<BlockId>,
    /// Per block, the nearest enclosing loop header (for headers: the next
    /// enclosing loop's header). Indexed by block.
    loop_parents: Vec<Option<BlockId>>,
}

impl LoopNestingForest {
    /// Builds the forest from a topological sort's back edges.
    #[must_use]
    pub fn new(sort: &TopologicalSort<'_>) -> Self {
        let cfg = sort.cfg();
        let mut bodies: FxHashMap<BlockId, BTreeSet<BlockId>> = FxHashMap::default();

        // collect natural loop bodies per header
        for &block in sort.pre_order() {
            for successor in cfg.block(block).successors() {
                if sort.back_edge(block, successor) {
                    let body = bodies.entry(successor).or_default();
                    body.insert(successor);
                    expand_loop_body(cfg, body, successor, block);
                }
            }
        }

        let loop_nodes: BTreeSet<BlockId> = bodies.keys().copied().collect();
        let mut loops: Vec<(BlockId, BTreeSet<BlockId>)> = bodies.into_iter().collect();
        // smallest loops first so the innermost containing loop wins
        loops.sort_by_key(|(_, body)| body.len());

        let mut loop_parents = vec![None; cfg.block_count()];
        for block in cfg.block_ids() {
            for (header, body) in &loops {
                let properly_contained = body.contains(&block) && block != *header;
                if properly_contained {
                    loop_parents[block.index()] = Some(*header);
                    break;
                }
            }
        }

        LoopNestingForest {
            loop_nodes,
            loop_parents,
        }
    }

    /// All loop headers.
    #[must_use]
    pub const fn loop_nodes(&self) -> &BTreeSet<BlockId> {
        &self.loop_nodes
    }

    /// Headers of outermost loops (no enclosing loop).
    #[must_use]
    pub fn loop_root_nodes(&self) -> Vec<BlockId> {
        self.loop_nodes
            .iter()
            .copied()
            .filter(|header| self.loop_parents[header.index()].is_none())
            .collect()
    }

    /// The per-block parent map; `None` marks blocks outside every loop
    /// (and outermost headers).
    #[must_use]
    pub fn loop_parents(&self) -> &[Option<BlockId>] {
        &self.loop_parents
    }

    /// The nearest enclosing loop header of `block`.
    #[must_use]
    pub fn loop_parent(&self, block: BlockId) -> Option<BlockId> {
        self.loop_parents[block.index()]
    }

    /// Blocks whose loop parent is `header` — the loop's immediate members,
    /// nested headers included (but not their members).
    #[must_use]
    pub fn children(&self, header: BlockId) -> Vec<BlockId> {
        (0..self.loop_parents.len())
            .map(BlockId::new)
            .filter(|block| self.loop_parents[block.index()] == Some(header))
            .collect()
    }

    /// Whether `block` heads a loop.
    #[must_use]
    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loop_nodes.contains(&block)
    }
}

/// Adds to `body` every block that reaches `latch` backwards without passing
/// through `header`.
fn expand_loop_body(cfg: &SsaCfg, body: &mut BTreeSet<BlockId>, header: BlockId, latch: BlockId) {
    if body.contains(&latch) {
        return;
    }
    let mut worklist = vec![latch];
    while let Some(block) = worklist.pop() {
        if body.insert(block) {
            for &predecessor in &cfg.block(block).entries {
                if predecessor != header && !body.contains(&predecessor) {
                    worklist.push(predecessor);
                }
            }
        }
    }
}
