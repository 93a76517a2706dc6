//! Forward topological ordering of an SSA CFG.
//!
//! A depth-first walk from the entry along exit edges yields the pre- and
//! post-orders every other dataflow analysis is driven by, and classifies
//! each edge `(u, v)` as a *back edge* iff `v` is on the active DFS stack
//! when the edge is explored. On the reducible graphs the builder produces,
//! back edges are exactly the loop-closing edges (self-loops included).
//!
//! Only blocks reachable from the entry appear in the orders; pruned blocks
//! keep their table slots but are never visited.

use rustc_hash::FxHashSet;

use crate::analysis::ssa::{BlockId, SsaCfg};

/// Pre/post DFS orders of a CFG with back-edge classification.
#[derive(Debug)]
pub struct TopologicalSort<'a> {
    cfg: &'a SsaCfg,
    pre_order: Vec<BlockId>,
    post_order: Vec<BlockId>,
    back_edges: FxHashSet<(BlockId, BlockId)>,
    reachable: Vec<bool>,
}

impl<'a> TopologicalSort<'a> {
    /// Runs the forward DFS from the graph's entry.
    #[must_use]
    pub fn new(cfg: &'a SsaCfg) -> Self {
        let block_count = cfg.block_count();
        let mut sort = TopologicalSort {
            cfg,
            pre_order: Vec::with_capacity(block_count),
            post_order: Vec::with_capacity(block_count),
            back_edges: FxHashSet::default(),
            reachable: vec![false; block_count],
        };
        sort.run();
        sort
    }

    /// The graph this ordering was computed for.
    #[must_use]
    pub const fn cfg(&self) -> &'a SsaCfg {
        self.cfg
    }

    /// Reachable blocks in DFS pre-order (entry first).
    #[must_use]
    pub fn pre_order(&self) -> &[BlockId] {
        &self.pre_order
    }

    /// Reachable blocks in DFS post-order (entry last).
    #[must_use]
    pub fn post_order(&self) -> &[BlockId] {
        &self.post_order
    }

    /// Whether `(from, to)` was classified as a back edge.
    #[must_use]
    pub fn back_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Whether the block is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.reachable[block.index()]
    }

    fn run(&mut self) {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Active,
            Done,
        }

        let mut state = vec![State::Unvisited; self.cfg.block_count()];
        let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

        let entry = self.cfg.entry;
        state[entry.index()] = State::Active;
        self.reachable[entry.index()] = true;
        self.pre_order.push(entry);
        stack.push((entry, self.cfg.block(entry).successors(), 0));

        while let Some((block, successors, index)) = stack.last_mut() {
            if let Some(successor) = successors.get(*index).copied() {
                *index += 1;
                let block = *block;
                match state[successor.index()] {
                    State::Unvisited => {
                        state[successor.index()] = State::Active;
                        self.reachable[successor.index()] = true;
                        self.pre_order.push(successor);
                        stack.push((successor, self.cfg.block(successor).successors(), 0));
                    }
                    // the target is an ancestor still on the DFS stack
                    State::Active => {
                        self.back_edges.insert((block, successor));
                    }
                    State::Done => {}
                }
            } else {
                let block = *block;
                state[block.index()] = State::Done;
                self.post_order.push(block);
                stack.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::Exit;
    use crate::ast::DebugData;

    /// entry -> cond; cond -> body | after; body -> cond (back edge)
    fn loop_cfg() -> SsaCfg {
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        let cond = cfg.make_block(DebugData::EMPTY);
        let body = cfg.make_block(DebugData::EMPTY);
        let after = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;

        let condition = cfg.new_literal(DebugData::EMPTY, 1);
        cfg.block_mut(entry).exit = Exit::Jump { target: cond };
        cfg.block_mut(cond).exit = Exit::ConditionalJump {
            condition,
            non_zero: body,
            zero: after,
        };
        cfg.block_mut(body).exit = Exit::Jump { target: cond };

        cfg.block_mut(cond).entries.extend([entry, body]);
        cfg.block_mut(body).entries.insert(cond);
        cfg.block_mut(after).entries.insert(cond);
        cfg
    }

    #[test]
    fn test_orders_cover_reachable_blocks() {
        let cfg = loop_cfg();
        let sort = TopologicalSort::new(&cfg);
        assert_eq!(sort.pre_order().len(), 4);
        assert_eq!(sort.post_order().len(), 4);
        assert_eq!(sort.pre_order()[0], cfg.entry);
        assert_eq!(*sort.post_order().last().unwrap(), cfg.entry);
    }

    #[test]
    fn test_back_edge_classification() {
        let cfg = loop_cfg();
        let sort = TopologicalSort::new(&cfg);
        let cond = BlockId::new(1);
        let body = BlockId::new(2);
        assert!(sort.back_edge(body, cond));
        assert!(!sort.back_edge(cfg.entry, cond));
        assert!(!sort.back_edge(cond, body));
    }

    #[test]
    fn test_unreachable_blocks_are_skipped() {
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        let dead = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;

        let sort = TopologicalSort::new(&cfg);
        assert!(sort.is_reachable(entry));
        assert!(!sort.is_reachable(dead));
        assert_eq!(sort.pre_order(), &[entry]);
    }

    #[test]
    fn test_self_loop_is_back_edge() {
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        let looping = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;
        let condition = cfg.new_literal(DebugData::EMPTY, 1);
        cfg.block_mut(entry).exit = Exit::Jump { target: looping };
        cfg.block_mut(looping).exit = Exit::ConditionalJump {
            condition,
            non_zero: looping,
            zero: entry,
        };
        cfg.block_mut(looping).entries.extend([entry, looping]);

        let sort = TopologicalSort::new(&cfg);
        assert!(sort.back_edge(looping, looping));
    }
}
