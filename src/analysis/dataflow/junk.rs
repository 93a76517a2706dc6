//! Junk-admitting blocks.
//!
//! A block *admits junk* when extra, semantically irrelevant stack content
//! may be introduced while control is in it without unbalancing any other
//! path's stack layout. That is the case for bridge vertices (no parallel
//! path exists, see [`BridgeFinder`]) and for termination blocks (the stack
//! dies with them) — unless the block can still reach a function return,
//! whose calling convention fixes the exact stack shape.
//!
//! The analysis seeds admissibility from the bridge/termination test and
//! then clears it along reverse edges from every function-return block.

use crate::analysis::dataflow::{BridgeFinder, TopologicalSort};
use crate::analysis::ssa::{BlockId, SsaCfg};

/// Per-block junk admissibility. See the [module documentation](self).
#[derive(Debug)]
pub struct JunkAdmittingBlocks {
    allows_junk: Vec<bool>,
}

impl JunkAdmittingBlocks {
    /// Runs the analysis over a pruned graph and its topological sort.
    #[must_use]
    pub fn new(cfg: &SsaCfg, sort: &TopologicalSort<'_>) -> Self {
        let mut allows_junk = vec![false; cfg.block_count()];

        // a lone block admits junk unless it is a function return
        if sort.pre_order().len() == 1 {
            let block = sort.pre_order()[0];
            allows_junk[block.index()] = !cfg.block(block).is_function_return_block();
            return JunkAdmittingBlocks { allows_junk };
        }

        let bridges = BridgeFinder::new(cfg);
        let mut to_visit = Vec::new();
        for &block in sort.pre_order() {
            allows_junk[block.index()] =
                bridges.bridge_vertex(block) || cfg.block(block).is_termination_block();
            if cfg.block(block).is_function_return_block() {
                to_visit.push(block);
            }
        }

        // clear everything that can reach a function return
        let mut visited = vec![false; cfg.block_count()];
        while let Some(block) = to_visit.pop() {
            allows_junk[block.index()] = false;
            visited[block.index()] = true;
            for &entry in &cfg.block(block).entries {
                if !visited[entry.index()] {
                    to_visit.push(entry);
                }
            }
        }

        JunkAdmittingBlocks { allows_junk }
    }

    /// Whether junk may be introduced while control is in `block`.
    #[must_use]
    pub fn allows_addition_of_junk(&self, block: BlockId) -> bool {
        self.allows_junk[block.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::Exit;
    use crate::ast::DebugData;

    fn jump(cfg: &mut SsaCfg, from: BlockId, to: BlockId) {
        cfg.block_mut(from).exit = Exit::Jump { target: to };
        cfg.block_mut(to).entries.insert(from);
    }

    fn branch(cfg: &mut SsaCfg, from: BlockId, non_zero: BlockId, zero: BlockId) {
        let condition = cfg.new_literal(DebugData::EMPTY, 1);
        cfg.block_mut(from).exit = Exit::ConditionalJump {
            condition,
            non_zero,
            zero,
        };
        cfg.block_mut(non_zero).entries.insert(from);
        cfg.block_mut(zero).entries.insert(from);
    }

    #[test]
    fn test_single_block_main_graph_admits_junk() {
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;
        // default exit is the main exit

        let sort = TopologicalSort::new(&cfg);
        let junk = JunkAdmittingBlocks::new(&cfg, &sort);
        assert!(junk.allows_addition_of_junk(entry));
    }

    #[test]
    fn test_single_block_function_return_does_not() {
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;
        cfg.block_mut(entry).exit = Exit::FunctionReturn {
            return_values: vec![],
        };

        let sort = TopologicalSort::new(&cfg);
        let junk = JunkAdmittingBlocks::new(&cfg, &sort);
        assert!(!junk.allows_addition_of_junk(entry));
    }

    #[test]
    fn test_diamond_branches_do_not_admit_junk() {
        // A -> B | C -> D(main exit): B and C lie on parallel paths, D is a
        // bridge and a termination block
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        let d = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        branch(&mut cfg, a, b, c);
        jump(&mut cfg, b, d);
        cfg.block_mut(c).exit = Exit::Jump { target: d };
        cfg.block_mut(d).entries.insert(c);

        let sort = TopologicalSort::new(&cfg);
        let junk = JunkAdmittingBlocks::new(&cfg, &sort);
        assert!(!junk.allows_addition_of_junk(b));
        assert!(!junk.allows_addition_of_junk(c));
        assert!(junk.allows_addition_of_junk(d));
    }

    #[test]
    fn test_function_return_clears_whole_path() {
        // A - B - C(function return): every block reaches the return
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        jump(&mut cfg, a, b);
        jump(&mut cfg, b, c);
        cfg.block_mut(c).exit = Exit::FunctionReturn {
            return_values: vec![],
        };

        let sort = TopologicalSort::new(&cfg);
        let junk = JunkAdmittingBlocks::new(&cfg, &sort);
        for block in [a, b, c] {
            assert!(!junk.allows_addition_of_junk(block));
        }
    }

    #[test]
    fn test_terminated_branch_admits_junk_despite_return_elsewhere() {
        // A -> B(terminated) | C(function return): only B admits junk
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        branch(&mut cfg, a, b, c);
        cfg.block_mut(b).exit = Exit::Terminated;
        cfg.block_mut(c).exit = Exit::FunctionReturn {
            return_values: vec![],
        };

        let sort = TopologicalSort::new(&cfg);
        let junk = JunkAdmittingBlocks::new(&cfg, &sort);
        assert!(junk.allows_addition_of_junk(b));
        assert!(!junk.allows_addition_of_junk(c));
        assert!(!junk.allows_addition_of_junk(a), "entry reaches the return");
    }
}
