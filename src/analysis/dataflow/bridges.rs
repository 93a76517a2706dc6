//! Bridge vertices of a CFG.
//!
//! A *bridge vertex* is a block whose removal disconnects the graph,
//! considering edges as undirected — a cut vertex. Control flow that enters
//! a bridge never rejoins a previously visited block over a parallel path,
//! which is the structural property the junk-admissibility analysis builds
//! on: extra stack content introduced past a bridge cannot clash with the
//! stack layout of any other path.
//!
//! Computed with the classic low-link depth-first search, kept iterative so
//! deep chains of blocks cannot overflow the call stack. Only blocks
//! reachable from the entry participate.

use crate::analysis::ssa::{BlockId, SsaCfg};

/// Cut-vertex computation over the undirected view of a CFG.
#[derive(Debug)]
pub struct BridgeFinder {
    bridge: Vec<bool>,
}

impl BridgeFinder {
    /// Finds all bridge vertices of `cfg`.
    #[must_use]
    pub fn new(cfg: &SsaCfg) -> Self {
        let block_count = cfg.block_count();
        let mut finder = BridgeFinder {
            bridge: vec![false; block_count],
        };
        if block_count == 0 {
            return finder;
        }

        // undirected adjacency, restricted to blocks reachable from entry
        let mut reachable = vec![false; block_count];
        let mut queue = vec![cfg.entry];
        reachable[cfg.entry.index()] = true;
        while let Some(block) = queue.pop() {
            cfg.block(block).for_each_exit(|successor| {
                if !reachable[successor.index()] {
                    reachable[successor.index()] = true;
                    queue.push(successor);
                }
            });
        }
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); block_count];
        for block in cfg.block_ids() {
            if !reachable[block.index()] {
                continue;
            }
            cfg.block(block).for_each_exit(|successor| {
                adjacency[block.index()].push(successor.index());
                adjacency[successor.index()].push(block.index());
            });
        }

        finder.run(cfg.entry.index(), &adjacency);
        finder
    }

    /// Whether `block` is a bridge vertex.
    #[must_use]
    pub fn bridge_vertex(&self, block: BlockId) -> bool {
        self.bridge[block.index()]
    }

    /// Iterative low-link DFS marking articulation vertices.
    fn run(&mut self, root: usize, adjacency: &[Vec<usize>]) {
        struct Frame {
            node: usize,
            parent: usize,
            next_neighbor: usize,
            /// one edge back to the parent is the tree edge, further
            /// parallel edges count as back edges
            skipped_parent_edge: bool,
        }

        let node_count = adjacency.len();
        let mut disc = vec![usize::MAX; node_count];
        let mut low = vec![usize::MAX; node_count];
        let mut time = 0usize;
        let mut root_children = 0usize;

        disc[root] = time;
        low[root] = time;
        time += 1;
        let mut stack = vec![Frame {
            node: root,
            parent: usize::MAX,
            next_neighbor: 0,
            skipped_parent_edge: false,
        }];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if let Some(&neighbor) = adjacency[node].get(frame.next_neighbor) {
                frame.next_neighbor += 1;
                if neighbor == frame.parent && !frame.skipped_parent_edge {
                    frame.skipped_parent_edge = true;
                    continue;
                }
                if disc[neighbor] != usize::MAX {
                    low[node] = low[node].min(disc[neighbor]);
                } else {
                    disc[neighbor] = time;
                    low[neighbor] = time;
                    time += 1;
                    if node == root {
                        root_children += 1;
                    }
                    stack.push(Frame {
                        node: neighbor,
                        parent: node,
                        next_neighbor: 0,
                        skipped_parent_edge: false,
                    });
                }
            } else {
                let finished = node;
                stack.pop();
                if let Some(parent_frame) = stack.last() {
                    let parent = parent_frame.node;
                    low[parent] = low[parent].min(low[finished]);
                    if parent != root && low[finished] >= disc[parent] {
                        self.bridge[parent] = true;
                    }
                }
            }
        }

        self.bridge[root] = root_children >= 2;
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
    fn test_chain_middle_is_bridge() {
        // A - B - C: removing B disconnects A from C
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        jump(&mut cfg, a, b);
        jump(&mut cfg, b, c);

        let finder = BridgeFinder::new(&cfg);
        assert!(!finder.bridge_vertex(a));
        assert!(finder.bridge_vertex(b));
        assert!(!finder.bridge_vertex(c));
    }

    #[test]
    fn test_diamond_has_no_internal_bridges() {
        // A -> B | C, both -> D: every vertex lies on a parallel path
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

        let finder = BridgeFinder::new(&cfg);
        for block in [a, b, c, d] {
            assert!(!finder.bridge_vertex(block), "{block} must not be a bridge");
        }
    }

    #[test]
    fn test_diamond_with_tail_bridge() {
        // diamond A/B/C/D followed by D - E: D separates E from the diamond
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        let b = cfg.make_block(DebugData::EMPTY);
        let c = cfg.make_block(DebugData::EMPTY);
        let d = cfg.make_block(DebugData::EMPTY);
        let e = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        branch(&mut cfg, a, b, c);
        jump(&mut cfg, b, d);
        cfg.block_mut(c).exit = Exit::Jump { target: d };
        cfg.block_mut(d).entries.insert(c);
        jump(&mut cfg, d, e);

        let finder = BridgeFinder::new(&cfg);
        assert!(finder.bridge_vertex(d));
        assert!(!finder.bridge_vertex(e));
        assert!(!finder.bridge_vertex(a));
    }

    #[test]
    fn test_single_block_graph() {
        let mut cfg = SsaCfg::new();
        let a = cfg.make_block(DebugData::EMPTY);
        cfg.entry = a;
        let finder = BridgeFinder::new(&cfg);
        assert!(!finder.bridge_vertex(a));
    }
}
