//! Liveness analysis with use counts.
//!
//! Follows the non-iterative liveness algorithm for reducible SSA CFGs from
//! Rastello & Bouchez Tichadou, *SSA-based Compiler Design* (Springer 2022):
//! one backward pass over the loop-free graph in post-order (Algorithm 9.2),
//! then a loop-forest walk propagating header liveness into loop bodies to
//! close the back edges (Algorithm 9.3).
//!
//! Liveness here is *counted*: a value is live with the number of times it
//! will still be used downstream, summed across paths. Joins take the
//! per-value maximum — each branch may consume its own copies. The counts
//! are what the stack layout later uses to decide how many duplicates of a
//! value to keep around.
//!
//! Literal and unreachable values are never tracked.

use std::fmt;
use std::ops::{AddAssign, SubAssign};

use crate::analysis::dataflow::{LoopNestingForest, TopologicalSort};
use crate::analysis::ssa::{BlockId, Exit, SsaCfg, ValueId};

/// A set of live values with use counts, stored as a small association list.
///
/// Entries are unique per value; insertion order carries no meaning. The
/// list form keeps joins and differences cheap at the sizes real blocks
/// produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessData {
    live_counts: Vec<(ValueId, u32)>,
}

impl LivenessData {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        LivenessData::default()
    }

    /// Whether `value` is live.
    #[must_use]
    pub fn contains(&self, value: ValueId) -> bool {
        self.find(value).is_some()
    }

    /// The use count of `value`; zero when not live.
    #[must_use]
    pub fn count(&self, value: ValueId) -> u32 {
        self.find(value).map_or(0, |index| self.live_counts[index].1)
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_counts.len()
    }

    /// Whether nothing is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_counts.is_empty()
    }

    /// Iterates over `(value, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ValueId, u32)> + '_ {
        self.live_counts.iter().copied()
    }

    /// Adds one use of `value`.
    pub fn insert(&mut self, value: ValueId) {
        self.insert_count(value, 1);
    }

    /// Adds `count` uses of `value`; inserting zero is a no-op.
    pub fn insert_count(&mut self, value: ValueId, count: u32) {
        if count == 0 {
            return;
        }
        match self.find(value) {
            Some(index) => self.live_counts[index].1 += count,
            None => self.live_counts.push((value, count)),
        }
    }

    /// Removes `value` entirely, regardless of its count.
    pub fn erase(&mut self, value: ValueId) {
        if let Some(index) = self.find(value) {
            self.live_counts.swap_remove(index);
        }
    }

    /// Removes one use of `value`, dropping it at count zero.
    pub fn remove(&mut self, value: ValueId) {
        self.remove_count(value, 1);
    }

    /// Removes `count` uses of `value`, dropping it when exhausted.
    pub fn remove_count(&mut self, value: ValueId, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(index) = self.find(value) {
            if self.live_counts[index].1 <= count {
                self.live_counts.swap_remove(index);
            } else {
                self.live_counts[index].1 -= count;
            }
        }
    }

    /// Per-value maximum with `other`: models a join where each side may
    /// consume its own copies.
    pub fn max_union(&mut self, other: &LivenessData) {
        for &(value, count) in &other.live_counts {
            match self.find(value) {
                Some(index) => {
                    let entry = &mut self.live_counts[index].1;
                    *entry = (*entry).max(count);
                }
                None => self.live_counts.push((value, count)),
            }
        }
    }

    /// Adds one use of every value in the iterator.
    pub fn insert_all<I: IntoIterator<Item = ValueId>>(&mut self, values: I) {
        for value in values {
            self.insert(value);
        }
    }

    /// Erases every value in the iterator.
    pub fn erase_all<I: IntoIterator<Item = ValueId>>(&mut self, values: I) {
        for value in values {
            self.erase(value);
        }
    }

    /// Keeps only entries matching the predicate.
    pub fn retain<F: FnMut(ValueId, u32) -> bool>(&mut self, mut predicate: F) {
        self.live_counts
            .retain(|&(value, count)| predicate(value, count));
    }

    fn find(&self, value: ValueId) -> Option<usize> {
        self.live_counts
            .iter()
            .position(|&(candidate, _)| candidate == value)
    }
}

/// Union summing counts.
impl AddAssign<&LivenessData> for LivenessData {
    fn add_assign(&mut self, other: &LivenessData) {
        for &(value, count) in &other.live_counts {
            self.insert_count(value, count);
        }
    }
}

/// Difference dropping every value present in `other`, whatever the counts.
impl SubAssign<&LivenessData> for LivenessData {
    fn sub_assign(&mut self, other: &LivenessData) {
        self.live_counts
            .retain(|&(value, _)| !other.contains(value));
    }
}

impl FromIterator<(ValueId, u32)> for LivenessData {
    fn from_iter<I: IntoIterator<Item = (ValueId, u32)>>(iter: I) -> Self {
        let mut data = LivenessData::new();
        for (value, count) in iter {
            data.insert_count(value, count);
        }
        data
    }
}

impl fmt::Display for LivenessData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut sorted: Vec<(ValueId, u32)> = self.live_counts.clone();
        sorted.sort_unstable();
        for (i, (value, count)) in sorted.into_iter().enumerate() {
            write!(f, "{}{value}:{count}", if i == 0 { "" } else { ", " })?;
        }
        write!(f, "}}")
    }
}

/// Per-block liveness of an SSA CFG.
///
/// Requires the graph in its final, pruned shape. Results are exposed as
/// live-in/live-out per block, live-out per operation, and the
/// [`used`](LivenessAnalysis::used) difference.
#[derive(Debug)]
pub struct LivenessAnalysis<'a> {
    cfg: &'a SsaCfg,
    topological_sort: TopologicalSort<'a>,
    loop_forest: LoopNestingForest,
    live_ins: Vec<LivenessData>,
    live_outs: Vec<LivenessData>,
    operation_live_outs: Vec<Vec<LivenessData>>,
}

impl<'a> LivenessAnalysis<'a> {
    /// Runs the analysis over a pruned graph.
    #[must_use]
    pub fn new(cfg: &'a SsaCfg) -> Self {
        let topological_sort = TopologicalSort::new(cfg);
        let loop_forest = LoopNestingForest::new(&topological_sort);
        let block_count = cfg.block_count();
        let mut analysis = LivenessAnalysis {
            cfg,
            topological_sort,
            loop_forest,
            live_ins: vec![LivenessData::new(); block_count],
            live_outs: vec![LivenessData::new(); block_count],
            operation_live_outs: vec![Vec::new(); block_count],
        };
        analysis.run_dag_dfs();
        for root in analysis.loop_forest.loop_root_nodes() {
            analysis.run_loop_tree_dfs(root);
        }
        analysis.fill_operations_live_out();
        analysis
    }

    /// Values live when entering `block`.
    #[must_use]
    pub fn live_in(&self, block: BlockId) -> &LivenessData {
        &self.live_ins[block.index()]
    }

    /// Values live when leaving `block`.
    #[must_use]
    pub fn live_out(&self, block: BlockId) -> &LivenessData {
        &self.live_outs[block.index()]
    }

    /// Live sets *after* each operation of `block`, aligned with the
    /// operation sequence.
    #[must_use]
    pub fn operations_live_out(&self, block: BlockId) -> &[LivenessData] {
        &self.operation_live_outs[block.index()]
    }

    /// Values live into `block` but not out of it: what the block consumes.
    #[must_use]
    pub fn used(&self, block: BlockId) -> LivenessData {
        let mut used = self.live_ins[block.index()].clone();
        for (value, count) in self.live_outs[block.index()].iter() {
            used.remove_count(value, count);
        }
        used
    }

    /// The topological sort the analysis ran on.
    #[must_use]
    pub const fn topological_sort(&self) -> &TopologicalSort<'a> {
        &self.topological_sort
    }

    /// The loop forest the analysis ran on.
    #[must_use]
    pub const fn loop_forest(&self) -> &LoopNestingForest {
        &self.loop_forest
    }

    /// The graph the analysis ran on.
    #[must_use]
    pub const fn cfg(&self) -> &'a SsaCfg {
        self.cfg
    }

    /// Backward pass over the loop-free graph in post-order.
    fn run_dag_dfs(&mut self) {
        let cfg = self.cfg;
        for index in 0..self.topological_sort.post_order().len() {
            let block_id = self.topological_sort.post_order()[index];
            let block = cfg.block(block_id);

            // live <- PhiUses(B): the argument slots this block feeds
            let mut live = LivenessData::new();
            block.for_each_exit(|successor| {
                for &phi in &cfg.block(successor).phis {
                    let info = cfg
                        .value_info(phi)
                        .as_phi()
                        .expect("phi value without phi info");
                    let argument_index = cfg.phi_argument_index(block_id, successor);
                    assert!(argument_index < info.arguments.len(), "incomplete phi");
                    let argument = info.arguments[argument_index];
                    if !argument.is_literal() {
                        live.insert(argument);
                    }
                }
            });

            // live <- live ∪max (LiveIn(S) \ PhiDefs(S)) over forward edges
            block.for_each_exit(|successor| {
                if !self.topological_sort.back_edge(block_id, successor) {
                    let mut live_in = self.live_ins[successor.index()].clone();
                    for &phi in &cfg.block(successor).phis {
                        live_in.erase(phi);
                    }
                    live.max_union(&live_in);
                }
            });

            if let Exit::FunctionReturn { return_values } = &block.exit {
                for &value in return_values {
                    if !value.is_literal() {
                        live.insert(value);
                    }
                }
            }

            live.retain(|value, _| !value.is_unreachable());
            self.live_outs[block_id.index()] = live.clone();

            // walk the block backwards to the entry point
            live += &self.block_exit_values(block_id);
            for operation in block.operations.iter().rev() {
                live.erase_all(
                    operation
                        .outputs
                        .iter()
                        .copied()
                        .filter(|output| !output.is_literal()),
                );
                live.insert_all(
                    operation
                        .inputs
                        .iter()
                        .copied()
                        .filter(|input| !input.is_literal()),
                );
            }

            // LiveIn(B) <- live ∪ PhiDefs(B)
            for &phi in &block.phis {
                live.insert(phi);
            }
            self.live_ins[block_id.index()] = live;
        }
    }

    /// Propagates loop-header liveness into the loop body, closing the back
    /// edges the DAG pass skipped.
    fn run_loop_tree_dfs(&mut self, header: BlockId) {
        if !self.loop_forest.is_loop_header(header) {
            return;
        }
        // LiveLoop <- LiveIn(header) \ PhiDefs(header)
        let mut live_loop = self.live_ins[header.index()].clone();
        for &phi in &self.cfg.block(header).phis {
            live_loop.erase(phi);
        }
        // whatever is live into the loop stays live around it
        self.live_outs[header.index()].max_union(&live_loop);
        for child in self.loop_forest.children(header) {
            self.live_ins[child.index()].max_union(&live_loop);
            self.live_outs[child.index()].max_union(&live_loop);
            self.run_loop_tree_dfs(child);
        }
    }

    /// Materializes the per-operation live-out vectors.
    fn fill_operations_live_out(&mut self) {
        let cfg = self.cfg;
        for block_id in cfg.block_ids() {
            let block = cfg.block(block_id);
            let exit_values = self.block_exit_values(block_id);
            let live_outs = &mut self.operation_live_outs[block_id.index()];
            live_outs.resize(block.operations.len(), LivenessData::new());
            if block.operations.is_empty() {
                continue;
            }
            let mut live = self.live_outs[block_id.index()].clone();
            live += &exit_values;
            for (index, operation) in block.operations.iter().enumerate().rev() {
                live_outs[index] = live.clone();
                live.erase_all(
                    operation
                        .outputs
                        .iter()
                        .copied()
                        .filter(|output| !output.is_literal()),
                );
                live.insert_all(
                    operation
                        .inputs
                        .iter()
                        .copied()
                        .filter(|input| !input.is_literal()),
                );
            }
        }
    }

    /// The non-literal values the block's exit clause consumes.
    fn block_exit_values(&self, block: BlockId) -> LivenessData {
        let mut values = LivenessData::new();
        match &self.cfg.block(block).exit {
            Exit::FunctionReturn { return_values } => {
                values.insert_all(
                    return_values
                        .iter()
                        .copied()
                        .filter(|value| !value.is_literal()),
                );
            }
            Exit::ConditionalJump { condition, .. } => {
                if !condition.is_literal() {
                    values.insert(*condition);
                }
            }
            Exit::JumpTable { value, .. } => {
                if !value.is_literal() {
                    values.insert(*value);
                }
            }
            Exit::MainExit | Exit::Jump { .. } | Exit::Terminated => {}
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::ValueKind;

    fn value(payload: u32) -> ValueId {
        ValueId {
            payload,
            kind: ValueKind::Variable,
        }
    }

    #[test]
    fn test_insert_remove_counts() {
        let mut data = LivenessData::new();
        assert!(data.is_empty());

        data.insert(value(1));
        data.insert(value(1));
        data.insert_count(value(2), 3);
        assert_eq!(data.count(value(1)), 2);
        assert_eq!(data.count(value(2)), 3);
        assert_eq!(data.len(), 2);

        data.remove(value(1));
        assert_eq!(data.count(value(1)), 1);
        data.remove(value(1));
        assert!(!data.contains(value(1)));

        data.remove_count(value(2), 5);
        assert!(data.is_empty());
    }

    #[test]
    fn test_insert_zero_is_noop() {
        let mut data = LivenessData::new();
        data.insert_count(value(1), 0);
        assert!(data.is_empty());
    }

    #[test]
    fn test_erase_ignores_count() {
        let mut data = LivenessData::new();
        data.insert_count(value(1), 10);
        data.erase(value(1));
        assert!(data.is_empty());
    }

    #[test]
    fn test_add_assign_sums() {
        let mut a: LivenessData = [(value(1), 2), (value(2), 1)].into_iter().collect();
        let b: LivenessData = [(value(1), 3), (value(3), 1)].into_iter().collect();
        a += &b;
        assert_eq!(a.count(value(1)), 5);
        assert_eq!(a.count(value(2)), 1);
        assert_eq!(a.count(value(3)), 1);
    }

    #[test]
    fn test_sub_assign_drops_values() {
        let mut a: LivenessData = [(value(1), 5), (value(2), 1)].into_iter().collect();
        let b: LivenessData = [(value(1), 1)].into_iter().collect();
        a -= &b;
        assert!(!a.contains(value(1)), "difference ignores counts");
        assert!(a.contains(value(2)));
    }

    #[test]
    fn test_max_union_takes_maximum() {
        let mut a: LivenessData = [(value(1), 2), (value(2), 4)].into_iter().collect();
        let b: LivenessData = [(value(1), 3), (value(2), 1), (value(3), 7)]
            .into_iter()
            .collect();
        a.max_union(&b);
        assert_eq!(a.count(value(1)), 3);
        assert_eq!(a.count(value(2)), 4);
        assert_eq!(a.count(value(3)), 7);
    }

    #[test]
    fn test_display_is_sorted() {
        let data: LivenessData = [(value(2), 1), (value(1), 2)].into_iter().collect();
        assert_eq!(data.to_string(), "{v1:2, v2:1}");
    }
}
