//! Dataflow analyses over SSA control flow graphs.
//!
//! All analyses here consume a finished, pruned [`SsaCfg`] and never mutate
//! it:
//!
//! - [`TopologicalSort`] — forward DFS orders with back-edge classification;
//!   the foundation everything else is driven by
//! - [`LoopNestingForest`] — the reducible-loop hierarchy derived from the
//!   back edges
//! - [`LivenessAnalysis`] — per-block and per-operation liveness with use
//!   counts ([`LivenessData`])
//! - [`BridgeFinder`] / [`JunkAdmittingBlocks`] — the structural analysis
//!   deciding where stack junk is tolerable
//!
//! Ordering matters only in that liveness requires the CFG in its final
//! post-pruning shape; all analyses are pure queries afterwards.
//!
//! [`SsaCfg`]: crate::analysis::ssa::SsaCfg

mod bridges;
mod junk;
mod liveness;
mod loops;
mod topo;

pub use bridges::BridgeFinder;
pub use junk::JunkAdmittingBlocks;
pub use liveness::{LivenessAnalysis, LivenessData};
pub use loops::LoopNestingForest;
pub use topo::TopologicalSort;
