//! Program analysis: SSA form and the dataflow analyses over it.
//!
//! The [`ssa`] family owns the IR — graphs, blocks, values, the construction
//! algorithm and the stack-slot model. The [`dataflow`] family consumes
//! finished graphs: orderings, loops, liveness, junk admissibility.
//!
//! Primary types are re-exported here; `analysis::CfgBuilder` and friends
//! are the intended spelling for downstream code.

pub mod dataflow;
pub mod ssa;

pub use dataflow::{
    BridgeFinder, JunkAdmittingBlocks, LivenessAnalysis, LivenessData, LoopNestingForest,
    TopologicalSort,
};
pub use ssa::{
    stack_to_string, BasicBlock, BlockId, BuildOptions, CallSiteId, CallSites, CfgBuilder,
    ControlFlow, Depth, Exit, FunctionGraphId, NoOpCallbacks, Offset, OpKind, Operation,
    PhiValue, SlotKind, SsaCfg, Stack, StackCallbacks, StackSlot, ValueId, ValueInfo, ValueKind,
    REACHABLE_STACK_DEPTH,
};
