//! SSA control flow graphs for structured assembly.
//!
//! This module family owns the IR the middle end works on and its
//! construction:
//!
//! - [`value`](self) types — [`BlockId`], [`ValueId`] with kind tags,
//!   [`ValueInfo`] table entries
//! - [`BasicBlock`] with typed [`Exit`]s and stack-ordered [`Operation`]s
//! - [`SsaCfg`] / [`ControlFlow`] — the owning tables, plus the
//!   [`CallSites`] registry
//! - [`CfgBuilder`] — on-the-fly SSA construction (Braun et al.) with
//!   incremental φ insertion, trivial-φ elimination and unreachable-edge
//!   pruning
//! - the [`Stack`] slot model the stack-layout layer builds on
//!
//! # Construction pipeline
//!
//! ```rust,ignore
//! use evmir::analysis::CfgBuilder;
//! use evmir::{resolve, Dialect, EvmVersion, SideEffects};
//!
//! let dialect = Dialect::for_version(EvmVersion::Cancun, None);
//! let scopes = resolve(&mut ast, &dialect)?;
//! let side_effects = SideEffects::collect(&ast, &scopes, &dialect);
//! let control_flow = CfgBuilder::new(&scopes, &side_effects, &dialect).build(&ast);
//!
//! for block in control_flow.main.block_ids() {
//!     println!("{}", control_flow.main.block(block));
//! }
//! ```

mod block;
mod builder;
mod cfg;
mod stack;
mod value;

pub use block::{BasicBlock, Exit, OpKind, Operation};
pub use builder::{BuildOptions, CfgBuilder};
pub use cfg::{CallSiteId, CallSites, ControlFlow, FunctionGraphId, SsaCfg};
pub use stack::{
    stack_to_string, Depth, NoOpCallbacks, Offset, SlotKind, Stack, StackCallbacks, StackSlot,
    REACHABLE_STACK_DEPTH,
};
pub use value::{BlockId, PhiValue, ValueId, ValueInfo, ValueKind};
