#![deny(missing_docs)]

//! # evmir
//!
//! An SSA-based compiler middle-end for EVM structured assembly. `evmir`
//! takes a resolved AST of the structured assembly language — blocks of
//! declarations, assignments, conditionals, switches, counted loops and
//! function definitions — and turns it into a static-single-assignment
//! control flow graph, runs dataflow analyses over it, and offers IR-level
//! optimization passes.
//!
//! # Architecture
//!
//! The crate is organized into a handful of module families:
//!
//! - [`ast`] — the input language, produced by an external front end
//! - [`dialect`] — the per-target registry of builtins and reserved names,
//!   cached process-wide per target version
//! - [`scope`] — symbol arenas, scope tables and a minimal resolver
//! - [`sideeffects`] — per-function control-flow summaries (`can_continue`)
//! - [`analysis`] — SSA construction ([`analysis::CfgBuilder`], Braun et
//!   al.'s on-the-fly algorithm with incremental φ insertion and trivial-φ
//!   elimination), the typed CFG data model, the stack-slot model, and the
//!   dataflow analyses: topological ordering, loop-nesting forest, use-count
//!   liveness, bridges and junk admissibility
//! - [`compiler`] — AST-level passes, currently loop unrolling with a
//!   gas-based profitability analysis
//!
//! # Quick start
//!
//! ```rust
//! use evmir::analysis::{CfgBuilder, LivenessAnalysis};
//! use evmir::ast::{Block, DebugData, Expression, Literal, Statement, VariableDeclaration, Identifier};
//! use evmir::dialect::{Dialect, EvmVersion};
//! use evmir::{resolve, SideEffects};
//!
//! // let x := 42  (a front end would normally produce this)
//! let mut ast = Block::new(vec![Statement::VariableDeclaration(VariableDeclaration {
//!     variables: vec![Identifier { name: "x".to_string(), debug: DebugData::EMPTY }],
//!     value: Some(Expression::Literal(Literal { value: 42, debug: DebugData::EMPTY })),
//!     debug: DebugData::EMPTY,
//! })]);
//!
//! let dialect = Dialect::for_version(EvmVersion::Cancun, None);
//! let scopes = resolve(&mut ast, &dialect)?;
//! let side_effects = SideEffects::collect(&ast, &scopes, &dialect);
//! let control_flow = CfgBuilder::new(&scopes, &side_effects, &dialect).build(&ast);
//!
//! let liveness = LivenessAnalysis::new(&control_flow.main);
//! assert!(liveness.live_in(control_flow.main.entry).is_empty());
//! # Ok::<(), evmir::Error>(())
//! ```
//!
//! # Error handling
//!
//! Failures caused by inputs (unresolved names, reserved identifiers, arity
//! mismatches) surface as [`Error`]. Violations of internal IR invariants
//! are bugs and abort via assertions — see the invariants documented on the
//! [`analysis::ssa`] types.
//!
//! # Concurrency
//!
//! Everything is single-threaded and synchronous. The only process-wide
//! state is the dialect cache; concurrent compilations of distinct inputs
//! are safe as long as each owns its own graphs and analyses.

pub mod analysis;
pub mod ast;
pub mod compiler;
pub mod dialect;
mod error;
pub mod scope;
pub mod sideeffects;

pub use error::{Error, Result};
pub use scope::resolve;
pub use sideeffects::SideEffects;
