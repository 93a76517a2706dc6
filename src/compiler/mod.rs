//! AST-level optimization passes.
//!
//! Passes transform the input language before SSA construction: each one
//! takes a block tree and rewrites it in place, preserving semantics. The
//! family currently consists of loop unrolling, which also fixes the shape
//! transformation passes follow here:
//!
//! - a *pass* struct walking the tree and splicing replacement statements,
//! - a separate *analysis* deciding per construct whether to transform,
//!   answering with a decision value (never an error) that carries a
//!   human-readable reason when declining.
//!
//! ```rust,ignore
//! use evmir::compiler::LoopUnrolling;
//!
//! LoopUnrolling::run(&dialect, &mut ast);
//! let scopes = evmir::resolve(&mut ast, &dialect)?; // re-resolve after passes
//! ```

mod passes;

pub use passes::{LoopUnrolling, UnrollAnalysis, UnrollDecision};
