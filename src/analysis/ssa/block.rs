//! Basic blocks of the SSA CFG.
//!
//! A block holds its phi set, an ordered operation sequence, its predecessor
//! set and exactly one typed [`Exit`]. Predecessors live in a `BTreeSet`,
//! which is what gives the *stable ordering* phi arguments are aligned with:
//! the i-th argument of every phi in a block belongs to the i-th predecessor
//! in sorted order (see [`SsaCfg::phi_argument_index`]).
//!
//! Operation inputs are recorded in reverse argument order — top of stack
//! first — the calling convention used throughout the backend.
//!
//! [`SsaCfg::phi_argument_index`]: crate::analysis::ssa::SsaCfg::phi_argument_index

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::analysis::ssa::{BlockId, CallSiteId, ValueId};
use crate::ast::{DebugData, Word};
use crate::dialect::BuiltinHandle;
use crate::scope::FunctionId;

/// What an operation does; the payloads refer back to the dialect and the
/// call-site registry rather than carrying descriptors inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// A call to a dialect builtin.
    BuiltinCall {
        /// Handle of the builtin within the dialect the graph was built for.
        builtin: BuiltinHandle,
        /// The originating call site; literal-only arguments are found there.
        call_site: CallSiteId,
    },
    /// A call to a user-defined function.
    Call {
        /// The callee's function symbol.
        function: FunctionId,
        /// The originating call site.
        call_site: CallSiteId,
        /// Whether control can return to the statement after the call.
        can_continue: bool,
    },
    /// Wraps a literal input into a fresh output so later passes can track
    /// the assignment instead of seeing the literal directly.
    LiteralAssignment,
}

/// One operation: `outputs := kind(inputs)`, inputs top-of-stack first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Result values, each defined exactly here.
    pub outputs: Vec<ValueId>,
    /// The operation kind.
    pub kind: OpKind,
    /// Argument values in reverse argument order.
    pub inputs: Vec<ValueId>,
}

/// The single typed exit of a basic block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Exit {
    /// Terminates the top-level graph.
    #[default]
    MainExit,
    /// Returns from a function graph.
    FunctionReturn {
        /// Values for the function's return variables, in declaration order.
        return_values: Vec<ValueId>,
    },
    /// Unconditional jump.
    Jump {
        /// Jump target.
        target: BlockId,
    },
    /// Two-way branch on `condition != 0`.
    ConditionalJump {
        /// Branch condition.
        condition: ValueId,
        /// Target when the condition is non-zero.
        non_zero: BlockId,
        /// Target when the condition is zero.
        zero: BlockId,
    },
    /// Dense multi-way branch.
    JumpTable {
        /// Selector value.
        value: ValueId,
        /// Case targets by selector value.
        cases: BTreeMap<Word, BlockId>,
        /// Target when no case matches.
        default: BlockId,
    },
    /// Unreachable: control never leaves this block (e.g. after a
    /// non-continuing call).
    Terminated,
}

/// A basic block.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Source tag.
    pub debug: DebugData,
    /// Phi values merging at this block's entry.
    pub phis: BTreeSet<ValueId>,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
    /// Predecessor blocks in stable (sorted) order.
    pub entries: BTreeSet<BlockId>,
    /// The block's exit.
    pub exit: Exit,
}

impl BasicBlock {
    /// Invokes `f` for every successor block of this block's exit.
    pub fn for_each_exit<F: FnMut(BlockId)>(&self, mut f: F) {
        match &self.exit {
            Exit::Jump { target } => f(*target),
            Exit::ConditionalJump { non_zero, zero, .. } => {
                f(*non_zero);
                f(*zero);
            }
            Exit::JumpTable { cases, default, .. } => {
                for target in cases.values() {
                    f(*target);
                }
                f(*default);
            }
            Exit::MainExit | Exit::FunctionReturn { .. } | Exit::Terminated => {}
        }
    }

    /// Returns the successor blocks of this block.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        let mut successors = Vec::new();
        self.for_each_exit(|target| successors.push(target));
        successors
    }

    /// Whether this block returns from a function graph.
    #[must_use]
    pub fn is_function_return_block(&self) -> bool {
        matches!(self.exit, Exit::FunctionReturn { .. })
    }

    /// Whether execution stops in this block (main exit or terminated).
    #[must_use]
    pub fn is_termination_block(&self) -> bool {
        matches!(self.exit, Exit::MainExit | Exit::Terminated)
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exit::MainExit => write!(f, "exit"),
            Exit::FunctionReturn { return_values } => {
                write!(f, "return")?;
                for (i, value) in return_values.iter().enumerate() {
                    write!(f, "{}{value}", if i == 0 { " " } else { ", " })?;
                }
                Ok(())
            }
            Exit::Jump { target } => write!(f, "jump {target}"),
            Exit::ConditionalJump {
                condition,
                non_zero,
                zero,
            } => write!(f, "branch {condition} ? {non_zero} : {zero}"),
            Exit::JumpTable {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {value} [")?;
                for (case, target) in cases {
                    write!(f, "{case} -> {target}, ")?;
                }
                write!(f, "default -> {default}]")
            }
            Exit::Terminated => write!(f, "terminated"),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for phi in &self.phis {
            writeln!(f, "  {phi} = phi")?;
        }
        for op in &self.operations {
            write!(f, "  ")?;
            for (i, output) in op.outputs.iter().enumerate() {
                write!(f, "{}{output}", if i == 0 { "" } else { ", " })?;
            }
            if !op.outputs.is_empty() {
                write!(f, " := ")?;
            }
            match &op.kind {
                OpKind::BuiltinCall { builtin, .. } => write!(f, "{builtin}(")?,
                OpKind::Call { function, .. } => write!(f, "f{}(", function.index())?,
                OpKind::LiteralAssignment => write!(f, "lit(")?,
            }
            for (i, input) in op.inputs.iter().enumerate() {
                write!(f, "{}{input}", if i == 0 { "" } else { ", " })?;
            }
            writeln!(f, ")")?;
        }
        writeln!(f, "  {}", self.exit)
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
    fn test_successors_of_exits() {
        let mut block = BasicBlock::default();
        assert!(block.successors().is_empty());

        block.exit = Exit::Jump {
            target: BlockId::new(1),
        };
        assert_eq!(block.successors(), vec![BlockId::new(1)]);

        block.exit = Exit::ConditionalJump {
            condition: value(0),
            non_zero: BlockId::new(1),
            zero: BlockId::new(2),
        };
        assert_eq!(block.successors(), vec![BlockId::new(1), BlockId::new(2)]);

        let mut cases = BTreeMap::new();
        cases.insert(0, BlockId::new(1));
        cases.insert(7, BlockId::new(2));
        block.exit = Exit::JumpTable {
            value: value(0),
            cases,
            default: BlockId::new(3),
        };
        assert_eq!(
            block.successors(),
            vec![BlockId::new(1), BlockId::new(2), BlockId::new(3)]
        );
    }

    #[test]
    fn test_block_classification() {
        let mut block = BasicBlock::default();
        assert!(block.is_termination_block());
        assert!(!block.is_function_return_block());

        block.exit = Exit::FunctionReturn {
            return_values: vec![],
        };
        assert!(block.is_function_return_block());
        assert!(!block.is_termination_block());

        block.exit = Exit::Terminated;
        assert!(block.is_termination_block());
    }

    #[test]
    fn test_entries_are_sorted() {
        let mut block = BasicBlock::default();
        block.entries.insert(BlockId::new(5));
        block.entries.insert(BlockId::new(1));
        block.entries.insert(BlockId::new(3));
        let order: Vec<_> = block.entries.iter().copied().collect();
        assert_eq!(
            order,
            vec![BlockId::new(1), BlockId::new(3), BlockId::new(5)]
        );
    }
}
