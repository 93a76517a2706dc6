//! Abstract syntax tree of the structured assembly input.
//!
//! The AST is produced by an external front end and consumed by the SSA CFG
//! builder ([`crate::analysis::CfgBuilder`]) and by AST-level optimization
//! passes ([`crate::compiler`]). It is a small, fully structured language:
//! blocks of statements with single-entry loops, conditionals, switches and
//! function definitions — there is no goto, which is what keeps every control
//! flow graph built from it reducible.
//!
//! # Identity
//!
//! Analyses need to attach information to syntactic blocks (most importantly
//! scopes, see [`crate::scope::ScopeTable`]). Instead of node pointers, every
//! [`Block`] carries a dense [`NodeId`] assigned during scope resolution;
//! ids are unique within one resolved AST.
//!
//! # Debug data
//!
//! Every node carries a [`DebugData`] tag locating it in the original source.
//! The tag is plain `Copy` data and flows into the CFG unchanged; nothing in
//! the middle end interprets it.

use std::fmt;

/// Machine word of the target: literal values are 256-bit on the EVM, of
/// which this middle end models the low 128 bits.
///
/// Every computation the core performs on literal values (switch case keys,
/// iteration-count prediction, gas arithmetic) fits comfortably; overflow is
/// checked where it can occur.
pub type Word = u128;

/// Identifier of a syntactic [`Block`], dense and unique within one resolved
/// AST.
///
/// Fresh ASTs carry [`NodeId::UNASSIGNED`] on every block; scope resolution
/// numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Marker for blocks that have not been through scope resolution yet.
    pub const UNASSIGNED: NodeId = NodeId(u32::MAX);

    /// Returns the raw index value.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ast{}", self.0)
    }
}

/// Half-open byte range into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Start offset, inclusive.
    pub start: u32,
    /// End offset, exclusive.
    pub end: u32,
}

/// Source tag attached to every AST node and propagated into the CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DebugData {
    /// Originating source range, if known.
    pub location: Option<SourceLocation>,
}

impl DebugData {
    /// Debug data with no source attribution.
    pub const EMPTY: DebugData = DebugData { location: None };
}

/// A numeric literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// The literal's value.
    pub value: Word,
    /// Source tag.
    pub debug: DebugData,
}

/// A reference to a declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// The referenced name.
    pub name: String,
    /// Source tag.
    pub debug: DebugData,
}

/// A call to a user-defined function or a dialect builtin.
///
/// The callee is a plain name; whether it denotes a scope function or a
/// builtin is decided at resolution/build time (builtin names are reserved,
/// so the two namespaces cannot collide).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// Name of the callee.
    pub function: Identifier,
    /// Arguments in source order.
    pub arguments: Vec<Expression>,
    /// Source tag.
    pub debug: DebugData,
}

/// An expression: the leaves of statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A numeric literal.
    Literal(Literal),
    /// A variable reference.
    Identifier(Identifier),
    /// A function or builtin call.
    FunctionCall(FunctionCall),
}

impl Expression {
    /// Returns the literal if this expression is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Returns the source tag of the expression.
    #[must_use]
    pub fn debug(&self) -> DebugData {
        match self {
            Expression::Literal(lit) => lit.debug,
            Expression::Identifier(ident) => ident.debug,
            Expression::FunctionCall(call) => call.debug,
        }
    }
}

/// Declaration of one or more variables, optionally initialized.
///
/// Without an initializer every declared variable starts out as the literal
/// zero. A call initializer may declare as many variables as the callee
/// returns values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    /// The declared names.
    pub variables: Vec<Identifier>,
    /// Optional initializer.
    pub value: Option<Expression>,
    /// Source tag.
    pub debug: DebugData,
}

/// Assignment to one or more previously declared variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Assignment targets.
    pub targets: Vec<Identifier>,
    /// Right-hand side.
    pub value: Expression,
    /// Source tag.
    pub debug: DebugData,
}

/// An expression evaluated for effect; must be a call returning no values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionStatement {
    /// The evaluated expression.
    pub expression: Expression,
    /// Source tag.
    pub debug: DebugData,
}

/// A function definition; lowered into its own SSA sub-graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: Identifier,
    /// Parameter names.
    pub parameters: Vec<Identifier>,
    /// Return variable names, zero-initialized on entry.
    pub returns: Vec<Identifier>,
    /// Function body.
    pub body: Block,
    /// Source tag.
    pub debug: DebugData,
}

/// A conditional without an else branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
    /// Branch condition; taken when non-zero.
    pub condition: Expression,
    /// Statements executed when the condition is non-zero.
    pub body: Block,
    /// Source tag.
    pub debug: DebugData,
}

/// One arm of a [`Switch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// Case value; `None` marks the default case.
    pub value: Option<Literal>,
    /// Case body.
    pub body: Block,
    /// Source tag.
    pub debug: DebugData,
}

/// A multi-way branch on a selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    /// Selector expression.
    pub expression: Expression,
    /// Cases in source order; at most one default, placed last by convention.
    pub cases: Vec<Case>,
    /// Source tag.
    pub debug: DebugData,
}

/// A counted loop: `for { pre } condition { post } { body }`.
///
/// `pre` runs once, then the condition gates each iteration, `body` runs,
/// then `post`, then the condition again. `break`/`continue` target the loop
/// exit and `post` respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    /// Initialization block, run once; declarations scope over the loop.
    pub pre: Block,
    /// Loop condition, evaluated before each iteration.
    pub condition: Expression,
    /// Post-iteration block.
    pub post: Block,
    /// Loop body.
    pub body: Block,
    /// Source tag.
    pub debug: DebugData,
}

/// Exits the innermost enclosing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Break {
    /// Source tag.
    pub debug: DebugData,
}

/// Skips to the post block of the innermost enclosing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continue {
    /// Source tag.
    pub debug: DebugData,
}

/// Returns early from the enclosing function with the current values of its
/// return variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leave {
    /// Source tag.
    pub debug: DebugData,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `let a, b := rhs`
    VariableDeclaration(VariableDeclaration),
    /// `a, b := rhs`
    Assignment(Assignment),
    /// A call evaluated for effect.
    Expression(ExpressionStatement),
    /// A nested function definition.
    FunctionDefinition(FunctionDefinition),
    /// `if cond { ... }`
    If(If),
    /// `switch sel case 0 { ... } default { ... }`
    Switch(Switch),
    /// `for { ... } cond { ... } { ... }`
    ForLoop(ForLoop),
    /// `break`
    Break(Break),
    /// `continue`
    Continue(Continue),
    /// `leave`
    Leave(Leave),
    /// A nested scope block.
    Block(Block),
}

/// A brace-delimited sequence of statements forming a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block identity, assigned by scope resolution.
    pub id: NodeId,
    /// Statements in source order.
    pub statements: Vec<Statement>,
    /// Source tag.
    pub debug: DebugData,
}

impl Block {
    /// Creates an unresolved block from statements.
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Block {
            id: NodeId::UNASSIGNED,
            statements,
            debug: DebugData::EMPTY,
        }
    }

    /// Recursive statement count of this block, descending into every nested
    /// block (if/switch/loop bodies and plain sub-blocks).
    ///
    /// This is the size metric the unrolling pass feeds its code-size gate.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.statements.iter().map(statement_size).sum()
    }
}

fn statement_size(statement: &Statement) -> usize {
    1 + match statement {
        Statement::If(stmt) => stmt.body.code_size(),
        Statement::Switch(stmt) => stmt.cases.iter().map(|c| c.body.code_size()).sum(),
        Statement::ForLoop(stmt) => {
            stmt.pre.code_size() + stmt.body.code_size() + stmt.post.code_size()
        }
        Statement::FunctionDefinition(stmt) => stmt.body.code_size(),
        Statement::Block(block) => block.code_size(),
        _ => 0,
    }
}
