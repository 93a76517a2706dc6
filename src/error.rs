use thiserror::Error;

/// The generic error type covering every failure this library can report.
///
/// Errors here originate from *inputs* — unresolved names, misuse of reserved
/// identifiers, malformed calls. Violations of internal IR invariants (a phi
/// defined in two blocks, a dangling value id, sealing a block twice) are
/// bugs, not inputs, and abort via assertions instead of surfacing as
/// [`Error`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// An identifier was used that is not declared in any enclosing scope.
    #[error("use of undeclared identifier \"{0}\"")]
    UndefinedIdentifier(String),

    /// An identifier collides with a name reserved by the active dialect.
    #[error("\"{0}\" is reserved by the dialect and cannot be declared")]
    ReservedIdentifier(String),

    /// A name resolved to a variable where a function was required.
    #[error("\"{0}\" is not a function")]
    NotAFunction(String),

    /// A name resolved to a function where a variable was required.
    #[error("\"{0}\" is not a variable")]
    NotAVariable(String),

    /// A declaration shadows a name that is already declared in the same scope.
    #[error("\"{0}\" is already declared in this scope")]
    DuplicateIdentifier(String),

    /// A call supplied the wrong number of arguments.
    ///
    /// Literal-only argument positions of builtins count towards the expected
    /// number; they are checked for being literals separately.
    #[error("call to \"{name}\" expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Callee name.
        name: String,
        /// Number of arguments the callee declares.
        expected: usize,
        /// Number of arguments at the call site.
        actual: usize,
    },

    /// A builtin argument position that must be a literal received a
    /// non-literal expression.
    #[error("argument {index} of \"{name}\" must be a literal")]
    LiteralArgumentExpected {
        /// Callee name.
        name: String,
        /// Zero-based argument position.
        index: usize,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
