//! Control-flow side effects of functions.
//!
//! The only effect the middle end cares about is whether a call can return
//! to its caller at all: calls to functions that provably terminate on every
//! path (a `revert`-style builtin on all branches) end their basic block with
//! a `Terminated` exit, and everything lowered after them is dead.
//!
//! [`SideEffects::collect`] computes the per-function `can_continue` flag by
//! a fixed point over the call graph, seeded from the builtins' control-flow
//! effects: it starts optimistic (everything continues) and flips functions
//! to non-continuing until stable. `leave`, `break` and `continue` keep a
//! path alive — only a terminating call ends one.

use rustc_hash::FxHashMap;

use crate::{
    ast::{Block, Expression, Statement},
    dialect::Dialect,
    scope::{FunctionId, ScopeEntry, ScopeId, ScopeTable},
};

/// Per-function control-flow summary consumed by the CFG builder.
#[derive(Debug, Default)]
pub struct SideEffects {
    can_continue: FxHashMap<FunctionId, bool>,
}

impl SideEffects {
    /// Whether a call to `function` can return to its caller.
    ///
    /// Unknown functions default to `true` (the conservative answer for
    /// reachability).
    #[must_use]
    pub fn can_continue(&self, function: FunctionId) -> bool {
        self.can_continue.get(&function).copied().unwrap_or(true)
    }

    /// Overrides the flag for one function. Intended for front ends that
    /// compute their own summaries.
    pub fn set_can_continue(&mut self, function: FunctionId, can_continue: bool) {
        self.can_continue.insert(function, can_continue);
    }

    /// Computes summaries for every function defined in `block`.
    #[must_use]
    pub fn collect(block: &Block, scopes: &ScopeTable, dialect: &Dialect) -> Self {
        let mut definitions = Vec::new();
        gather_definitions(block, scopes, &mut definitions);

        let mut effects = SideEffects::default();
        for (function, _) in &definitions {
            effects.can_continue.insert(*function, true);
        }

        // optimistic fixed point: flags only flip true -> false
        loop {
            let mut changed = false;
            for (function, body) in &definitions {
                if !effects.can_continue[function] {
                    continue;
                }
                let terminates = {
                    let scope = scopes.scope_of(body.id).expect("unresolved function body");
                    sequence_terminates(&body.statements, scope, scopes, dialect, &effects)
                };
                if terminates {
                    effects.can_continue.insert(*function, false);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        effects
    }
}

/// Collects `(function symbol, body)` pairs for every definition in a block
/// tree, function bodies included.
fn gather_definitions<'a>(
    block: &'a Block,
    scopes: &ScopeTable,
    out: &mut Vec<(FunctionId, &'a Block)>,
) {
    let scope = scopes.scope_of(block.id).expect("unresolved block");
    for statement in &block.statements {
        match statement {
            Statement::FunctionDefinition(definition) => {
                if let Some(ScopeEntry::Function(function)) =
                    scopes.lookup(scope, &definition.name.name)
                {
                    out.push((function, &definition.body));
                }
                gather_definitions(&definition.body, scopes, out);
            }
            Statement::If(statement) => gather_definitions(&statement.body, scopes, out),
            Statement::Switch(statement) => {
                for case in &statement.cases {
                    gather_definitions(&case.body, scopes, out);
                }
            }
            Statement::ForLoop(statement) => {
                gather_definitions(&statement.pre, scopes, out);
                gather_definitions(&statement.body, scopes, out);
                gather_definitions(&statement.post, scopes, out);
            }
            Statement::Block(inner) => gather_definitions(inner, scopes, out),
            _ => {}
        }
    }
}

/// Whether executing the statement sequence always hits a terminating call
/// before completing.
fn sequence_terminates(
    statements: &[Statement],
    scope: ScopeId,
    scopes: &ScopeTable,
    dialect: &Dialect,
    effects: &SideEffects,
) -> bool {
    for statement in statements {
        match statement {
            Statement::Expression(stmt) => {
                if expression_terminates(&stmt.expression, scope, scopes, dialect, effects) {
                    return true;
                }
            }
            Statement::VariableDeclaration(stmt) => {
                if let Some(value) = &stmt.value {
                    if expression_terminates(value, scope, scopes, dialect, effects) {
                        return true;
                    }
                }
            }
            Statement::Assignment(stmt) => {
                if expression_terminates(&stmt.value, scope, scopes, dialect, effects) {
                    return true;
                }
            }
            // control leaves this sequence but stays live
            Statement::Leave(_) | Statement::Break(_) | Statement::Continue(_) => return false,
            Statement::If(stmt) => {
                if expression_terminates(&stmt.condition, scope, scopes, dialect, effects) {
                    return true;
                }
                // the branch may not be taken
            }
            Statement::Switch(stmt) => {
                if expression_terminates(&stmt.expression, scope, scopes, dialect, effects) {
                    return true;
                }
                let has_default = stmt.cases.iter().any(|case| case.value.is_none());
                let all_terminate = stmt.cases.iter().all(|case| {
                    let case_scope = scopes.scope_of(case.body.id).expect("unresolved case body");
                    sequence_terminates(&case.body.statements, case_scope, scopes, dialect, effects)
                });
                if has_default && all_terminate {
                    return true;
                }
            }
            Statement::ForLoop(stmt) => {
                let pre_scope = scopes.scope_of(stmt.pre.id).expect("unresolved loop pre");
                if sequence_terminates(&stmt.pre.statements, pre_scope, scopes, dialect, effects)
                    || expression_terminates(&stmt.condition, pre_scope, scopes, dialect, effects)
                {
                    return true;
                }
                // the loop may exit after zero iterations
            }
            Statement::Block(block) => {
                let inner = scopes.scope_of(block.id).expect("unresolved block");
                if sequence_terminates(&block.statements, inner, scopes, dialect, effects) {
                    return true;
                }
            }
            Statement::FunctionDefinition(_) => {}
        }
    }
    false
}

/// Whether evaluating the expression always terminates execution — true when
/// any call in it resolves to a non-continuing callee.
fn expression_terminates(
    expression: &Expression,
    scope: ScopeId,
    scopes: &ScopeTable,
    dialect: &Dialect,
    effects: &SideEffects,
) -> bool {
    let Expression::FunctionCall(call) = expression else {
        return false;
    };
    if call
        .arguments
        .iter()
        .any(|argument| expression_terminates(argument, scope, scopes, dialect, effects))
    {
        return true;
    }
    match scopes.lookup(scope, &call.function.name) {
        Some(ScopeEntry::Function(function)) => !effects.can_continue(function),
        _ => dialect
            .find_builtin(&call.function.name)
            .is_some_and(|handle| !dialect.builtin(handle).control_flow.can_continue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DebugData, FunctionCall, FunctionDefinition, Identifier, Literal};
    use crate::dialect::EvmVersion;
    use crate::scope::resolve;

    fn call(name: &str, arguments: Vec<Expression>) -> Expression {
        Expression::FunctionCall(FunctionCall {
            function: Identifier {
                name: name.to_string(),
                debug: DebugData::EMPTY,
            },
            arguments,
            debug: DebugData::EMPTY,
        })
    }

    fn lit(value: u128) -> Expression {
        Expression::Literal(Literal {
            value,
            debug: DebugData::EMPTY,
        })
    }

    fn expr_stmt(expression: Expression) -> Statement {
        Statement::Expression(crate::ast::ExpressionStatement {
            expression,
            debug: DebugData::EMPTY,
        })
    }

    fn define(name: &str, body: Vec<Statement>) -> Statement {
        Statement::FunctionDefinition(FunctionDefinition {
            name: Identifier {
                name: name.to_string(),
                debug: DebugData::EMPTY,
            },
            parameters: vec![],
            returns: vec![],
            body: Block::new(body),
            debug: DebugData::EMPTY,
        })
    }

    fn function_id(table: &ScopeTable, root: &Block, name: &str) -> FunctionId {
        let scope = table.scope_of(root.id).unwrap();
        match table.lookup(scope, name) {
            Some(ScopeEntry::Function(function)) => function,
            _ => panic!("function {name} not found"),
        }
    }

    #[test]
    fn test_reverting_function_cannot_continue() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![define(
            "fail",
            vec![expr_stmt(call("revert", vec![lit(0), lit(0)]))],
        )]);
        let table = resolve(&mut root, &dialect).unwrap();
        let effects = SideEffects::collect(&root, &table, &dialect);
        assert!(!effects.can_continue(function_id(&table, &root, "fail")));
    }

    #[test]
    fn test_plain_function_continues() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![define(
            "store",
            vec![expr_stmt(call("sstore", vec![lit(0), lit(1)]))],
        )]);
        let table = resolve(&mut root, &dialect).unwrap();
        let effects = SideEffects::collect(&root, &table, &dialect);
        assert!(effects.can_continue(function_id(&table, &root, "store")));
    }

    #[test]
    fn test_transitive_termination() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![
            define("fail", vec![expr_stmt(call("revert", vec![lit(0), lit(0)]))]),
            define("wrapper", vec![expr_stmt(call("fail", vec![]))]),
        ]);
        let table = resolve(&mut root, &dialect).unwrap();
        let effects = SideEffects::collect(&root, &table, &dialect);
        assert!(!effects.can_continue(function_id(&table, &root, "wrapper")));
    }

    #[test]
    fn test_leave_keeps_function_alive() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![define(
            "early",
            vec![
                Statement::Leave(crate::ast::Leave {
                    debug: DebugData::EMPTY,
                }),
                expr_stmt(call("revert", vec![lit(0), lit(0)])),
            ],
        )]);
        let table = resolve(&mut root, &dialect).unwrap();
        let effects = SideEffects::collect(&root, &table, &dialect);
        assert!(effects.can_continue(function_id(&table, &root, "early")));
    }
}
