//! The loop-unrolling transformation.
//!
//! Walks a block tree bottom-up and replaces every `for`-loop the
//! [`UnrollAnalysis`] accepts with straight-line code: the loop's init block
//! once, then one copy of the body and the post block per iteration, with
//! every *read* of the induction variable substituted by its literal value
//! for that iteration. Assignment targets are left alone, so the induction
//! updates still happen — they are dead after unrolling and later passes
//! collect them.
//!
//! The emitted statements are wrapped in a single nested block, which keeps
//! the init block's declarations scoped exactly as before. Rejected loops
//! are left byte-for-byte untouched; rewriting never changes semantics on
//! rejection.
//!
//! Note that the rewrite invalidates scope resolution: run
//! [`resolve`](crate::scope::resolve) again before building a CFG from the
//! transformed tree.

use crate::ast::{Block, Expression, ForLoop, Literal, Statement, Word};
use crate::compiler::passes::unroll_analysis::{UnrollAnalysis, UnrollPlan};
use crate::dialect::Dialect;

/// The pass; apply with [`LoopUnrolling::run`].
#[derive(Debug)]
pub struct LoopUnrolling<'a> {
    analysis: UnrollAnalysis<'a>,
}

impl<'a> LoopUnrolling<'a> {
    /// Creates the pass for a dialect.
    #[must_use]
    pub fn new(dialect: &'a Dialect) -> Self {
        LoopUnrolling {
            analysis: UnrollAnalysis::new(dialect),
        }
    }

    /// Runs the pass over a whole block tree in place.
    pub fn run(dialect: &Dialect, ast: &mut Block) {
        LoopUnrolling::new(dialect).rewrite_block(ast);
    }

    fn rewrite_block(&self, block: &mut Block) {
        let statements = std::mem::take(&mut block.statements);
        let mut result: Vec<Statement> = Vec::with_capacity(statements.len());
        for mut statement in statements {
            // children first, so nested loops unroll innermost-out
            self.rewrite_children(&mut statement);
            match statement {
                Statement::ForLoop(for_loop) => match self.rewrite_loop(&for_loop, &result) {
                    Some(unrolled) => result.push(unrolled),
                    None => result.push(Statement::ForLoop(for_loop)),
                },
                other => result.push(other),
            }
        }
        block.statements = result;
    }

    fn rewrite_children(&self, statement: &mut Statement) {
        match statement {
            Statement::If(inner) => self.rewrite_block(&mut inner.body),
            Statement::Switch(inner) => {
                for case in &mut inner.cases {
                    self.rewrite_block(&mut case.body);
                }
            }
            Statement::ForLoop(inner) => {
                self.rewrite_block(&mut inner.pre);
                self.rewrite_block(&mut inner.body);
                self.rewrite_block(&mut inner.post);
            }
            Statement::FunctionDefinition(inner) => self.rewrite_block(&mut inner.body),
            Statement::Block(inner) => self.rewrite_block(inner),
            _ => {}
        }
    }

    /// Produces the unrolled replacement for an accepted loop, `None` when
    /// the analysis rejects it.
    fn rewrite_loop(&self, for_loop: &ForLoop, preceding: &[Statement]) -> Option<Statement> {
        let plan = self.analysis.plan(for_loop, preceding).ok()?;
        Some(Statement::Block(unroll(for_loop, &plan)))
    }
}

/// Emits init once, then per iteration the body and the post block with the
/// induction variable's reads replaced by that iteration's literal value.
fn unroll(for_loop: &ForLoop, plan: &UnrollPlan) -> Block {
    let mut statements = for_loop.pre.statements.clone();
    for &value in &plan.values {
        statements.push(Statement::Block(substitute_block(
            &for_loop.body,
            &plan.variable,
            value,
        )));
        statements.push(Statement::Block(substitute_block(
            &for_loop.post,
            &plan.variable,
            value,
        )));
    }
    Block::new(statements)
}

/// Clones a block, replacing reads of `variable` with the literal `value`.
/// Substitution stops once an inner declaration shadows the name, and never
/// descends into function definitions (which cannot see the variable).
fn substitute_block(block: &Block, variable: &str, value: Word) -> Block {
    let mut shadowed = false;
    let statements = block
        .statements
        .iter()
        .map(|statement| substitute_statement(statement, variable, value, &mut shadowed))
        .collect();
    Block::new(statements)
}

fn substitute_statement(
    statement: &Statement,
    variable: &str,
    value: Word,
    shadowed: &mut bool,
) -> Statement {
    if *shadowed {
        return statement.clone();
    }
    match statement {
        Statement::VariableDeclaration(declaration) => {
            let mut declaration = declaration.clone();
            if let Some(initializer) = &mut declaration.value {
                *initializer = substitute_expression(initializer, variable, value);
            }
            if declaration
                .variables
                .iter()
                .any(|candidate| candidate.name == variable)
            {
                *shadowed = true;
            }
            Statement::VariableDeclaration(declaration)
        }
        Statement::Assignment(assignment) => {
            let mut assignment = assignment.clone();
            assignment.value = substitute_expression(&assignment.value, variable, value);
            Statement::Assignment(assignment)
        }
        Statement::Expression(expression) => {
            let mut expression = expression.clone();
            expression.expression = substitute_expression(&expression.expression, variable, value);
            Statement::Expression(expression)
        }
        Statement::If(inner) => {
            let mut inner = inner.clone();
            inner.condition = substitute_expression(&inner.condition, variable, value);
            inner.body = substitute_block(&inner.body, variable, value);
            Statement::If(inner)
        }
        Statement::Switch(inner) => {
            let mut inner = inner.clone();
            inner.expression = substitute_expression(&inner.expression, variable, value);
            for case in &mut inner.cases {
                case.body = substitute_block(&case.body, variable, value);
            }
            Statement::Switch(inner)
        }
        Statement::ForLoop(inner) => {
            // the pre block may shadow the variable for the rest of the loop
            let mut pre_shadowed = false;
            let pre_statements = inner
                .pre
                .statements
                .iter()
                .map(|statement| {
                    substitute_statement(statement, variable, value, &mut pre_shadowed)
                })
                .collect();
            let mut result = inner.clone();
            result.pre = Block::new(pre_statements);
            if !pre_shadowed {
                result.condition = substitute_expression(&inner.condition, variable, value);
                result.body = substitute_block(&inner.body, variable, value);
                result.post = substitute_block(&inner.post, variable, value);
            }
            Statement::ForLoop(result)
        }
        Statement::Block(inner) => Statement::Block(substitute_block(inner, variable, value)),
        Statement::FunctionDefinition(_)
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Leave(_) => statement.clone(),
    }
}

fn substitute_expression(expression: &Expression, variable: &str, value: Word) -> Expression {
    match expression {
        Expression::Identifier(identifier) if identifier.name == variable => {
            Expression::Literal(Literal {
                value,
                debug: identifier.debug,
            })
        }
        Expression::FunctionCall(call) => {
            let mut call = call.clone();
            for argument in &mut call.arguments {
                *argument = substitute_expression(argument, variable, value);
            }
            Expression::FunctionCall(call)
        }
        _ => expression.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Assignment, DebugData, Identifier, VariableDeclaration};
    use crate::dialect::EvmVersion;

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            debug: DebugData::EMPTY,
        }
    }

    fn lit(value: Word) -> Expression {
        Expression::Literal(Literal {
            value,
            debug: DebugData::EMPTY,
        })
    }

    fn var(name: &str) -> Expression {
        Expression::Identifier(ident(name))
    }

    fn call(name: &str, arguments: Vec<Expression>) -> Expression {
        Expression::FunctionCall(crate::ast::FunctionCall {
            function: ident(name),
            arguments,
            debug: DebugData::EMPTY,
        })
    }

    fn let_stmt(name: &str, value: Expression) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            variables: vec![ident(name)],
            value: Some(value),
            debug: DebugData::EMPTY,
        })
    }

    fn assign(name: &str, value: Expression) -> Statement {
        Statement::Assignment(Assignment {
            targets: vec![ident(name)],
            value,
            debug: DebugData::EMPTY,
        })
    }

    fn profitable_loop(bound: Word) -> Statement {
        Statement::ForLoop(ForLoop {
            pre: Block::new(vec![let_stmt("i", lit(0))]),
            condition: call("lt", vec![var("i"), lit(bound)]),
            post: Block::new(vec![assign("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![
                let_stmt("a", call("mload", vec![lit(0x40)])),
                let_stmt("b", call("mload", vec![lit(0x40)])),
            ]),
            debug: DebugData::EMPTY,
        })
    }

    #[test]
    fn test_accepted_loop_is_replaced() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut ast = Block::new(vec![profitable_loop(4)]);
        LoopUnrolling::run(&dialect, &mut ast);

        assert_eq!(ast.statements.len(), 1);
        let Statement::Block(unrolled) = &ast.statements[0] else {
            panic!("loop must be replaced by a block");
        };
        // init + 4 * (body block + post block)
        assert_eq!(unrolled.statements.len(), 1 + 4 * 2);
        assert!(matches!(
            unrolled.statements[0],
            Statement::VariableDeclaration(_)
        ));
    }

    #[test]
    fn test_induction_reads_become_literals() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut ast = Block::new(vec![Statement::ForLoop(ForLoop {
            pre: Block::new(vec![let_stmt("i", lit(0))]),
            condition: call("lt", vec![var("i"), lit(3)]),
            post: Block::new(vec![assign("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![
                let_stmt("a", call("mload", vec![lit(0x40)])),
                let_stmt("b", call("mload", vec![lit(0x40)])),
                Statement::Expression(crate::ast::ExpressionStatement {
                    expression: call("sstore", vec![var("i"), var("a")]),
                    debug: DebugData::EMPTY,
                }),
            ]),
            debug: DebugData::EMPTY,
        })]);
        LoopUnrolling::run(&dialect, &mut ast);

        let Statement::Block(unrolled) = &ast.statements[0] else {
            panic!("loop must be replaced by a block");
        };
        // iteration k's body is at 1 + 2k; its sstore key must be literal k
        for k in 0..3u128 {
            let Statement::Block(body) = &unrolled.statements[1 + 2 * k as usize] else {
                panic!("expected a body block");
            };
            let Statement::Expression(store) = &body.statements[2] else {
                panic!("expected the store statement");
            };
            let Expression::FunctionCall(store_call) = &store.expression else {
                panic!("expected a call");
            };
            assert_eq!(store_call.arguments[0], lit(k));
            // the non-induction argument stays an identifier
            assert_eq!(store_call.arguments[1], var("a"));
        }
        // the post copies keep updating i with substituted reads
        let Statement::Block(post) = &unrolled.statements[2] else {
            panic!("expected a post block");
        };
        let Statement::Assignment(update) = &post.statements[0] else {
            panic!("expected the update assignment");
        };
        assert_eq!(update.targets[0].name, "i");
        assert_eq!(update.value, call("add", vec![lit(0), lit(1)]));
    }

    #[test]
    fn test_rejected_loop_is_untouched() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let original = profitable_loop(1_000_000);
        let mut ast = Block::new(vec![original.clone()]);
        LoopUnrolling::run(&dialect, &mut ast);
        assert_eq!(ast.statements.len(), 1);
        assert_eq!(ast.statements[0], original);
    }

    #[test]
    fn test_shadowing_declaration_stops_substitution() {
        let mut shadowed = false;
        let statements = vec![
            assign("x", var("i")),
            let_stmt("i", lit(99)),
            assign("y", var("i")),
        ];
        let substituted: Vec<Statement> = statements
            .iter()
            .map(|statement| substitute_statement(statement, "i", 7, &mut shadowed))
            .collect();

        let Statement::Assignment(before) = &substituted[0] else {
            panic!("expected assignment");
        };
        assert_eq!(before.value, lit(7));
        let Statement::Assignment(after) = &substituted[2] else {
            panic!("expected assignment");
        };
        assert_eq!(after.value, var("i"), "shadowed reads must stay");
    }

    #[test]
    fn test_loops_inside_branches_are_unrolled() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut ast = Block::new(vec![Statement::If(crate::ast::If {
            condition: call("calldataload", vec![lit(0)]),
            body: Block::new(vec![profitable_loop(4)]),
            debug: DebugData::EMPTY,
        })]);
        LoopUnrolling::run(&dialect, &mut ast);

        let Statement::If(if_statement) = &ast.statements[0] else {
            panic!("expected the if");
        };
        assert!(matches!(if_statement.body.statements[0], Statement::Block(_)));
    }
}
