//! Loop-unrolling integration tests.
//!
//! Exercise the pass end to end: analyze, rewrite, and feed the transformed
//! tree back through resolution and SSA construction to prove it is still a
//! valid program.

use evmir::analysis::CfgBuilder;
use evmir::ast::{
    Assignment, Block, DebugData, Expression, ExpressionStatement, ForLoop, FunctionCall,
    Identifier, Literal, Statement, VariableDeclaration, Word,
};
use evmir::compiler::{LoopUnrolling, UnrollAnalysis};
use evmir::dialect::{Dialect, EvmVersion};
use evmir::{resolve, SideEffects};

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
    Expression::FunctionCall(FunctionCall {
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

fn expr(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        debug: DebugData::EMPTY,
    })
}

/// `for { let i := 0 } lt(i, bound) { i := add(i, 1) } { two mloads }`
fn mload_loop(bound: Word) -> ForLoop {
    ForLoop {
        pre: Block::new(vec![let_stmt("i", lit(0))]),
        condition: call("lt", vec![var("i"), lit(bound)]),
        post: Block::new(vec![assign("i", call("add", vec![var("i"), lit(1)]))]),
        body: Block::new(vec![
            let_stmt("a", call("mload", vec![lit(0x40)])),
            let_stmt("b", call("mload", vec![lit(0x40)])),
        ]),
        debug: DebugData::EMPTY,
    }
}

#[test]
fn test_analyzer_accepts_profitable_loop() {
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let analysis = UnrollAnalysis::new(&dialect);
    let decision = analysis.analyze(&mload_loop(4), &[]);
    assert!(decision.should_unroll, "rejected: {}", decision.reason);
    assert_eq!(decision.factor, 4);
}

#[test]
fn test_analyzer_rejects_huge_bound() {
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let analysis = UnrollAnalysis::new(&dialect);
    let decision = analysis.analyze(&mload_loop(1_000_000), &[]);
    assert!(!decision.should_unroll);
    assert!(
        decision.reason.contains("too large"),
        "unexpected reason: {}",
        decision.reason
    );
}

#[test]
fn test_rewrite_emits_pre_once_then_iterations() {
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let mut ast = Block::new(vec![Statement::ForLoop(mload_loop(4))]);
    LoopUnrolling::run(&dialect, &mut ast);

    let Statement::Block(unrolled) = &ast.statements[0] else {
        panic!("the loop must be replaced");
    };
    // init statement + 4 * (body, post)
    assert_eq!(unrolled.statements.len(), 9);
    assert!(matches!(
        unrolled.statements[0],
        Statement::VariableDeclaration(_)
    ));

    // iteration k's post updates i from the literal k
    for k in 0..4u128 {
        let Statement::Block(post) = &unrolled.statements[2 + 2 * k as usize] else {
            panic!("expected a post block");
        };
        let Statement::Assignment(update) = &post.statements[0] else {
            panic!("expected the induction update");
        };
        assert_eq!(update.value, call("add", vec![lit(k), lit(1)]));
    }
}

#[test]
fn test_rejected_loop_survives_unchanged() {
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let original = Statement::ForLoop(mload_loop(1_000_000));
    let mut ast = Block::new(vec![original.clone()]);
    LoopUnrolling::run(&dialect, &mut ast);
    assert_eq!(ast.statements, vec![original]);
}

#[test]
fn test_unrolled_tree_still_compiles() {
    // the transformed AST must resolve and lower like any other program
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let mut ast = Block::new(vec![
        Statement::ForLoop(ForLoop {
            pre: Block::new(vec![let_stmt("i", lit(0))]),
            condition: call("lt", vec![var("i"), lit(3)]),
            post: Block::new(vec![assign("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![
                let_stmt("a", call("mload", vec![lit(0x40)])),
                let_stmt("b", call("mload", vec![lit(0x40)])),
                expr(call("sstore", vec![var("i"), var("a")])),
            ]),
            debug: DebugData::EMPTY,
        }),
        expr(call("sstore", vec![lit(100), lit(1)])),
    ]);
    LoopUnrolling::run(&dialect, &mut ast);
    assert!(matches!(ast.statements[0], Statement::Block(_)));

    let scopes = resolve(&mut ast, &dialect).expect("unrolled tree must resolve");
    let side_effects = SideEffects::collect(&ast, &scopes, &dialect);
    let control = CfgBuilder::new(&scopes, &side_effects, &dialect).build(&ast);

    // straight-line now: the stores appear with literal keys 0, 1, 2
    let cfg = &control.main;
    let mut store_keys = Vec::new();
    for block in cfg.block_ids() {
        for operation in &cfg.block(block).operations {
            if operation.inputs.len() == 2 {
                if let Some(key) = cfg.value_info(operation.inputs[1]).as_literal() {
                    store_keys.push(key);
                }
            }
        }
    }
    assert!(store_keys.contains(&0));
    assert!(store_keys.contains(&1));
    assert!(store_keys.contains(&2));
}

#[test]
fn test_initializer_found_before_loop() {
    // the induction initializer may live in the enclosing block
    let dialect = Dialect::for_version(EvmVersion::Cancun, None);
    let mut ast = Block::new(vec![
        let_stmt("i", lit(0)),
        Statement::ForLoop(ForLoop {
            pre: Block::new(vec![]),
            condition: call("lt", vec![var("i"), lit(4)]),
            post: Block::new(vec![assign("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![
                let_stmt("a", call("mload", vec![lit(0x40)])),
                let_stmt("b", call("mload", vec![lit(0x40)])),
            ]),
            debug: DebugData::EMPTY,
        }),
    ]);
    LoopUnrolling::run(&dialect, &mut ast);
    assert!(
        matches!(ast.statements[1], Statement::Block(_)),
        "loop with preceding initializer must unroll"
    );
}

#[test]
fn test_verbatim_builtin_lookup() {
    // with object access, verbatim builtins materialize on demand and cache
    let dialect = Dialect::for_objects(EvmVersion::Cancun, None);
    let first = dialect
        .find_builtin("verbatim_2i_1o")
        .expect("verbatim lookup must succeed");
    let second = dialect.find_builtin("verbatim_2i_1o").unwrap();
    assert_eq!(first, second);

    let descriptor = dialect.builtin(first);
    assert_eq!(descriptor.inputs, 2);
    assert_eq!(descriptor.outputs, 1);

    // and without object access the name means nothing
    let plain = Dialect::for_version(EvmVersion::Cancun, None);
    assert!(plain.find_builtin("verbatim_2i_1o").is_none());
}
