//! Profitability analysis for loop unrolling.
//!
//! Decides, for a single `for`-loop, whether fully unrolling it pays off.
//! The analysis never fails loudly: every way a loop can disqualify itself
//! produces an [`UnrollDecision`] with `should_unroll == false` and a
//! human-readable reason.
//!
//! A loop qualifies when all of the following hold:
//!
//! 1. **Affine shape.** The condition compares the induction variable
//!    against a literal bound (`lt`/`gt`/`eq`/`iszero`), the initializer is
//!    a literal found in the loop's init block or in the statements
//!    preceding the loop, and every update is `i := add(i, c)`,
//!    `i := sub(i, c)` (homogeneously) or a single `i := mul(i, c)`.
//! 2. **Predictable trip count.** Closed-form ceiling division for
//!    arithmetic progressions; bounded simulation for geometric ones and
//!    equality conditions.
//! 3. **Size gate.** The unrolled code must leave headroom under the
//!    deployable code-size cap.
//! 4. **Gas gate.** The gas saved over the assumed number of executions must
//!    beat the deployment cost of the extra bytes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{Block, Expression, ForLoop, Statement, Word};
use crate::dialect::Dialect;

/// Maximum deployable code size in bytes.
const MAX_CONTRACT_SIZE: u64 = 24576;
/// Headroom kept free under [`MAX_CONTRACT_SIZE`] for the rest of the
/// program.
const SIZE_HEADROOM: u64 = 5000;
/// Rough encoded size of one statement.
const BYTES_PER_STATEMENT: u64 = 4;
/// Assumed number of executions when weighing runtime savings against
/// deployment cost.
const ESTIMATED_RUNS: u64 = 200;
/// Iteration cap when simulating geometric progressions and equality
/// conditions.
const SIMULATION_CAP: usize = 1000;

// gas cost approximations of the target machine
const GAS_JUMPI: u64 = 10;
const GAS_JUMP: u64 = 8;
const GAS_LT: u64 = 3;
const GAS_GT: u64 = 3;
const GAS_EQ: u64 = 3;
const GAS_ISZERO: u64 = 3;
const GAS_ADD: u64 = 3;
const GAS_SUB: u64 = 3;
const GAS_MUL: u64 = 5;
const GAS_MLOAD: u64 = 3;
const GAS_MSTORE: u64 = 3;
const GAS_PER_BYTE: u64 = 200;

/// Outcome of analyzing one loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrollDecision {
    /// Whether the loop should be fully unrolled.
    pub should_unroll: bool,
    /// Number of iterations to emit; zero when not unrolling.
    pub factor: usize,
    /// Human-readable justification, for diagnostics.
    pub reason: String,
}

/// The full unrolling recipe for an accepted loop.
#[derive(Debug, Clone)]
pub(crate) struct UnrollPlan {
    /// Name of the induction variable.
    pub variable: String,
    /// Induction variable value at the start of each emitted iteration.
    pub values: Vec<Word>,
}

/// Comparison of the induction variable against the bound, normalized so the
/// variable is on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    /// Loop while `i < bound`.
    Less,
    /// Loop while `i > bound`.
    Greater,
    /// Loop while `i == bound`.
    Equal,
}

/// Induction update operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOp {
    Add,
    Sub,
    Mul,
}

/// The analyzer; see the [module documentation](self).
#[derive(Debug)]
pub struct UnrollAnalysis<'a> {
    dialect: &'a Dialect,
}

impl<'a> UnrollAnalysis<'a> {
    /// Creates an analyzer for the given dialect.
    #[must_use]
    pub fn new(dialect: &'a Dialect) -> Self {
        UnrollAnalysis { dialect }
    }

    /// Analyzes a loop. `preceding` holds the statements before the loop in
    /// its enclosing block, searched for the induction initializer.
    #[must_use]
    pub fn analyze(&self, for_loop: &ForLoop, preceding: &[Statement]) -> UnrollDecision {
        match self.plan(for_loop, preceding) {
            Ok(plan) => UnrollDecision {
                should_unroll: true,
                factor: plan.values.len(),
                reason: format!("unrolling beneficial (iterations: {})", plan.values.len()),
            },
            Err(reason) => UnrollDecision {
                should_unroll: false,
                factor: 0,
                reason,
            },
        }
    }

    /// Produces the unrolling recipe, or the rejection reason.
    pub(crate) fn plan(
        &self,
        for_loop: &ForLoop,
        preceding: &[Statement],
    ) -> Result<UnrollPlan, String> {
        let (variable, comparison, bound, condition_cost) =
            self.extract_condition(&for_loop.condition)?;
        let init = find_initializer(&variable, &for_loop.pre, preceding)?;
        let (step_op, step, update_cost, update_count) = extract_step(&variable, for_loop)?;
        let count = iteration_count(init, comparison, bound, step_op, step)?;

        // size gate
        let statements = (for_loop.body.code_size() + for_loop.post.code_size()) as u64;
        let unrolled_bytes = BYTES_PER_STATEMENT
            .saturating_mul(statements)
            .saturating_mul(count as u64);
        if unrolled_bytes > MAX_CONTRACT_SIZE - SIZE_HEADROOM {
            return Err(format!("unrolled code too large: {unrolled_bytes} bytes"));
        }

        // gas gate: savings per eliminated iteration vs. deployment cost of
        // the duplicated code
        let mut saved_per_iteration = condition_cost + GAS_JUMPI + GAS_JUMP;
        if induction_only_controls_loop(&variable, for_loop, update_count) {
            saved_per_iteration += update_cost;
        }
        saved_per_iteration += memory_locality_savings(&for_loop.body);
        let increase = unrolled_bytes.saturating_mul(GAS_PER_BYTE);
        let total_saved = saved_per_iteration
            .saturating_mul(count as u64)
            .saturating_mul(ESTIMATED_RUNS);
        if total_saved <= increase {
            return Err("unrolling not profitable".to_string());
        }

        let values = induction_values(init, step_op, step, count);
        Ok(UnrollPlan { variable, values })
    }

    /// Dissects the loop condition into `(variable, comparison, bound,
    /// evaluation cost)`.
    fn extract_condition(
        &self,
        condition: &Expression,
    ) -> Result<(String, Comparison, Word, u64), String> {
        let Expression::FunctionCall(call) = condition else {
            return Err("loop condition is not a comparison".to_string());
        };
        let name = call.function.name.as_str();
        if self.dialect.find_builtin(name).is_none() {
            return Err("loop condition is not a comparison".to_string());
        }
        match name {
            "lt" | "gt" => {
                let [left, right] = call.arguments.as_slice() else {
                    return Err("loop condition is not a comparison".to_string());
                };
                let cost = if name == "lt" { GAS_LT } else { GAS_GT };
                let var_comparison = if name == "lt" {
                    Comparison::Less
                } else {
                    Comparison::Greater
                };
                match (left, right) {
                    (Expression::Identifier(identifier), Expression::Literal(bound)) => {
                        Ok((identifier.name.clone(), var_comparison, bound.value, cost))
                    }
                    (Expression::Literal(bound), Expression::Identifier(identifier)) => {
                        // bound < i is i > bound, and vice versa
                        let flipped = match var_comparison {
                            Comparison::Less => Comparison::Greater,
                            Comparison::Greater => Comparison::Less,
                            Comparison::Equal => Comparison::Equal,
                        };
                        Ok((identifier.name.clone(), flipped, bound.value, cost))
                    }
                    _ => Err("induction variable not found".to_string()),
                }
            }
            "eq" => match call.arguments.as_slice() {
                [Expression::Identifier(identifier), Expression::Literal(bound)]
                | [Expression::Literal(bound), Expression::Identifier(identifier)] => Ok((
                    identifier.name.clone(),
                    Comparison::Equal,
                    bound.value,
                    GAS_EQ,
                )),
                _ => Err("induction variable not found".to_string()),
            },
            "iszero" => match call.arguments.as_slice() {
                [Expression::Identifier(identifier)] => {
                    Ok((identifier.name.clone(), Comparison::Equal, 0, GAS_ISZERO))
                }
                _ => Err("induction variable not found".to_string()),
            },
            _ => Err("loop condition is not a comparison".to_string()),
        }
    }
}

/// Searches the loop's init block, then the preceding statements backwards,
/// for a literal binding of the induction variable.
fn find_initializer(
    variable: &str,
    pre: &Block,
    preceding: &[Statement],
) -> Result<Word, String> {
    for statement in pre.statements.iter().rev().chain(preceding.iter().rev()) {
        match statement {
            Statement::VariableDeclaration(declaration)
                if declaration
                    .variables
                    .iter()
                    .any(|candidate| candidate.name == variable) =>
            {
                return match &declaration.value {
                    // declarations without initializer bind zero
                    None => Ok(0),
                    Some(Expression::Literal(literal)) if declaration.variables.len() == 1 => {
                        Ok(literal.value)
                    }
                    Some(_) => Err("induction variable not found".to_string()),
                };
            }
            Statement::Assignment(assignment)
                if assignment
                    .targets
                    .iter()
                    .any(|target| target.name == variable) =>
            {
                return match &assignment.value {
                    Expression::Literal(literal) if assignment.targets.len() == 1 => {
                        Ok(literal.value)
                    }
                    _ => Err("induction variable not found".to_string()),
                };
            }
            _ => {}
        }
    }
    Err("induction variable not found".to_string())
}

/// Extracts the net induction step from the post and body blocks.
///
/// Returns `(operator, step, gas cost of all updates, number of update
/// statements)`. All updates must be homogeneous: all `add`, all `sub`, or a
/// single `mul`; any other write to the variable disqualifies the loop.
fn extract_step(variable: &str, for_loop: &ForLoop) -> Result<(StepOp, Word, u64, usize), String> {
    let mut updates: Vec<(StepOp, Word)> = Vec::new();
    for statement in for_loop
        .post
        .statements
        .iter()
        .chain(for_loop.body.statements.iter())
    {
        if let Some(update) = match_induction_update(variable, statement) {
            updates.push(update);
        } else if statement_writes_variable(variable, statement) {
            return Err("induction variable updated in an unsupported way".to_string());
        }
    }
    if updates.is_empty() {
        return Err("induction variable not found".to_string());
    }

    let homogeneous = updates.iter().all(|(op, _)| *op == updates[0].0);
    if !homogeneous || (updates[0].0 == StepOp::Mul && updates.len() > 1) {
        return Err("induction variable updated in an unsupported way".to_string());
    }

    let op = updates[0].0;
    let step = match op {
        StepOp::Mul => updates[0].1,
        StepOp::Add | StepOp::Sub => {
            let mut net: Word = 0;
            for (_, amount) in &updates {
                net = net
                    .checked_add(*amount)
                    .ok_or_else(|| "iteration count not predictable".to_string())?;
            }
            net
        }
    };
    if step == 0 {
        return Err("iteration count not predictable".to_string());
    }

    let per_update = match op {
        StepOp::Add => GAS_ADD,
        StepOp::Sub => GAS_SUB,
        StepOp::Mul => GAS_MUL,
    };
    Ok((op, step, per_update * updates.len() as u64, updates.len()))
}

/// Matches `i := add(i, c)` / `i := sub(i, c)` / `i := mul(i, c)` (operands
/// of the commutative operators may be swapped).
fn match_induction_update(variable: &str, statement: &Statement) -> Option<(StepOp, Word)> {
    let Statement::Assignment(assignment) = statement else {
        return None;
    };
    let [target] = assignment.targets.as_slice() else {
        return None;
    };
    if target.name != variable {
        return None;
    }
    let Expression::FunctionCall(call) = &assignment.value else {
        return None;
    };
    let op = match call.function.name.as_str() {
        "add" => StepOp::Add,
        "sub" => StepOp::Sub,
        "mul" => StepOp::Mul,
        _ => return None,
    };
    match call.arguments.as_slice() {
        [Expression::Identifier(identifier), Expression::Literal(literal)]
            if identifier.name == variable =>
        {
            Some((op, literal.value))
        }
        [Expression::Literal(literal), Expression::Identifier(identifier)]
            if identifier.name == variable && op != StepOp::Sub =>
        {
            Some((op, literal.value))
        }
        _ => None,
    }
}

/// Whether the statement (or anything nested in it) writes the variable.
fn statement_writes_variable(variable: &str, statement: &Statement) -> bool {
    match statement {
        Statement::VariableDeclaration(declaration) => declaration
            .variables
            .iter()
            .any(|candidate| candidate.name == variable),
        Statement::Assignment(assignment) => assignment
            .targets
            .iter()
            .any(|target| target.name == variable),
        Statement::If(inner) => block_writes_variable(variable, &inner.body),
        Statement::Switch(inner) => inner
            .cases
            .iter()
            .any(|case| block_writes_variable(variable, &case.body)),
        Statement::ForLoop(inner) => {
            block_writes_variable(variable, &inner.pre)
                || block_writes_variable(variable, &inner.body)
                || block_writes_variable(variable, &inner.post)
        }
        Statement::Block(block) => block_writes_variable(variable, block),
        _ => false,
    }
}

fn block_writes_variable(variable: &str, block: &Block) -> bool {
    block
        .statements
        .iter()
        .any(|statement| statement_writes_variable(variable, statement))
}

/// Predicts the trip count.
fn iteration_count(
    init: Word,
    comparison: Comparison,
    bound: Word,
    step_op: StepOp,
    step: Word,
) -> Result<usize, String> {
    match (step_op, comparison) {
        // arithmetic progressions in the consistent direction have a closed
        // form: ceil(distance / step)
        (StepOp::Add, Comparison::Less) => {
            if init >= bound {
                Ok(0)
            } else {
                ceil_div_count(bound - init, step)
            }
        }
        (StepOp::Sub, Comparison::Greater) => {
            if init <= bound {
                Ok(0)
            } else {
                ceil_div_count(init - bound, step)
            }
        }
        // inconsistent directions either exit immediately or never
        (StepOp::Add, Comparison::Greater) => {
            if init <= bound {
                Ok(0)
            } else {
                Err("iteration count not predictable".to_string())
            }
        }
        (StepOp::Sub, Comparison::Less) => {
            if init >= bound {
                Ok(0)
            } else {
                Err("iteration count not predictable".to_string())
            }
        }
        // geometric progressions and equality conditions are simulated
        (StepOp::Mul, _) | (_, Comparison::Equal) => {
            simulate_count(init, comparison, bound, step_op, step)
        }
    }
}

fn ceil_div_count(distance: Word, step: Word) -> Result<usize, String> {
    let count = (distance - 1) / step + 1;
    usize::try_from(count).map_err(|_| "iteration count not predictable".to_string())
}

/// Runs the loop arithmetic forward until the condition fails or the safety
/// cap is hit.
fn simulate_count(
    init: Word,
    comparison: Comparison,
    bound: Word,
    step_op: StepOp,
    step: Word,
) -> Result<usize, String> {
    let holds = |value: Word| match comparison {
        Comparison::Less => value < bound,
        Comparison::Greater => value > bound,
        Comparison::Equal => value == bound,
    };
    let mut value = init;
    let mut count = 0usize;
    while holds(value) {
        count += 1;
        if count > SIMULATION_CAP {
            return Err("iteration count not predictable".to_string());
        }
        value = apply_step(value, step_op, step)
            .ok_or_else(|| "iteration count not predictable".to_string())?;
    }
    Ok(count)
}

fn apply_step(value: Word, step_op: StepOp, step: Word) -> Option<Word> {
    match step_op {
        StepOp::Add => value.checked_add(step),
        StepOp::Sub => value.checked_sub(step),
        StepOp::Mul => value.checked_mul(step),
    }
}

/// Materializes the induction value at the start of each iteration.
fn induction_values(init: Word, step_op: StepOp, step: Word, count: usize) -> Vec<Word> {
    let mut values = Vec::with_capacity(count);
    let mut value = init;
    for index in 0..count {
        values.push(value);
        if index + 1 < count {
            value = apply_step(value, step_op, step)
                .expect("induction overflow past the predicted count");
        }
    }
    values
}

/// Whether the induction variable is used for nothing but the loop control:
/// its only reads are the self-references of its own update statements.
fn induction_only_controls_loop(variable: &str, for_loop: &ForLoop, update_count: usize) -> bool {
    let mut reads = 0usize;
    count_block_reads(variable, &for_loop.body, &mut reads);
    count_block_reads(variable, &for_loop.post, &mut reads);
    reads == update_count
}

fn count_block_reads(variable: &str, block: &Block, reads: &mut usize) {
    for statement in &block.statements {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &declaration.value {
                    count_expression_reads(variable, value, reads);
                }
            }
            Statement::Assignment(assignment) => {
                count_expression_reads(variable, &assignment.value, reads);
            }
            Statement::Expression(expression) => {
                count_expression_reads(variable, &expression.expression, reads);
            }
            Statement::If(inner) => {
                count_expression_reads(variable, &inner.condition, reads);
                count_block_reads(variable, &inner.body, reads);
            }
            Statement::Switch(inner) => {
                count_expression_reads(variable, &inner.expression, reads);
                for case in &inner.cases {
                    count_block_reads(variable, &case.body, reads);
                }
            }
            Statement::ForLoop(inner) => {
                count_block_reads(variable, &inner.pre, reads);
                count_expression_reads(variable, &inner.condition, reads);
                count_block_reads(variable, &inner.body, reads);
                count_block_reads(variable, &inner.post, reads);
            }
            Statement::Block(inner) => count_block_reads(variable, inner, reads),
            Statement::FunctionDefinition(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Leave(_) => {}
        }
    }
}

fn count_expression_reads(variable: &str, expression: &Expression, reads: &mut usize) {
    match expression {
        Expression::Identifier(identifier) => {
            if identifier.name == variable {
                *reads += 1;
            }
        }
        Expression::FunctionCall(call) => {
            for argument in &call.arguments {
                count_expression_reads(variable, argument, reads);
            }
        }
        Expression::Literal(_) => {}
    }
}

/// Gas saved per iteration from memory locality: loads of a fixed address
/// that is never stored to become redundant after unrolling, and repeated
/// stores to the same address collapse.
fn memory_locality_savings(body: &Block) -> u64 {
    let mut loads: FxHashSet<Word> = FxHashSet::default();
    let mut stores: FxHashMap<Word, usize> = FxHashMap::default();
    collect_memory_accesses(body, &mut loads, &mut stores);

    let mut savings = 0u64;
    for address in &loads {
        if !stores.contains_key(address) {
            savings += GAS_MLOAD;
        }
    }
    for count in stores.values() {
        if *count >= 2 {
            savings += GAS_MSTORE;
        }
    }
    savings
}

fn collect_memory_accesses(
    block: &Block,
    loads: &mut FxHashSet<Word>,
    stores: &mut FxHashMap<Word, usize>,
) {
    for statement in &block.statements {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &declaration.value {
                    collect_expression_accesses(value, loads, stores);
                }
            }
            Statement::Assignment(assignment) => {
                collect_expression_accesses(&assignment.value, loads, stores);
            }
            Statement::Expression(expression) => {
                collect_expression_accesses(&expression.expression, loads, stores);
            }
            Statement::If(inner) => {
                collect_expression_accesses(&inner.condition, loads, stores);
                collect_memory_accesses(&inner.body, loads, stores);
            }
            Statement::Switch(inner) => {
                collect_expression_accesses(&inner.expression, loads, stores);
                for case in &inner.cases {
                    collect_memory_accesses(&case.body, loads, stores);
                }
            }
            Statement::ForLoop(inner) => {
                collect_memory_accesses(&inner.pre, loads, stores);
                collect_expression_accesses(&inner.condition, loads, stores);
                collect_memory_accesses(&inner.body, loads, stores);
                collect_memory_accesses(&inner.post, loads, stores);
            }
            Statement::Block(inner) => collect_memory_accesses(inner, loads, stores),
            Statement::FunctionDefinition(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Leave(_) => {}
        }
    }
}

fn collect_expression_accesses(
    expression: &Expression,
    loads: &mut FxHashSet<Word>,
    stores: &mut FxHashMap<Word, usize>,
) {
    if let Expression::FunctionCall(call) = expression {
        match (call.function.name.as_str(), call.arguments.as_slice()) {
            ("mload", [Expression::Literal(address)]) => {
                loads.insert(address.value);
            }
            ("mstore", [Expression::Literal(address), _]) => {
                *stores.entry(address.value).or_insert(0) += 1;
            }
            _ => {}
        }
        for argument in &call.arguments {
            collect_expression_accesses(argument, loads, stores);
        }
    }
}
