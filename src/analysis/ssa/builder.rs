//! AST → SSA CFG construction.
//!
//! The builder lowers a resolved AST into one [`SsaCfg`] per graph using the
//! on-the-fly SSA construction of Braun et al. (CC 2013): no dominance
//! frontiers, no renaming pass — φ functions are created incrementally while
//! statements are lowered, and trivial ones are eliminated as soon as they
//! can be proven trivial.
//!
//! # Sealing
//!
//! A block is *sealed* once all its predecessors are known. Reads in
//! unsealed blocks allocate operand-less φs, remembered as *incomplete*;
//! sealing fills their operands. Trivial-φ removal is only attempted on
//! sealed blocks: removal rewrites every use in the whole graph, and a
//! predecessor added later could make the φ non-trivial again.
//!
//! The statement lowerings below are careful to seal in the right order;
//! the for-loop in particular seals the condition block last, which is what
//! closes the back edge.
//!
//! # Pruning
//!
//! Statements after `break`, `continue`, `leave` or a non-continuing call
//! are lowered into fresh, sealed, entry-less blocks. A final pass
//! ([`CfgBuilder::build`] runs it automatically) removes edges from
//! unreachable blocks and re-examines φs whose arguments were dropped.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::ssa::{
    BlockId, CallSites, ControlFlow, Exit, OpKind, Operation, SsaCfg, ValueId, ValueInfo,
};
use crate::ast::{
    Block, DebugData, Expression, ForLoop, FunctionCall, FunctionDefinition, Identifier, If,
    Literal, Statement, Switch, Word,
};
use crate::dialect::{BuiltinHandle, Dialect};
use crate::scope::{FunctionId, ScopeEntry, ScopeId, ScopeTable, VarId};
use crate::sideeffects::SideEffects;

/// Lowering options recognized by the builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Wrap literal right-hand sides in `LiteralAssignment` operations so
    /// later passes see a distinct output instead of the shared literal.
    pub keep_literal_assignments: bool,
    /// Lower switches to a single `JumpTable` exit instead of chained
    /// conditional jumps, where the target supports dense jumps.
    pub use_jump_table_for_switch: bool,
}

/// AST → SSA CFG builder. See the [module documentation](self).
#[derive(Debug)]
pub struct CfgBuilder<'a> {
    scopes: &'a ScopeTable,
    side_effects: &'a SideEffects,
    dialect: &'a Dialect,
    options: BuildOptions,
}

impl<'a> CfgBuilder<'a> {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new(
        scopes: &'a ScopeTable,
        side_effects: &'a SideEffects,
        dialect: &'a Dialect,
    ) -> Self {
        Self::with_options(scopes, side_effects, dialect, BuildOptions::default())
    }

    /// Creates a builder with explicit options.
    #[must_use]
    pub fn with_options(
        scopes: &'a ScopeTable,
        side_effects: &'a SideEffects,
        dialect: &'a Dialect,
        options: BuildOptions,
    ) -> Self {
        CfgBuilder {
            scopes,
            side_effects,
            dialect,
            options,
        }
    }

    /// Lowers a resolved top-level block into a [`ControlFlow`]: the main
    /// graph plus one graph per function definition.
    #[must_use]
    pub fn build(&self, block: &'a Block) -> ControlFlow {
        let mut sink = GraphSink::default();

        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(block.debug);
        cfg.entry = entry;

        let scope = self
            .scopes
            .scope_of(block.id)
            .expect("building an unresolved block");
        let mut builder = GraphBuilder::new(self, &mut sink, cfg, scope, entry);
        builder.seal_block(entry);
        builder.build_block(block);
        let last = builder.current_block();
        if !builder.block_info(last).sealed {
            builder.seal_block(last);
        }
        builder.cfg.block_mut(last).exit = Exit::MainExit;
        builder.clean_unreachable();

        let mut control = ControlFlow::default();
        control.main = builder.cfg;
        for (function, graph) in sink.function_graphs {
            control.add_function_graph(function, graph);
        }
        control.call_sites = sink.call_sites;
        control
    }

    /// Whether switches lower to a `JumpTable` exit. No current target
    /// supports dense jumps, so chained conditional jumps are always used.
    fn use_jump_table_for_switch(&self, _switch: &Switch) -> bool {
        // TODO: enable for container targets once dense-jump emission lands,
        // and only for tight, zero-based case ranges.
        let _ = self.options.use_jump_table_for_switch;
        false
    }
}

/// Graphs and call sites accumulated across the whole compilation unit.
#[derive(Default)]
struct GraphSink {
    function_graphs: Vec<(FunctionId, SsaCfg)>,
    call_sites: CallSites,
}

#[derive(Debug, Default)]
struct BlockInfo {
    sealed: bool,
    /// φs allocated by reads while the block was unsealed, with the variable
    /// they stand for; operands are filled at sealing time.
    incomplete_phis: Vec<(ValueId, VarId)>,
}

struct ForLoopTargets {
    break_block: BlockId,
    continue_block: BlockId,
}

/// Per-graph construction state.
struct GraphBuilder<'a, 'c> {
    ctx: &'c CfgBuilder<'a>,
    sink: &'c mut GraphSink,
    cfg: SsaCfg,
    scope: ScopeId,
    current: Option<BlockId>,
    block_info: FxHashMap<BlockId, BlockInfo>,
    /// Current definition per variable and block.
    current_def: FxHashMap<VarId, FxHashMap<BlockId, ValueId>>,
    loop_stack: Vec<ForLoopTargets>,
    /// Function definitions visible at the current point, outermost first.
    function_definitions: Vec<(FunctionId, &'a FunctionDefinition)>,
}

impl<'a, 'c> GraphBuilder<'a, 'c> {
    fn new(
        ctx: &'c CfgBuilder<'a>,
        sink: &'c mut GraphSink,
        cfg: SsaCfg,
        scope: ScopeId,
        entry: BlockId,
    ) -> Self {
        GraphBuilder {
            ctx,
            sink,
            cfg,
            scope,
            current: Some(entry),
            block_info: FxHashMap::default(),
            current_def: FxHashMap::default(),
            loop_stack: Vec::new(),
            function_definitions: Vec::new(),
        }
    }

    fn current_block(&self) -> BlockId {
        self.current.expect("no active block")
    }

    fn current_debug(&self) -> DebugData {
        self.cfg.block(self.current_block()).debug
    }

    fn block_info(&mut self, block: BlockId) -> &mut BlockInfo {
        self.block_info.entry(block).or_default()
    }

    fn zero(&mut self) -> ValueId {
        let debug = self.current_debug();
        self.cfg.new_literal(debug, 0)
    }

    // ---- blocks and statements -------------------------------------------

    fn build_block(&mut self, block: &'a Block) {
        let scope = self
            .ctx
            .scopes
            .scope_of(block.id)
            .expect("building an unresolved block");
        let saved_scope = std::mem::replace(&mut self.scope, scope);

        // register function definitions first so they are visible to each
        // other's subgraphs regardless of definition order
        for statement in &block.statements {
            if let Statement::FunctionDefinition(definition) = statement {
                let function = self
                    .ctx
                    .scopes
                    .lookup_function(scope, &definition.name.name)
                    .expect("unresolved function definition");
                self.function_definitions.push((function, definition));
            }
        }
        for statement in &block.statements {
            self.visit_statement(statement);
        }

        self.scope = saved_scope;
    }

    fn visit_statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                let variables = declaration
                    .variables
                    .iter()
                    .map(|variable| self.lookup_variable(variable))
                    .collect();
                self.assign(variables, declaration.value.as_ref());
            }
            Statement::Assignment(assignment) => {
                let targets = assignment
                    .targets
                    .iter()
                    .map(|target| self.lookup_variable(target))
                    .collect();
                self.assign(targets, Some(&assignment.value));
            }
            Statement::Expression(statement) => {
                let Expression::FunctionCall(call) = &statement.expression else {
                    panic!("expression statement must be a call");
                };
                let results = self.visit_function_call(call);
                assert!(results.is_empty(), "expression statement with results");
            }
            Statement::FunctionDefinition(definition) => {
                let function = self
                    .ctx
                    .scopes
                    .lookup_function(self.scope, &definition.name.name)
                    .expect("unresolved function definition");
                self.build_function_graph(function, definition);
            }
            Statement::If(statement) => self.visit_if(statement),
            Statement::Switch(statement) => self.visit_switch(statement),
            Statement::ForLoop(statement) => self.visit_for_loop(statement),
            Statement::Break(_) => {
                let targets = self.loop_stack.last().expect("break outside of loop");
                let target = targets.break_block;
                let debug = self.current_debug();
                self.jump(target);
                self.start_dead_block(debug);
            }
            Statement::Continue(_) => {
                let targets = self.loop_stack.last().expect("continue outside of loop");
                let target = targets.continue_block;
                let debug = self.current_debug();
                self.jump(target);
                self.start_dead_block(debug);
            }
            Statement::Leave(_) => self.leave(),
            Statement::Block(block) => self.build_block(block),
        }
    }

    /// Closes the current block with a function return reading the current
    /// definitions of all return variables, then continues in a fresh dead
    /// block.
    fn leave(&mut self) {
        let debug = self.current_debug();
        let current = self.current_block();
        let returns = self.cfg.returns.clone();
        let return_values = returns
            .into_iter()
            .map(|variable| self.read_variable(variable, current))
            .collect();
        self.cfg.block_mut(current).exit = Exit::FunctionReturn { return_values };
        self.start_dead_block(debug);
    }

    /// Starts a fresh sealed block for statements that follow a control
    /// transfer; it has no predecessors and is pruned unless merged away.
    fn start_dead_block(&mut self, debug: DebugData) {
        let block = self.cfg.make_block(debug);
        self.current = Some(block);
        self.seal_block(block);
    }

    fn visit_if(&mut self, statement: &'a If) {
        if let Some(literal) = statement.condition.as_literal() {
            if literal.value != 0 {
                // always taken: inline the branch
                self.build_block(&statement.body);
            }
            return;
        }

        let condition = self.visit_expression(&statement.condition);
        let if_branch = self.cfg.make_block(statement.body.debug);
        let after_if = self.cfg.make_block(self.current_debug());
        self.conditional_jump(condition, if_branch, after_if);
        self.seal_block(if_branch);
        self.current = Some(if_branch);
        self.build_block(&statement.body);
        self.jump(after_if);
        self.seal_block(after_if);
    }

    fn visit_switch(&mut self, statement: &'a Switch) {
        let expression = self.visit_expression(&statement.expression);

        if self.ctx.use_jump_table_for_switch(statement) {
            self.visit_switch_as_jump_table(statement, expression);
            return;
        }

        if let Some(selector) = statement.expression.as_literal() {
            // constant selector: inline the matching case (or the default)
            let mut matched = None;
            for case in &statement.cases {
                match &case.value {
                    None => matched = Some(case),
                    Some(value) if value.value == selector.value => {
                        matched = Some(case);
                        break;
                    }
                    Some(_) => {}
                }
            }
            if let Some(case) = matched {
                self.build_block(&case.body);
            }
            return;
        }

        let equality = self
            .ctx
            .dialect
            .equality_function()
            .expect("dialect without equality builtin");

        let after_switch = self.cfg.make_block(self.current_debug());
        assert!(!statement.cases.is_empty(), "switch without cases");

        let (last, rest) = statement.cases.split_last().expect("switch without cases");
        for case in rest {
            let value = case.value.as_ref().expect("non-default case without value");
            let compare = self.emit_case_compare(equality, value, expression, case.debug);
            let case_branch = self.cfg.make_block(case.body.debug);
            let else_branch = self.cfg.make_block(statement.debug);
            self.conditional_jump(compare, case_branch, else_branch);
            self.seal_block(case_branch);
            self.seal_block(else_branch);
            self.current = Some(case_branch);
            self.build_block(&case.body);
            self.jump(after_switch);
            self.current = Some(else_branch);
        }
        if let Some(value) = &last.value {
            let compare = self.emit_case_compare(equality, value, expression, last.debug);
            let case_branch = self.cfg.make_block(last.body.debug);
            self.conditional_jump(compare, case_branch, after_switch);
            self.seal_block(case_branch);
            self.current = Some(case_branch);
        }
        self.build_block(&last.body);
        self.jump(after_switch);
        self.seal_block(after_switch);
    }

    /// Emits `eq(<case value>, <selector>)` as a ghost call and returns the
    /// comparison result.
    fn emit_case_compare(
        &mut self,
        equality: BuiltinHandle,
        value: &Literal,
        expression: ValueId,
        debug: DebugData,
    ) -> ValueId {
        let ghost = FunctionCall {
            function: Identifier {
                name: "eq".to_string(),
                debug,
            },
            arguments: vec![Expression::Literal(value.clone())],
            debug,
        };
        let call_site = self.sink.call_sites.add_call_site(&ghost);
        let output = self.cfg.new_variable(self.current_block());
        let literal = self.cfg.new_literal(debug, value.value);
        let current = self.current_block();
        self.cfg.block_mut(current).operations.push(Operation {
            outputs: vec![output],
            kind: OpKind::BuiltinCall {
                builtin: equality,
                call_site,
            },
            inputs: vec![literal, expression],
        });
        output
    }

    fn visit_switch_as_jump_table(&mut self, statement: &'a Switch, expression: ValueId) {
        let mut cases = std::collections::BTreeMap::new();
        let mut default_case = None;
        let mut children = Vec::new();
        for case in &statement.cases {
            let block = self.cfg.make_block(case.body.debug);
            match &case.value {
                Some(value) => {
                    cases.insert(value.value, block);
                }
                None => default_case = Some(block),
            }
            children.push((block, &case.body));
        }
        let after_switch = self.cfg.make_block(self.current_debug());

        self.table_jump(expression, cases, default_case.unwrap_or(after_switch));
        for (block, body) in children {
            self.seal_block(block);
            self.current = Some(block);
            self.build_block(body);
            self.jump(after_switch);
        }
        self.seal_block(after_switch);
        self.current = Some(after_switch);
    }

    fn visit_for_loop(&mut self, statement: &'a ForLoop) {
        // the pre block scopes over condition, body and post
        let pre_scope = self
            .ctx
            .scopes
            .scope_of(statement.pre.id)
            .expect("building an unresolved block");
        let saved_scope = self.scope;
        self.build_block(&statement.pre);
        self.scope = pre_scope;
        let pre_loop_debug = self.current_debug();

        let constant_condition = statement
            .condition
            .as_literal()
            .map(|literal| literal.value != 0);

        let loop_condition = self.cfg.make_block(statement.condition.debug());
        let loop_body = self.cfg.make_block(statement.body.debug);
        let post = self.cfg.make_block(statement.post.debug);
        let after_loop = self.cfg.make_block(pre_loop_debug);

        self.loop_stack.push(ForLoopTargets {
            break_block: after_loop,
            continue_block: post,
        });

        match constant_condition {
            Some(true) => {
                // the condition block is elided; pre jumps straight into the
                // body and post closes the back edge
                self.jump(loop_body);
                self.build_block(&statement.body);
                self.jump(post);
                self.seal_block(post);
                self.build_block(&statement.post);
                self.jump(loop_body);
                self.seal_block(loop_body);
            }
            Some(false) => {
                self.jump(after_loop);
            }
            None => {
                self.jump(loop_condition);
                let condition = self.visit_expression(&statement.condition);
                self.conditional_jump(condition, loop_body, after_loop);
                self.seal_block(loop_body);
                self.current = Some(loop_body);
                self.build_block(&statement.body);
                self.jump(post);
                self.seal_block(post);
                self.build_block(&statement.post);
                self.jump(loop_condition);
                // sealing the condition block closes the back edge; this must
                // happen after post has jumped back
                self.seal_block(loop_condition);
            }
        }

        self.loop_stack.pop();
        self.seal_block(after_loop);
        self.current = Some(after_loop);
        self.scope = saved_scope;
    }

    // ---- expressions and calls -------------------------------------------

    fn visit_expression(&mut self, expression: &'a Expression) -> ValueId {
        match expression {
            Expression::Literal(literal) => {
                let debug = self.current_debug();
                self.cfg.new_literal(debug, literal.value)
            }
            Expression::Identifier(identifier) => {
                let variable = self.lookup_variable(identifier);
                let current = self.current_block();
                self.read_variable(variable, current)
            }
            Expression::FunctionCall(call) => {
                let results = self.visit_function_call(call);
                assert_eq!(results.len(), 1, "call used as value must return one value");
                results[0]
            }
        }
    }

    fn visit_function_call(&mut self, call: &'a FunctionCall) -> Vec<ValueId> {
        let (operation, can_continue) =
            if let Some(function) = self.lookup_scope_function(&call.function.name) {
                let can_continue = self.ctx.side_effects.can_continue(function);
                let returns = self.ctx.scopes.function(function).returns;
                debug_assert!(
                    self.find_function_definition(function).is_some(),
                    "call to function without a registered definition"
                );
                // arguments are evaluated and recorded in reverse order
                let mut inputs = Vec::with_capacity(call.arguments.len());
                for argument in call.arguments.iter().rev() {
                    inputs.push(self.visit_expression(argument));
                }
                let outputs = (0..returns)
                    .map(|_| self.cfg.new_variable(self.current_block()))
                    .collect();
                let call_site = self.sink.call_sites.add_call_site(call);
                (
                    Operation {
                        outputs,
                        kind: OpKind::Call {
                            function,
                            call_site,
                            can_continue,
                        },
                        inputs,
                    },
                    can_continue,
                )
            } else {
                let handle = self
                    .ctx
                    .dialect
                    .find_builtin(&call.function.name)
                    .expect("unresolved callee");
                let builtin = self.ctx.dialect.builtin(handle);
                // literal-only argument positions stay on the call site and
                // are not evaluated
                let mut inputs = Vec::with_capacity(builtin.inputs);
                for (index, argument) in call.arguments.iter().enumerate().rev() {
                    if !builtin.literal_argument(index) {
                        inputs.push(self.visit_expression(argument));
                    }
                }
                let outputs = (0..builtin.outputs)
                    .map(|_| self.cfg.new_variable(self.current_block()))
                    .collect();
                let call_site = self.sink.call_sites.add_call_site(call);
                let can_continue = builtin.control_flow.can_continue;
                (
                    Operation {
                        outputs,
                        kind: OpKind::BuiltinCall {
                            builtin: handle,
                            call_site,
                        },
                        inputs,
                    },
                    can_continue,
                )
            };

        let results = operation.outputs.clone();
        let current = self.current_block();
        self.cfg.block_mut(current).operations.push(operation);
        if !can_continue {
            let debug = self.current_debug();
            self.cfg.block_mut(current).exit = Exit::Terminated;
            self.start_dead_block(debug);
        }
        results
    }

    fn assign(&mut self, variables: Vec<VarId>, value: Option<&'a Expression>) {
        let rhs: Vec<ValueId> = match value {
            Some(Expression::FunctionCall(call)) => self.visit_function_call(call),
            Some(expression) => vec![self.visit_expression(expression)],
            None => {
                let zero = self.zero();
                vec![zero; variables.len()]
            }
        };
        assert_eq!(rhs.len(), variables.len(), "assignment arity mismatch");

        let current = self.current_block();
        for (variable, value) in variables.into_iter().zip(rhs) {
            if self.ctx.options.keep_literal_assignments && self.cfg.is_literal_value(value) {
                let output = self.cfg.new_variable(current);
                self.cfg.block_mut(current).operations.push(Operation {
                    outputs: vec![output],
                    kind: OpKind::LiteralAssignment,
                    inputs: vec![value],
                });
                self.write_variable(variable, current, output);
            } else {
                self.write_variable(variable, current, value);
            }
        }
    }

    // ---- name lookups ----------------------------------------------------

    fn lookup_variable(&self, identifier: &Identifier) -> VarId {
        self.ctx
            .scopes
            .lookup_variable(self.scope, &identifier.name)
            .expect("unresolved variable")
    }

    fn lookup_scope_function(&self, name: &str) -> Option<FunctionId> {
        match self.ctx.scopes.lookup(self.scope, name) {
            Some(ScopeEntry::Function(function)) => Some(function),
            _ => None,
        }
    }

    fn find_function_definition(&self, function: FunctionId) -> Option<&'a FunctionDefinition> {
        self.function_definitions
            .iter()
            .find(|(id, _)| *id == function)
            .map(|(_, definition)| *definition)
    }

    // ---- function graphs -------------------------------------------------

    fn build_function_graph(&mut self, function: FunctionId, definition: &'a FunctionDefinition) {
        let body_scope = self
            .ctx
            .scopes
            .scope_of(definition.body.id)
            .expect("unresolved function body");

        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(definition.body.debug);
        cfg.entry = entry;
        cfg.debug = definition.debug;
        cfg.function = Some(function);
        cfg.can_continue = self.ctx.side_effects.can_continue(function);
        cfg.arguments = definition
            .parameters
            .iter()
            .map(|parameter| {
                let variable = self
                    .ctx
                    .scopes
                    .lookup_variable(body_scope, &parameter.name)
                    .expect("unresolved parameter");
                let value = cfg.new_variable(entry);
                (variable, value)
            })
            .collect();
        cfg.returns = definition
            .returns
            .iter()
            .map(|ret| {
                self.ctx
                    .scopes
                    .lookup_variable(body_scope, &ret.name)
                    .expect("unresolved return variable")
            })
            .collect();

        let mut builder = GraphBuilder::new(self.ctx, &mut *self.sink, cfg, body_scope, entry);
        builder.function_definitions = self.function_definitions.clone();
        for (variable, value) in builder.cfg.arguments.clone() {
            builder.write_variable(variable, entry, value);
        }
        for variable in builder.cfg.returns.clone() {
            // returns read as zero until explicitly written, observable on
            // an early `leave`
            let zero = builder.zero();
            builder.write_variable(variable, entry, zero);
        }
        builder.seal_block(entry);
        builder.build_block(&definition.body);
        // artificial function exit at the end of the body
        builder.leave();
        builder.clean_unreachable();

        let graph = builder.cfg;
        self.sink.function_graphs.push((function, graph));
    }

    // ---- SSA primitives --------------------------------------------------

    fn write_variable(&mut self, variable: VarId, block: BlockId, value: ValueId) {
        self.current_def
            .entry(variable)
            .or_default()
            .insert(block, value);
    }

    fn read_variable(&mut self, variable: VarId, block: BlockId) -> ValueId {
        if let Some(value) = self
            .current_def
            .get(&variable)
            .and_then(|defs| defs.get(&block))
        {
            return *value;
        }
        self.read_variable_recursive(variable, block)
    }

    fn read_variable_recursive(&mut self, variable: VarId, block: BlockId) -> ValueId {
        let value = if !self.block_info(block).sealed {
            // incomplete CFG: defer the operands until sealing
            let phi = self.cfg.new_phi(block);
            self.cfg.block_mut(block).phis.insert(phi);
            self.block_info(block).incomplete_phis.push((phi, variable));
            phi
        } else if self.cfg.block(block).entries.len() == 1 {
            // one predecessor: no phi needed
            let predecessor = *self
                .cfg
                .block(block)
                .entries
                .iter()
                .next()
                .expect("single predecessor");
            self.read_variable(variable, predecessor)
        } else {
            // break potential cycles with an operand-less phi
            let phi = self.cfg.new_phi(block);
            self.cfg.block_mut(block).phis.insert(phi);
            self.write_variable(variable, block, phi);
            let phi = self.add_phi_operands(variable, phi);
            self.try_remove_trivial_phi(phi)
        };
        self.write_variable(variable, block, value);
        value
    }

    /// Fills the operands of `phi` by reading `variable` in each predecessor
    /// of its block, in the stable entry order.
    ///
    /// Trivial-φ removal is deliberately *not* attempted here: this also runs
    /// for incomplete φs during sealing, and removal on unsealed blocks is
    /// forbidden.
    fn add_phi_operands(&mut self, variable: VarId, phi: ValueId) -> ValueId {
        let block = self
            .cfg
            .value_info(phi)
            .as_phi()
            .expect("adding operands to a non-phi")
            .block;
        let predecessors: Vec<BlockId> = self.cfg.block(block).entries.iter().copied().collect();
        for predecessor in predecessors {
            let argument = self.read_variable(variable, predecessor);
            match self.cfg.value_info_mut(phi) {
                ValueInfo::Phi(info) => info.arguments.push(argument),
                _ => unreachable!("phi changed kind"),
            }
        }
        phi
    }

    /// Removes `phi` if it merges fewer than two distinct values, rewriting
    /// every use in the graph to the remaining value (or to the canonical
    /// unreachable value when there is none) and cascading into φs that used
    /// it.
    fn try_remove_trivial_phi(&mut self, phi: ValueId) -> ValueId {
        let info = self
            .cfg
            .value_info(phi)
            .as_phi()
            .expect("trivial-phi removal on a non-phi");
        assert!(
            self.block_info.get(&info.block).is_some_and(|info| info.sealed),
            "trivial-phi removal on an unsealed block"
        );

        let mut same: Option<ValueId> = None;
        for argument in &info.arguments {
            if Some(*argument) == same || *argument == phi {
                continue; // repeated value or self-reference
            }
            if same.is_some() {
                return phi; // merges at least two distinct values
            }
            same = Some(*argument);
        }
        // no distinct argument at all happens on unreachable paths
        let same = same.unwrap_or_else(|| self.cfg.unreachable_value());

        let defining_block = info.block;
        self.cfg.block_mut(defining_block).phis.remove(&phi);

        // rewrite every use in the graph
        let mut phi_uses = Vec::new();
        for block_id in self.cfg.block_ids().collect::<Vec<_>>() {
            let phis: Vec<ValueId> = self.cfg.block(block_id).phis.iter().copied().collect();
            for block_phi in phis {
                assert_ne!(block_phi, phi, "phi still present in a block after erasure");
                let ValueInfo::Phi(info) = self.cfg.value_info_mut(block_phi) else {
                    unreachable!("phi changed kind")
                };
                let mut used = false;
                for argument in &mut info.arguments {
                    if *argument == phi {
                        *argument = same;
                        used = true;
                    }
                }
                if used {
                    phi_uses.push(block_phi);
                }
            }
            let block = self.cfg.block_mut(block_id);
            for operation in &mut block.operations {
                for input in &mut operation.inputs {
                    if *input == phi {
                        *input = same;
                    }
                }
            }
            match &mut block.exit {
                Exit::FunctionReturn { return_values } => {
                    for value in return_values {
                        if *value == phi {
                            *value = same;
                        }
                    }
                }
                Exit::ConditionalJump { condition, .. } => {
                    if *condition == phi {
                        *condition = same;
                    }
                }
                Exit::JumpTable { value, .. } => {
                    if *value == phi {
                        *value = same;
                    }
                }
                Exit::Jump { .. } | Exit::MainExit | Exit::Terminated => {}
            }
        }
        for defs in self.current_def.values_mut() {
            for value in defs.values_mut() {
                if *value == phi {
                    *value = same;
                }
            }
        }

        // removing this phi may have made its users trivial in turn
        for user in phi_uses {
            self.try_remove_trivial_phi(user);
        }

        same
    }

    /// Seals `block`: all predecessors are known from here on. Fills the
    /// operands of every incomplete φ, marks the block sealed, and only then
    /// attempts trivial removal of those φs.
    fn seal_block(&mut self, block: BlockId) {
        assert!(
            !self.block_info(block).sealed,
            "trying to seal an already sealed block"
        );
        let mut index = 0;
        loop {
            let Some(&(phi, variable)) = self.block_info(block).incomplete_phis.get(index) else {
                break;
            };
            self.add_phi_operands(variable, phi);
            index += 1;
        }
        self.block_info(block).sealed = true;
        let incomplete = std::mem::take(&mut self.block_info(block).incomplete_phis);
        for (phi, _) in incomplete {
            self.try_remove_trivial_phi(phi);
        }
    }

    // ---- edges -----------------------------------------------------------

    fn jump(&mut self, target: BlockId) {
        let current = self.current_block();
        self.cfg.block_mut(current).exit = Exit::Jump { target };
        assert!(
            !self.block_info(target).sealed,
            "jump into an already sealed block"
        );
        self.cfg.block_mut(target).entries.insert(current);
        self.current = Some(target);
    }

    fn conditional_jump(&mut self, condition: ValueId, non_zero: BlockId, zero: BlockId) {
        let current = self.current_block();
        self.cfg.block_mut(current).exit = Exit::ConditionalJump {
            condition,
            non_zero,
            zero,
        };
        assert!(
            !self.block_info(non_zero).sealed && !self.block_info(zero).sealed,
            "conditional jump into an already sealed block"
        );
        self.cfg.block_mut(non_zero).entries.insert(current);
        self.cfg.block_mut(zero).entries.insert(current);
        self.current = None;
    }

    fn table_jump(
        &mut self,
        value: ValueId,
        cases: std::collections::BTreeMap<Word, BlockId>,
        default: BlockId,
    ) {
        let current = self.current_block();
        for case_block in cases.values() {
            assert!(
                !self.block_info(*case_block).sealed,
                "table jump into an already sealed block"
            );
            self.cfg.block_mut(*case_block).entries.insert(current);
        }
        assert!(!self.block_info(default).sealed);
        self.cfg.block_mut(default).entries.insert(current);
        self.cfg.block_mut(current).exit = Exit::JumpTable {
            value,
            cases,
            default,
        };
        self.current = None;
    }

    // ---- unreachable-edge pruning ----------------------------------------

    /// Removes edges from blocks that are not reachable from the entry, drops
    /// the corresponding φ arguments and re-examines the affected φs.
    /// Running this twice is a no-op after the first run.
    fn clean_unreachable(&mut self) {
        // breadth-first reachability along exit edges
        let mut reachable = FxHashSet::default();
        let mut queue = std::collections::VecDeque::new();
        reachable.insert(self.cfg.entry);
        queue.push_back(self.cfg.entry);
        while let Some(block) = queue.pop_front() {
            match &self.cfg.block(block).exit {
                Exit::Jump { target } => {
                    if reachable.insert(*target) {
                        queue.push_back(*target);
                    }
                }
                Exit::ConditionalJump { non_zero, zero, .. } => {
                    for target in [*non_zero, *zero] {
                        if reachable.insert(target) {
                            queue.push_back(target);
                        }
                    }
                }
                Exit::JumpTable { .. } => {
                    unreachable!("jump tables are never synthesized for current targets")
                }
                Exit::MainExit | Exit::FunctionReturn { .. } | Exit::Terminated => {}
            }
        }

        for block_id in self.cfg.block_ids().collect::<Vec<_>>() {
            if !reachable.contains(&block_id) {
                continue;
            }
            let old_entries: Vec<BlockId> =
                self.cfg.block(block_id).entries.iter().copied().collect();
            let kept: Vec<bool> = old_entries
                .iter()
                .map(|entry| reachable.contains(entry))
                .collect();
            self.cfg
                .block_mut(block_id)
                .entries
                .retain(|entry| reachable.contains(entry));

            let mut maybe_trivial = Vec::new();
            let phis: Vec<ValueId> = self.cfg.block(block_id).phis.iter().copied().collect();
            for phi in phis {
                let ValueInfo::Phi(info) = self.cfg.value_info_mut(phi) else {
                    unreachable!("phi changed kind")
                };
                let before = info.arguments.len();
                // drop the argument slots of pruned predecessors first to
                // keep the remaining slots aligned with the entries
                if info.arguments.len() == kept.len() {
                    let mut keep = kept.iter();
                    info.arguments.retain(|_| *keep.next().expect("alignment"));
                }
                info.arguments.retain(|argument| !argument.is_unreachable());
                if info.arguments.len() != before {
                    maybe_trivial.push(phi);
                }
            }
            // dropping arguments may have left trivial phis behind
            for phi in maybe_trivial {
                self.try_remove_trivial_phi(phi);
            }
        }

        // the graph's exits are exactly the reachable leaving blocks
        self.cfg.exits = reachable
            .iter()
            .copied()
            .filter(|block| {
                matches!(
                    self.cfg.block(*block).exit,
                    Exit::MainExit | Exit::FunctionReturn { .. }
                )
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Assignment, Case, DebugData, ExpressionStatement, Literal, VariableDeclaration,
    };
    use crate::dialect::EvmVersion;
    use crate::scope::resolve;

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            debug: DebugData::EMPTY,
        }
    }

    fn lit(value: u128) -> Expression {
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

    fn let_stmt(names: &[&str], value: Expression) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            variables: names.iter().map(|name| ident(name)).collect(),
            value: Some(value),
            debug: DebugData::EMPTY,
        })
    }

    fn assign_stmt(name: &str, value: Expression) -> Statement {
        Statement::Assignment(Assignment {
            targets: vec![ident(name)],
            value,
            debug: DebugData::EMPTY,
        })
    }

    fn expr_stmt(expression: Expression) -> Statement {
        Statement::Expression(ExpressionStatement {
            expression,
            debug: DebugData::EMPTY,
        })
    }

    fn build(statements: Vec<Statement>) -> ControlFlow {
        build_with_options(statements, BuildOptions::default())
    }

    fn build_with_options(statements: Vec<Statement>, options: BuildOptions) -> ControlFlow {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(statements);
        let scopes = resolve(&mut root, &dialect).unwrap();
        let side_effects = SideEffects::collect(&root, &scopes, &dialect);
        CfgBuilder::with_options(&scopes, &side_effects, &dialect, options).build(&root)
    }

    fn reachable_blocks(cfg: &SsaCfg) -> Vec<BlockId> {
        let mut seen = vec![cfg.entry];
        let mut index = 0;
        while index < seen.len() {
            let block = seen[index];
            index += 1;
            cfg.block(block).for_each_exit(|succ| {
                if !seen.contains(&succ) {
                    seen.push(succ);
                }
            });
        }
        seen
    }

    #[test]
    fn test_straight_line_code_single_block() {
        let control = build(vec![
            let_stmt(&["x"], lit(1)),
            expr_stmt(call("sstore", vec![lit(0), var("x")])),
        ]);
        let cfg = &control.main;
        assert_eq!(reachable_blocks(cfg).len(), 1);
        let entry = cfg.block(cfg.entry);
        assert_eq!(entry.operations.len(), 1);
        assert!(entry.phis.is_empty());
        assert!(matches!(entry.exit, Exit::MainExit));
        // sstore(0, x): inputs in reverse order, x on top
        let op = &entry.operations[0];
        assert_eq!(op.inputs.len(), 2);
        assert!(op.inputs[0].is_literal());
    }

    #[test]
    fn test_diamond_if_creates_phi() {
        // let x := 0
        // if c { x := 1 }    (c is calldataload(0), not constant-foldable)
        // sstore(0, x)
        let control = build(vec![
            let_stmt(&["x"], lit(0)),
            let_stmt(&["c"], call("calldataload", vec![lit(0)])),
            Statement::If(If {
                condition: var("c"),
                body: Block::new(vec![assign_stmt("x", lit(1))]),
                debug: DebugData::EMPTY,
            }),
            expr_stmt(call("sstore", vec![lit(0), var("x")])),
        ]);
        let cfg = &control.main;
        // entry, if-branch, after-if
        assert_eq!(reachable_blocks(cfg).len(), 3);

        let Exit::ConditionalJump { non_zero, zero, .. } = cfg.block(cfg.entry).exit else {
            panic!("entry must end in a conditional jump");
        };
        let after_if = zero;
        let merge = cfg.block(after_if);
        assert_eq!(merge.entries.len(), 2);
        assert_eq!(merge.phis.len(), 1, "x must merge in a single phi");

        let phi = *merge.phis.iter().next().unwrap();
        let info = cfg.value_info(phi).as_phi().unwrap();
        assert_eq!(info.arguments.len(), 2);
        // arguments follow the stable predecessor order
        let entry_index = cfg.phi_argument_index(cfg.entry, after_if);
        let branch_index = cfg.phi_argument_index(non_zero, after_if);
        assert_eq!(cfg.value_info(info.arguments[entry_index]).as_literal(), Some(0));
        assert_eq!(cfg.value_info(info.arguments[branch_index]).as_literal(), Some(1));

        // the post-merge use reads the phi
        let use_op = &merge.operations[0];
        assert!(use_op.inputs.contains(&phi));
    }

    #[test]
    fn test_trivial_phi_collapses() {
        // let x := 0; if c { }; sstore(0, x) — x is never written in the
        // branch, so no phi must remain
        let control = build(vec![
            let_stmt(&["x"], lit(0)),
            let_stmt(&["c"], call("calldataload", vec![lit(0)])),
            Statement::If(If {
                condition: var("c"),
                body: Block::new(vec![]),
                debug: DebugData::EMPTY,
            }),
            expr_stmt(call("sstore", vec![lit(0), var("x")])),
        ]);
        let cfg = &control.main;
        for block in reachable_blocks(cfg) {
            assert!(cfg.block(block).phis.is_empty(), "no phi may survive");
        }
        // the use resolves to the original literal zero
        let mut found = false;
        for block in reachable_blocks(cfg) {
            for op in &cfg.block(block).operations {
                if matches!(op.kind, OpKind::BuiltinCall { .. }) && op.inputs.len() == 2 {
                    assert!(op.inputs.iter().all(|v| v.is_literal()));
                    found = true;
                }
            }
        }
        assert!(found, "sstore operation missing");
    }

    #[test]
    fn test_constant_conditions_fold() {
        let control = build(vec![
            Statement::If(If {
                condition: lit(1),
                body: Block::new(vec![expr_stmt(call("sstore", vec![lit(0), lit(1)]))]),
                debug: DebugData::EMPTY,
            }),
            Statement::If(If {
                condition: lit(0),
                body: Block::new(vec![expr_stmt(call("sstore", vec![lit(2), lit(3)]))]),
                debug: DebugData::EMPTY,
            }),
        ]);
        let cfg = &control.main;
        // both ifs fold away; only the taken branch's operation remains
        assert_eq!(reachable_blocks(cfg).len(), 1);
        assert_eq!(cfg.block(cfg.entry).operations.len(), 1);
    }

    #[test]
    fn test_counted_loop_shape() {
        // for { let i := 0 } lt(i, 4) { i := add(i, 1) } { sstore(i, i) }
        let control = build(vec![Statement::ForLoop(ForLoop {
            pre: Block::new(vec![let_stmt(&["i"], lit(0))]),
            condition: call("lt", vec![var("i"), lit(4)]),
            post: Block::new(vec![assign_stmt("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![expr_stmt(call("sstore", vec![var("i"), var("i")]))]),
            debug: DebugData::EMPTY,
        })]);
        let cfg = &control.main;
        // entry(pre), condition, body, post, after
        assert_eq!(reachable_blocks(cfg).len(), 5);

        let Exit::Jump { target: condition } = cfg.block(cfg.entry).exit else {
            panic!("pre must jump to the condition block");
        };
        let condition_block = cfg.block(condition);
        assert_eq!(condition_block.entries.len(), 2, "pre and post enter the condition");
        assert_eq!(condition_block.phis.len(), 1, "i merges in the condition block");

        let phi = *condition_block.phis.iter().next().unwrap();
        let info = cfg.value_info(phi).as_phi().unwrap();
        assert_eq!(info.arguments.len(), 2);
        let from_pre = cfg.phi_argument_index(cfg.entry, condition);
        assert_eq!(cfg.value_info(info.arguments[from_pre]).as_literal(), Some(0));
        // the other argument is the add result
        let from_post = 1 - from_pre;
        assert!(matches!(
            cfg.value_info(info.arguments[from_post]),
            ValueInfo::Variable { .. }
        ));
    }

    #[test]
    fn test_break_and_continue_target_the_right_blocks() {
        let control = build(vec![Statement::ForLoop(ForLoop {
            pre: Block::new(vec![let_stmt(&["i"], lit(0))]),
            condition: call("lt", vec![var("i"), lit(4)]),
            post: Block::new(vec![assign_stmt("i", call("add", vec![var("i"), lit(1)]))]),
            body: Block::new(vec![
                Statement::If(If {
                    condition: call("eq", vec![var("i"), lit(2)]),
                    body: Block::new(vec![Statement::Break(crate::ast::Break {
                        debug: DebugData::EMPTY,
                    })]),
                    debug: DebugData::EMPTY,
                }),
                Statement::Continue(crate::ast::Continue {
                    debug: DebugData::EMPTY,
                }),
            ]),
            debug: DebugData::EMPTY,
        })]);
        // must build and prune without violating any invariant, and the
        // reachable graph must still contain the loop
        let cfg = &control.main;
        let reachable = reachable_blocks(cfg);
        for block in &reachable {
            for phi in &cfg.block(*block).phis {
                let info = cfg.value_info(*phi).as_phi().unwrap();
                assert_eq!(
                    info.arguments.len(),
                    cfg.block(*block).entries.len(),
                    "phi arguments must match predecessors"
                );
            }
        }
    }

    #[test]
    fn test_terminating_call_ends_block() {
        let control = build(vec![
            expr_stmt(call("sstore", vec![lit(0), lit(0)])),
            expr_stmt(call("revert", vec![lit(0), lit(0)])),
            // dead code
            expr_stmt(call("sstore", vec![lit(1), lit(1)])),
        ]);
        let cfg = &control.main;
        let entry = cfg.block(cfg.entry);
        assert!(matches!(entry.exit, Exit::Terminated));
        assert_eq!(entry.operations.len(), 2);
        // the dead block is unreachable and keeps no entries
        assert_eq!(reachable_blocks(cfg).len(), 1);
    }

    #[test]
    fn test_switch_lowers_to_equality_chain() {
        let control = build(vec![
            let_stmt(&["s"], call("calldataload", vec![lit(0)])),
            Statement::Switch(Switch {
                expression: var("s"),
                cases: vec![
                    Case {
                        value: Some(Literal {
                            value: 1,
                            debug: DebugData::EMPTY,
                        }),
                        body: Block::new(vec![expr_stmt(call("sstore", vec![lit(0), lit(1)]))]),
                        debug: DebugData::EMPTY,
                    },
                    Case {
                        value: None,
                        body: Block::new(vec![expr_stmt(call("sstore", vec![lit(0), lit(2)]))]),
                        debug: DebugData::EMPTY,
                    },
                ],
                debug: DebugData::EMPTY,
            }),
        ]);
        let cfg = &control.main;
        // entry must end in a conditional jump on an eq comparison
        let entry = cfg.block(cfg.entry);
        let Exit::ConditionalJump { condition, .. } = entry.exit else {
            panic!("switch must produce a conditional jump");
        };
        let compare = entry
            .operations
            .iter()
            .find(|op| op.outputs.contains(&condition))
            .expect("comparison feeding the branch");
        assert!(matches!(compare.kind, OpKind::BuiltinCall { .. }));
        assert_eq!(compare.inputs.len(), 2);
    }

    #[test]
    fn test_constant_switch_inlines_case() {
        let control = build(vec![Statement::Switch(Switch {
            expression: lit(1),
            cases: vec![
                Case {
                    value: Some(Literal {
                        value: 1,
                        debug: DebugData::EMPTY,
                    }),
                    body: Block::new(vec![expr_stmt(call("sstore", vec![lit(0), lit(1)]))]),
                    debug: DebugData::EMPTY,
                },
                Case {
                    value: None,
                    body: Block::new(vec![expr_stmt(call("sstore", vec![lit(0), lit(2)]))]),
                    debug: DebugData::EMPTY,
                },
            ],
            debug: DebugData::EMPTY,
        })]);
        let cfg = &control.main;
        assert_eq!(reachable_blocks(cfg).len(), 1);
        assert_eq!(cfg.block(cfg.entry).operations.len(), 1);
    }

    #[test]
    fn test_keep_literal_assignments_wraps_literals() {
        let control = build_with_options(
            vec![
                let_stmt(&["x"], lit(7)),
                expr_stmt(call("sstore", vec![lit(0), var("x")])),
            ],
            BuildOptions {
                keep_literal_assignments: true,
                ..BuildOptions::default()
            },
        );
        let cfg = &control.main;
        let entry = cfg.block(cfg.entry);
        assert_eq!(entry.operations.len(), 2);
        assert!(matches!(entry.operations[0].kind, OpKind::LiteralAssignment));
        assert_eq!(entry.operations[0].outputs.len(), 1);
        // the use sees the wrapped output, not the literal
        let wrapped = entry.operations[0].outputs[0];
        assert!(entry.operations[1].inputs.contains(&wrapped));
    }

    #[test]
    fn test_function_graph_initializes_returns_to_zero() {
        let control = build(vec![
            Statement::FunctionDefinition(FunctionDefinition {
                name: ident("answer"),
                parameters: vec![],
                returns: vec![ident("r")],
                body: Block::new(vec![]),
                debug: DebugData::EMPTY,
            }),
            let_stmt(&["x"], call("answer", vec![])),
            expr_stmt(call("sstore", vec![lit(0), var("x")])),
        ]);
        assert_eq!(control.function_graphs.len(), 1);
        let graph = &control.function_graphs[0];
        assert_eq!(graph.returns.len(), 1);
        assert!(!graph.exits.is_empty());
        for exit in &graph.exits {
            let Exit::FunctionReturn { return_values } = &graph.block(*exit).exit else {
                panic!("function graph exits must be returns");
            };
            assert_eq!(return_values.len(), 1);
            assert_eq!(graph.value_info(return_values[0]).as_literal(), Some(0));
        }
    }

    #[test]
    fn test_function_arguments_are_entry_values() {
        let control = build(vec![
            Statement::FunctionDefinition(FunctionDefinition {
                name: ident("double"),
                parameters: vec![ident("a")],
                returns: vec![ident("r")],
                body: Block::new(vec![assign_stmt(
                    "r",
                    call("add", vec![var("a"), var("a")]),
                )]),
                debug: DebugData::EMPTY,
            }),
            expr_stmt(call("sstore", vec![lit(0), call("double", vec![lit(21)])])),
        ]);
        let graph = &control.function_graphs[0];
        assert_eq!(graph.arguments.len(), 1);
        let (_, value) = graph.arguments[0];
        assert!(matches!(
            graph.value_info(value),
            ValueInfo::Variable { defined_in } if *defined_in == graph.entry
        ));
        // the call in the main graph carries the argument and one output
        let main_entry = control.main.block(control.main.entry);
        let call_op = main_entry
            .operations
            .iter()
            .find(|op| matches!(op.kind, OpKind::Call { .. }))
            .expect("call operation");
        assert_eq!(call_op.inputs.len(), 1);
        assert_eq!(call_op.outputs.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already sealed")]
    fn test_sealing_twice_panics() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![]);
        let scopes = resolve(&mut root, &dialect).unwrap();
        let side_effects = SideEffects::collect(&root, &scopes, &dialect);
        let ctx = CfgBuilder::new(&scopes, &side_effects, &dialect);

        let mut sink = GraphSink::default();
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;
        let scope = scopes.scope_of(root.id).unwrap();
        let mut builder = GraphBuilder::new(&ctx, &mut sink, cfg, scope, entry);
        builder.seal_block(entry);
        builder.seal_block(entry);
    }

    #[test]
    fn test_pruning_is_idempotent() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut root = Block::new(vec![
            expr_stmt(call("revert", vec![lit(0), lit(0)])),
            expr_stmt(call("sstore", vec![lit(0), lit(0)])),
        ]);
        let scopes = resolve(&mut root, &dialect).unwrap();
        let side_effects = SideEffects::collect(&root, &scopes, &dialect);
        let ctx = CfgBuilder::new(&scopes, &side_effects, &dialect);

        let mut sink = GraphSink::default();
        let mut cfg = SsaCfg::new();
        let entry = cfg.make_block(DebugData::EMPTY);
        cfg.entry = entry;
        let scope = scopes.scope_of(root.id).unwrap();
        let mut builder = GraphBuilder::new(&ctx, &mut sink, cfg, scope, entry);
        builder.seal_block(entry);
        builder.build_block(&root);
        let last = builder.current_block();
        builder.cfg.block_mut(last).exit = Exit::MainExit;

        builder.clean_unreachable();
        let entries_after_first: Vec<_> = builder
            .cfg
            .block_ids()
            .map(|id| builder.cfg.block(id).entries.clone())
            .collect();
        builder.clean_unreachable();
        let entries_after_second: Vec<_> = builder
            .cfg
            .block_ids()
            .map(|id| builder.cfg.block(id).entries.clone())
            .collect();
        assert_eq!(entries_after_first, entries_after_second);
    }
}
