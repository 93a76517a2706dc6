//! Scopes and name resolution.
//!
//! The SSA CFG builder does not work on names: every identifier in the AST
//! must already be resolved to a *symbol* — a [`VarId`] or [`FunctionId`]
//! backed by the arenas in [`ScopeTable`]. This module provides both the
//! table the builder consumes and [`resolve`], a minimal resolver that
//! produces it from a raw AST (a full front end would bring its own).
//!
//! # Scoping rules
//!
//! - A block opens a scope; declarations are visible from their statement to
//!   the end of the block, in nested blocks included.
//! - Function definitions are hoisted: they are visible in the whole block
//!   they are declared in, prior statements included.
//! - Function bodies are *barriers*: functions remain visible inside them,
//!   variables of enclosing scopes do not.
//! - The `pre` block of a for-loop scopes over the condition, the body and
//!   the post block.
//! - Names reserved by the dialect cannot be declared.

use rustc_hash::FxHashMap;

use crate::{
    ast::{self, Block, Expression, NodeId, Statement},
    dialect::Dialect,
    Error, Result,
};

/// Identifier of a variable symbol, dense per [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    /// Returns the raw index into the variable arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a function symbol, dense per [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
    /// Returns the raw index into the function arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a scope within a [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    /// A variable symbol.
    Variable(VarId),
    /// A function symbol.
    Function(FunctionId),
}

/// A variable symbol.
#[derive(Debug, Clone)]
pub struct VariableSymbol {
    /// Declared name.
    pub name: String,
}

/// A function symbol.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    /// Declared name.
    pub name: String,
    /// Number of parameters.
    pub parameters: usize,
    /// Number of return variables.
    pub returns: usize,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Function-body scopes hide the variables of enclosing scopes.
    barrier: bool,
    identifiers: FxHashMap<String, ScopeEntry>,
}

/// Resolution results: symbol arenas plus the block → scope mapping.
#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    block_scopes: FxHashMap<NodeId, ScopeId>,
    variables: Vec<VariableSymbol>,
    functions: Vec<FunctionSymbol>,
}

impl ScopeTable {
    /// Returns the scope opened by the given block.
    #[must_use]
    pub fn scope_of(&self, block: NodeId) -> Option<ScopeId> {
        self.block_scopes.get(&block).copied()
    }

    /// Resolves `name` starting from `scope`, walking enclosing scopes.
    ///
    /// Variables are not visible across function-body barriers; functions
    /// are.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<ScopeEntry> {
        let mut current = Some(scope);
        let mut crossed_barrier = false;
        while let Some(id) = current {
            let scope = &self.scopes[id.0 as usize];
            if let Some(entry) = scope.identifiers.get(name) {
                return match entry {
                    ScopeEntry::Variable(_) if crossed_barrier => None,
                    _ => Some(*entry),
                };
            }
            crossed_barrier |= scope.barrier;
            current = scope.parent;
        }
        None
    }

    /// Resolves `name` to a variable symbol.
    pub fn lookup_variable(&self, scope: ScopeId, name: &str) -> Result<VarId> {
        match self.lookup(scope, name) {
            Some(ScopeEntry::Variable(var)) => Ok(var),
            Some(ScopeEntry::Function(_)) => Err(Error::NotAVariable(name.to_string())),
            None => Err(Error::UndefinedIdentifier(name.to_string())),
        }
    }

    /// Resolves `name` to a function symbol.
    pub fn lookup_function(&self, scope: ScopeId, name: &str) -> Result<FunctionId> {
        match self.lookup(scope, name) {
            Some(ScopeEntry::Function(function)) => Ok(function),
            Some(ScopeEntry::Variable(_)) => Err(Error::NotAFunction(name.to_string())),
            None => Err(Error::UndefinedIdentifier(name.to_string())),
        }
    }

    /// Returns the variable symbol for an id.
    #[must_use]
    pub fn variable(&self, id: VarId) -> &VariableSymbol {
        &self.variables[id.index()]
    }

    /// Returns the function symbol for an id.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> &FunctionSymbol {
        &self.functions[id.index()]
    }

    /// Number of variable symbols.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of function symbols.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    fn new_scope(&mut self, parent: Option<ScopeId>, barrier: bool) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflow"));
        self.scopes.push(Scope {
            parent,
            barrier,
            identifiers: FxHashMap::default(),
        });
        id
    }
}

/// Resolves an AST in place: assigns block ids and produces the
/// [`ScopeTable`] mapping every block to its scope.
///
/// # Errors
///
/// Fails on undeclared or reserved identifiers, duplicate declarations,
/// arity mismatches, non-literal arguments in literal-only builtin argument
/// positions, and `break`/`continue`/`leave` outside their statements'
/// required context.
pub fn resolve(block: &mut Block, dialect: &Dialect) -> Result<ScopeTable> {
    let mut resolver = Resolver {
        dialect,
        table: ScopeTable::default(),
        next_node: 0,
        loop_depth: 0,
        in_function: false,
    };
    resolver.resolve_block(block, None, false)?;
    Ok(resolver.table)
}

struct Resolver<'a> {
    dialect: &'a Dialect,
    table: ScopeTable,
    next_node: u32,
    loop_depth: usize,
    in_function: bool,
}

impl Resolver<'_> {
    fn assign_id(&mut self, block: &mut Block) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        block.id = id;
        id
    }

    fn declare_variable(&mut self, scope: ScopeId, name: &ast::Identifier) -> Result<VarId> {
        self.check_declarable(scope, &name.name)?;
        let var = VarId(u32::try_from(self.table.variables.len()).expect("variable arena overflow"));
        self.table.variables.push(VariableSymbol {
            name: name.name.clone(),
        });
        self.table.scopes[scope.0 as usize]
            .identifiers
            .insert(name.name.clone(), ScopeEntry::Variable(var));
        Ok(var)
    }

    fn declare_function(&mut self, scope: ScopeId, definition: &ast::FunctionDefinition) -> Result<()> {
        self.check_declarable(scope, &definition.name.name)?;
        let function = FunctionId(
            u32::try_from(self.table.functions.len()).expect("function arena overflow"),
        );
        self.table.functions.push(FunctionSymbol {
            name: definition.name.name.clone(),
            parameters: definition.parameters.len(),
            returns: definition.returns.len(),
        });
        self.table.scopes[scope.0 as usize]
            .identifiers
            .insert(definition.name.name.clone(), ScopeEntry::Function(function));
        Ok(())
    }

    fn check_declarable(&self, scope: ScopeId, name: &str) -> Result<()> {
        if self.dialect.reserved_identifier(name) {
            return Err(Error::ReservedIdentifier(name.to_string()));
        }
        if self.table.scopes[scope.0 as usize].identifiers.contains_key(name) {
            return Err(Error::DuplicateIdentifier(name.to_string()));
        }
        Ok(())
    }

    /// Resolves a block, opening a fresh scope under `parent`.
    fn resolve_block(&mut self, block: &mut Block, parent: Option<ScopeId>, barrier: bool) -> Result<ScopeId> {
        let id = self.assign_id(block);
        let scope = self.table.new_scope(parent, barrier);
        self.table.block_scopes.insert(id, scope);
        self.resolve_statements(&mut block.statements, scope)?;
        Ok(scope)
    }

    fn resolve_statements(&mut self, statements: &mut [Statement], scope: ScopeId) -> Result<()> {
        // hoist function definitions so they see each other
        for statement in statements.iter() {
            if let Statement::FunctionDefinition(definition) = statement {
                self.declare_function(scope, definition)?;
            }
        }
        for statement in statements.iter_mut() {
            self.resolve_statement(statement, scope)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &mut Statement, scope: ScopeId) -> Result<()> {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = &mut declaration.value {
                    self.expect_values(value, scope, declaration.variables.len())?;
                }
                for variable in &declaration.variables {
                    self.declare_variable(scope, variable)?;
                }
                Ok(())
            }
            Statement::Assignment(assignment) => {
                self.expect_values(&mut assignment.value, scope, assignment.targets.len())?;
                for target in &assignment.targets {
                    self.table.lookup_variable(scope, &target.name)?;
                }
                Ok(())
            }
            Statement::Expression(statement) => {
                self.expect_values(&mut statement.expression, scope, 0)
            }
            Statement::FunctionDefinition(definition) => {
                // name already declared during hoisting
                let body_scope = {
                    let id = self.assign_id(&mut definition.body);
                    let body_scope = self.table.new_scope(Some(scope), true);
                    self.table.block_scopes.insert(id, body_scope);
                    body_scope
                };
                for parameter in &definition.parameters {
                    self.declare_variable(body_scope, parameter)?;
                }
                for ret in &definition.returns {
                    self.declare_variable(body_scope, ret)?;
                }
                let was_in_function = std::mem::replace(&mut self.in_function, true);
                let outer_loop_depth = std::mem::take(&mut self.loop_depth);
                self.resolve_statements(&mut definition.body.statements, body_scope)?;
                self.in_function = was_in_function;
                self.loop_depth = outer_loop_depth;
                Ok(())
            }
            Statement::If(statement) => {
                self.expect_values(&mut statement.condition, scope, 1)?;
                self.resolve_block(&mut statement.body, Some(scope), false)?;
                Ok(())
            }
            Statement::Switch(statement) => {
                self.expect_values(&mut statement.expression, scope, 1)?;
                for case in &mut statement.cases {
                    self.resolve_block(&mut case.body, Some(scope), false)?;
                }
                Ok(())
            }
            Statement::ForLoop(statement) => {
                // the pre block scopes over condition, body and post
                let pre_scope = {
                    let id = self.assign_id(&mut statement.pre);
                    let pre_scope = self.table.new_scope(Some(scope), false);
                    self.table.block_scopes.insert(id, pre_scope);
                    self.resolve_statements(&mut statement.pre.statements, pre_scope)?;
                    pre_scope
                };
                self.expect_values(&mut statement.condition, pre_scope, 1)?;
                self.loop_depth += 1;
                self.resolve_block(&mut statement.body, Some(pre_scope), false)?;
                self.loop_depth -= 1;
                // break/continue may not occur in the post block, not even
                // for an enclosing loop
                let outer_depth = std::mem::take(&mut self.loop_depth);
                self.resolve_block(&mut statement.post, Some(pre_scope), false)?;
                self.loop_depth = outer_depth;
                Ok(())
            }
            Statement::Break(_) | Statement::Continue(_) => {
                if self.loop_depth == 0 {
                    return Err(Error::Error(
                        "break/continue outside of a for-loop".to_string(),
                    ));
                }
                Ok(())
            }
            Statement::Leave(_) => {
                if !self.in_function {
                    return Err(Error::Error("leave outside of a function".to_string()));
                }
                Ok(())
            }
            Statement::Block(block) => {
                self.resolve_block(block, Some(scope), false)?;
                Ok(())
            }
        }
    }

    /// Resolves an expression and checks it yields exactly `expected` values.
    fn expect_values(&mut self, expression: &mut Expression, scope: ScopeId, expected: usize) -> Result<()> {
        let actual = self.resolve_expression(expression, scope)?;
        if actual != expected {
            return Err(Error::Error(format!(
                "expression yields {actual} value(s), expected {expected}"
            )));
        }
        Ok(())
    }

    /// Resolves an expression; returns the number of values it yields.
    fn resolve_expression(&mut self, expression: &mut Expression, scope: ScopeId) -> Result<usize> {
        match expression {
            Expression::Literal(_) => Ok(1),
            Expression::Identifier(identifier) => {
                self.table.lookup_variable(scope, &identifier.name)?;
                Ok(1)
            }
            Expression::FunctionCall(call) => self.resolve_call(call, scope),
        }
    }

    fn resolve_call(&mut self, call: &mut ast::FunctionCall, scope: ScopeId) -> Result<usize> {
        let name = call.function.name.clone();
        if let Some(ScopeEntry::Function(function)) = self.table.lookup(scope, &name) {
            let symbol = self.table.function(function);
            let (parameters, returns) = (symbol.parameters, symbol.returns);
            if call.arguments.len() != parameters {
                return Err(Error::ArityMismatch {
                    name,
                    expected: parameters,
                    actual: call.arguments.len(),
                });
            }
            for argument in &mut call.arguments {
                self.expect_values(argument, scope, 1)?;
            }
            return Ok(returns);
        }

        let Some(handle) = self.dialect.find_builtin(&name) else {
            return Err(Error::UndefinedIdentifier(name));
        };
        let builtin = self.dialect.builtin(handle);
        if call.arguments.len() != builtin.call_arity() {
            return Err(Error::ArityMismatch {
                name,
                expected: builtin.call_arity(),
                actual: call.arguments.len(),
            });
        }
        for (index, argument) in call.arguments.iter_mut().enumerate() {
            if builtin.literal_argument(index) {
                if argument.as_literal().is_none() {
                    return Err(Error::LiteralArgumentExpected { name, index });
                }
            } else {
                self.expect_values(argument, scope, 1)?;
            }
        }
        Ok(builtin.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DebugData, Identifier, Literal, VariableDeclaration};
    use crate::dialect::EvmVersion;

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            debug: DebugData::EMPTY,
        }
    }

    fn let_lit(name: &str, value: u128) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            variables: vec![ident(name)],
            value: Some(Expression::Literal(Literal {
                value,
                debug: DebugData::EMPTY,
            })),
            debug: DebugData::EMPTY,
        })
    }

    #[test]
    fn test_declaration_and_lookup() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut block = Block::new(vec![let_lit("x", 1)]);
        let table = resolve(&mut block, &dialect).unwrap();

        let scope = table.scope_of(block.id).unwrap();
        assert!(matches!(
            table.lookup(scope, "x"),
            Some(ScopeEntry::Variable(_))
        ));
        assert!(table.lookup(scope, "y").is_none());
    }

    #[test]
    fn test_reserved_name_rejected() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut block = Block::new(vec![let_lit("mload", 1)]);
        assert!(matches!(
            resolve(&mut block, &dialect),
            Err(Error::ReservedIdentifier(_))
        ));
    }

    #[test]
    fn test_undeclared_use_rejected() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut block = Block::new(vec![Statement::Assignment(crate::ast::Assignment {
            targets: vec![ident("x")],
            value: Expression::Literal(Literal {
                value: 0,
                debug: DebugData::EMPTY,
            }),
            debug: DebugData::EMPTY,
        })]);
        assert!(matches!(
            resolve(&mut block, &dialect),
            Err(Error::UndefinedIdentifier(_))
        ));
    }

    #[test]
    fn test_break_outside_loop_rejected() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let mut block = Block::new(vec![Statement::Break(crate::ast::Break {
            debug: DebugData::EMPTY,
        })]);
        assert!(resolve(&mut block, &dialect).is_err());
    }

    #[test]
    fn test_block_ids_are_unique() {
        let dialect = Dialect::for_version(EvmVersion::Cancun, None);
        let inner = Block::new(vec![]);
        let mut block = Block::new(vec![Statement::Block(inner)]);
        resolve(&mut block, &dialect).unwrap();

        let Statement::Block(inner) = &block.statements[0] else {
            unreachable!()
        };
        assert_ne!(block.id, inner.id);
        assert_ne!(block.id, NodeId::UNASSIGNED);
        assert_ne!(inner.id, NodeId::UNASSIGNED);
    }
}
