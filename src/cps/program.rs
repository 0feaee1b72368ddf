use super::{
    ast::{DefinitionData, ExpressionKind, ValueKind},
    binders::{BinderRole, Occurrence, Occurrences, VarTable, Variable},
    id::{ContOccur, ContVar, Definition, Enclosing, Expression, Occur, Recursivity, Var},
};
use crate::{config::ProgramConfig, index::IndexVec, intern::InternedSymbol};

/// A CPS program. Owns every node, binder and occurrence; all other types are
/// handles into it.
///
/// Besides the tree itself the program keeps a few derived side tables (the
/// enclosing node of every node, the occurrence set of every variable and the
/// variable of every occurrence) which are maintained incrementally by the
/// build and change operations so that the queries below stay O(1).
#[derive(Debug, Default)]
pub struct Program {
    pub(super) expressions: IndexVec<Expression, ExpressionNode>,
    pub(super) definitions: IndexVec<Definition, DefinitionNode>,
    pub(super) vars: VarTable<Var, Occur>,
    pub(super) cont_vars: VarTable<ContVar, ContOccur>,
    pub(super) root: Option<Definition>,
    pub(super) config: ProgramConfig,
}

/// An expression coupled with the node it sits in. `enclosing` is unset while
/// the expression heads a subtree that has not been attached yet.
#[derive(Debug)]
pub(super) struct ExpressionNode {
    pub kind: ExpressionKind,
    pub enclosing: Option<Enclosing>,
}

/// A definition is always enclosed by the group expression binding it, except
/// for the root.
#[derive(Debug)]
pub(super) struct DefinitionNode {
    pub data: DefinitionData,
    pub enclosing: Option<Expression>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProgramConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> ProgramConfig {
        self.config
    }

    pub fn root(&self) -> Option<Definition> {
        self.root
    }

    /// The shape of an expression
    pub fn get(&self, expression: Expression) -> &ExpressionKind {
        &self.expressions[expression].kind
    }

    pub fn definition(&self, definition: Definition) -> &DefinitionData {
        &self.definitions[definition].data
    }

    /// The structural parent of a node. `None` for the root and for the head of
    /// a subtree that was built but not attached yet.
    pub fn enclosing(&self, node: impl Into<Enclosing>) -> Option<Enclosing> {
        match node.into() {
            Enclosing::Expression(expression) => self.expressions[expression].enclosing,
            Enclosing::Definition(definition) => self.definitions[definition]
                .enclosing
                .map(Enclosing::Expression),
        }
    }

    /// Iterates the enclosing chain of a node, innermost first
    pub fn ancestors(&self, node: impl Into<Enclosing>) -> Ancestors<'_> {
        let node = node.into();
        Ancestors {
            program: self,
            next: self.enclosing(node),
        }
    }

    /// True when the node is reachable from the program root
    pub fn is_attached(&self, node: impl Into<Enclosing>) -> bool {
        let node = node.into();
        let top = self.ancestors(node).last().unwrap_or(node);

        self.root.is_some_and(|root| top == Enclosing::Definition(root))
    }

    pub fn is_live_expression(&self, expression: Expression) -> bool {
        self.expressions.contains(expression)
    }

    pub fn is_live_definition(&self, definition: Definition) -> bool {
        self.definitions.contains(definition)
    }

    pub fn is_live_node(&self, node: Enclosing) -> bool {
        match node {
            Enclosing::Expression(expression) => self.is_live_expression(expression),
            Enclosing::Definition(definition) => self.is_live_definition(definition),
        }
    }

    pub fn is_live_var<V: Variable>(&self, var: V) -> bool {
        V::table(self).vars.contains(var)
    }

    pub fn is_live_occurrence<O: Occurrence>(&self, occurrence: O) -> bool {
        <O::Variable as Variable>::table(self).occurrences.contains(occurrence)
    }

    pub fn number_of_occurrences<V: Variable>(&self, var: V) -> Occurrences<V::Occurrence> {
        V::table(self).number_of_occurrences(var)
    }

    /// Folds over the occurrences of `var` in creation order
    pub fn fold_on_occurrences<V: Variable, A>(
        &self,
        var: V,
        init: A,
        f: impl FnMut(A, V::Occurrence) -> A,
    ) -> A {
        self.occurrences(var).fold(init, f)
    }

    /// The occurrences of `var` in creation order
    pub fn occurrences<V: Variable>(&self, var: V) -> impl Iterator<Item = V::Occurrence> + '_ {
        V::table(self).var(var).occurrences.iter().copied()
    }

    /// The node introducing `var`, `None` while it is still fresh
    pub fn binding_site<V: Variable>(&self, var: V) -> Option<Enclosing> {
        V::table(self).var(var).binding.map(|binding| binding.site)
    }

    pub fn binder_role<V: Variable>(&self, var: V) -> Option<BinderRole> {
        V::table(self).var(var).binding.map(|binding| binding.role)
    }

    pub fn binding_variable<O: Occurrence>(&self, occurrence: O) -> O::Variable {
        <O::Variable as Variable>::table(self).occurrence(occurrence).var
    }

    pub fn recursivity<O: Occurrence>(&self, occurrence: O) -> Recursivity {
        <O::Variable as Variable>::table(self).occurrence(occurrence).recursivity
    }

    /// The expression holding an occurrence
    pub fn holder<O: Occurrence>(&self, occurrence: O) -> Expression {
        <O::Variable as Variable>::table(self).occurrence(occurrence).holder
    }

    pub fn name<V: Variable>(&self, var: V) -> InternedSymbol {
        V::table(self).var(var).name
    }

    /// The kind of value held by a value variable
    pub fn kind(&self, var: Var) -> ValueKind {
        self.vars.var(var).kind
    }

    /// All live variables of one kind, in creation order
    pub fn variables<V: Variable>(&self) -> impl Iterator<Item = V> + '_ {
        V::table(self).vars.indices()
    }

    pub(super) fn live_expressions(&self) -> impl Iterator<Item = Expression> + '_ {
        self.expressions.indices()
    }

    pub(super) fn live_definitions(&self) -> impl Iterator<Item = Definition> + '_ {
        self.definitions.indices()
    }
}

pub struct Ancestors<'p> {
    program: &'p Program,
    next: Option<Enclosing>,
}

impl Iterator for Ancestors<'_> {
    type Item = Enclosing;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.program.enclosing(current);
        Some(current)
    }
}
