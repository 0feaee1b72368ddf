//! Structural descent over CPS trees.
//!
//! Every `visit_*` method defaults to the matching `walk_*` function, so a
//! visitor only overrides what it cares about and calls back into `walk_*` to
//! keep descending. The program is only borrowed immutably for the length of
//! a walk.
//!
//! Descent order is structural, not control flow order: for a definition its
//! binders then its body, for a binding group the group names, then each
//! definition, then the body, for a case the scrutinee, the branches in tag
//! order and finally the default.

use super::{
    Program,
    ast::{DefinitionKind, ExpressionKind, Tag, Value},
    id::{ContOccur, ContVar, Definition, Enclosing, Expression, Occur, Var},
};

pub trait Visitor: Sized {
    fn visit_definition(&mut self, program: &Program, definition: Definition) {
        walk_definition(self, program, definition)
    }

    fn visit_expression(&mut self, program: &Program, expression: Expression) {
        walk_expression(self, program, expression)
    }

    fn visit_value(&mut self, program: &Program, value: &Value, holder: Expression) {
        walk_value(self, program, value, holder)
    }

    /// `tag` is `None` for the default branch
    fn visit_case_branch(&mut self, program: &Program, _tag: Option<Tag>, branch: Expression) {
        self.visit_expression(program, branch)
    }

    fn visit_var_binder(&mut self, _program: &Program, _var: Var, _site: Enclosing) {}

    fn visit_cont_binder(&mut self, _program: &Program, _var: ContVar, _site: Enclosing) {}

    fn visit_occurrence(&mut self, _program: &Program, _occurrence: Occur, _holder: Expression) {}

    fn visit_cont_occurrence(
        &mut self,
        _program: &Program,
        _occurrence: ContOccur,
        _holder: Expression,
    ) {
    }
}

pub fn walk_program(visitor: &mut impl Visitor, program: &Program) {
    if let Some(root) = program.root() {
        visitor.visit_definition(program, root);
    }
}

/// Visits a node of either kind
pub fn walk_node(visitor: &mut impl Visitor, program: &Program, node: Enclosing) {
    match node {
        Enclosing::Expression(expression) => visitor.visit_expression(program, expression),
        Enclosing::Definition(definition) => visitor.visit_definition(program, definition),
    }
}

/// Visits the binders introduced by the definition itself (not its name,
/// which belongs to the enclosing group) and then its body
pub fn walk_definition(visitor: &mut impl Visitor, program: &Program, definition: Definition) {
    let data = program.definition(definition);
    let site = Enclosing::Definition(definition);

    if let Some(return_continuation) = data.return_continuation() {
        visitor.visit_cont_binder(program, return_continuation, site);
    }

    for parameter in &data.parameters {
        visitor.visit_var_binder(program, *parameter, site);
    }

    visitor.visit_expression(program, data.body);
}

pub fn walk_expression(visitor: &mut impl Visitor, program: &Program, expression: Expression) {
    let site = Enclosing::Expression(expression);

    match program.get(expression) {
        ExpressionKind::Let { var, value, body } => {
            visitor.visit_value(program, value, expression);
            visitor.visit_var_binder(program, *var, site);
            visitor.visit_expression(program, *body);
        }
        ExpressionKind::LetFunctions { definitions, body } => {
            for definition in definitions {
                if let DefinitionKind::Function { name, .. } = program.definition(*definition).kind
                {
                    visitor.visit_var_binder(program, name, site);
                }
            }

            for definition in definitions {
                visitor.visit_definition(program, *definition);
            }

            visitor.visit_expression(program, *body);
        }
        ExpressionKind::LetContinuations { definitions, body } => {
            for definition in definitions {
                if let DefinitionKind::Continuation { name } = program.definition(*definition).kind
                {
                    visitor.visit_cont_binder(program, name, site);
                }
            }

            for definition in definitions {
                visitor.visit_definition(program, *definition);
            }

            visitor.visit_expression(program, *body);
        }
        ExpressionKind::Primitive {
            arguments,
            continuation,
            ..
        } => {
            for argument in arguments {
                visitor.visit_occurrence(program, *argument, expression);
            }

            visitor.visit_cont_occurrence(program, *continuation, expression);
        }
        ExpressionKind::Apply {
            function,
            arguments,
            continuation,
        } => {
            visitor.visit_occurrence(program, *function, expression);

            for argument in arguments {
                visitor.visit_occurrence(program, *argument, expression);
            }

            visitor.visit_cont_occurrence(program, *continuation, expression);
        }
        ExpressionKind::Continue {
            continuation,
            arguments,
        } => {
            visitor.visit_cont_occurrence(program, *continuation, expression);

            for argument in arguments {
                visitor.visit_occurrence(program, *argument, expression);
            }
        }
        ExpressionKind::Case {
            scrutinee,
            branches,
            default,
        } => {
            visitor.visit_occurrence(program, *scrutinee, expression);

            for (tag, branch) in branches.iter() {
                visitor.visit_case_branch(program, Some(tag), branch);
            }

            if let Some(default) = default {
                visitor.visit_case_branch(program, None, *default);
            }
        }
        ExpressionKind::Unreachable => {}
    }
}

pub fn walk_value(visitor: &mut impl Visitor, program: &Program, value: &Value, holder: Expression) {
    match value {
        Value::Constant(_) => {}
        Value::Var(occurrence) => visitor.visit_occurrence(program, *occurrence, holder),
        Value::Block { fields, .. } => {
            for field in fields {
                visitor.visit_occurrence(program, *field, holder);
            }
        }
    }
}

/// Everything found below a node. Used to compute the footprint of subtrees
/// that are about to be moved or destroyed.
#[derive(Debug, Default)]
pub(super) struct Footprint {
    pub expressions: Vec<Expression>,
    pub definitions: Vec<Definition>,
    pub vars: Vec<Var>,
    pub cont_vars: Vec<ContVar>,
    pub occurrences: Vec<Occur>,
    pub cont_occurrences: Vec<ContOccur>,
    /// Subtree left out of the footprint
    skip: Option<Expression>,
}

impl Footprint {
    pub fn of(program: &Program, node: Enclosing, skip: Option<Expression>) -> Self {
        let mut footprint = Footprint {
            skip,
            ..Default::default()
        };
        walk_node(&mut footprint, program, node);
        footprint
    }
}

impl Visitor for Footprint {
    fn visit_definition(&mut self, program: &Program, definition: Definition) {
        self.definitions.push(definition);
        walk_definition(self, program, definition)
    }

    fn visit_expression(&mut self, program: &Program, expression: Expression) {
        if self.skip == Some(expression) {
            return;
        }

        self.expressions.push(expression);
        walk_expression(self, program, expression)
    }

    fn visit_var_binder(&mut self, _program: &Program, var: Var, _site: Enclosing) {
        self.vars.push(var);
    }

    fn visit_cont_binder(&mut self, _program: &Program, var: ContVar, _site: Enclosing) {
        self.cont_vars.push(var);
    }

    fn visit_occurrence(&mut self, _program: &Program, occurrence: Occur, _holder: Expression) {
        self.occurrences.push(occurrence);
    }

    fn visit_cont_occurrence(
        &mut self,
        _program: &Program,
        occurrence: ContOccur,
        _holder: Expression,
    ) {
        self.cont_occurrences.push(occurrence);
    }
}
