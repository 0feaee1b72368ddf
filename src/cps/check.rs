//! Whole-program consistency checker.
//!
//! The checker re-derives everything the side tables are supposed to hold by
//! walking the tree top-down with its own scope environment, and compares.
//! It shares no logic with the scope resolution used by build and change, so
//! a bug there shows up here as a violation instead of being agreed with.
//!
//! The walk never stops early: every violation found is reported.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::debug;
use thiserror::Error;

use super::{
    Program,
    ast::{DefinitionKind, ExpressionKind, Tag, Value},
    binders::{Occurrence, Variable},
    error::CaseError,
    id::{
        AnyOccur, AnyVar, ContOccur, ContVar, Definition, Enclosing, Expression, Occur,
        Recursivity, Var,
    },
    visit::{Visitor, walk_definition, walk_expression},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("{node} records {found:?} as its enclosing node but sits under {expected:?}")]
    WrongEnclosing {
        node: Enclosing,
        expected: Option<Enclosing>,
        found: Option<Enclosing>,
    },

    #[error("{0} is reachable more than once")]
    SharedNode(Enclosing),

    #[error("{node} is referenced by {parent} but does not exist")]
    DanglingNode { node: Enclosing, parent: Enclosing },

    #[error("{occurrence} is held by {holder} but does not exist or has no variable")]
    DanglingOccurrence {
        occurrence: AnyOccur,
        holder: Expression,
    },

    #[error("{0} is held more than once")]
    SharedOccurrence(AnyOccur),

    #[error("{variable} is bound at {site} but does not exist")]
    DanglingVariable { variable: AnyVar, site: Enclosing },

    #[error("{0} is bound more than once")]
    BoundTwice(AnyVar),

    #[error("{variable} is bound at {expected} but records {found:?}")]
    WrongBindingSite {
        variable: AnyVar,
        expected: Enclosing,
        found: Option<Enclosing>,
    },

    #[error("{occurrence} of {variable} is out of scope")]
    OutOfScope {
        occurrence: AnyOccur,
        variable: AnyVar,
    },

    #[error("{occurrence} of {variable} crosses a function boundary")]
    EscapingContinuation {
        occurrence: AnyOccur,
        variable: AnyVar,
    },

    #[error("{occurrence} is tagged {found} but should be {expected}")]
    WrongRecursivity {
        occurrence: AnyOccur,
        expected: Recursivity,
        found: Recursivity,
    },

    #[error("{occurrence} is held by {expected} but records {found}")]
    WrongHolder {
        occurrence: AnyOccur,
        expected: Expression,
        found: Expression,
    },

    #[error("{occurrence} refers to {variable} but is missing from its occurrence set")]
    UnregisteredOccurrence {
        occurrence: AnyOccur,
        variable: AnyVar,
    },

    #[error("the occurrence set of {variable} lists {occurrence}, which is not one of its uses")]
    StaleOccurrenceEntry {
        variable: AnyVar,
        occurrence: AnyOccur,
    },

    #[error("tags of {0} are not in ascending order")]
    UnorderedTags(Expression),

    #[error("{case} is malformed: {error}")]
    MalformedCase { case: Expression, error: CaseError },

    #[error("{variable} bound at {binding} cannot hold the value bound to it")]
    IncompatibleValue { binding: Expression, variable: Var },

    #[error("{definition} does not belong in {group}")]
    MisplacedDefinition {
        definition: Definition,
        group: Expression,
    },

    #[error("parameters of {0} disagree with its definition type")]
    DefinitionTypeMismatch(Definition),

    #[error("{0} is live but unreachable from the root")]
    UnreachableNode(Enclosing),

    #[error("{0} is bound or used but unreachable from the root")]
    UnreachableVariable(AnyVar),

    #[error("{0} is live but unreachable from the root")]
    UnreachableOccurrence(AnyOccur),
}

/// Returned by [`Program::check`], lists every violation found
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} violation(s) found:\n{}", .0.len(), .0.iter().join("\n"))]
pub struct CheckFailed(pub Vec<Violation>);

impl Program {
    pub fn check(&self) -> Result<(), CheckFailed> {
        let violations = check_program(self);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CheckFailed(violations))
        }
    }
}

pub fn check_program(program: &Program) -> Vec<Violation> {
    let mut checker = Checker::default();

    if let Some(root) = program.root() {
        checker.visit_definition(program, root);
    }

    checker.check_leftovers(program);

    debug!(
        "checked {} expression(s), {} definition(s): {} violation(s)",
        checker.expressions.len(),
        checker.definitions.len(),
        checker.violations.len()
    );

    checker.violations
}

/// What the checker knows about a binder currently in scope
#[derive(Debug, Clone, Copy)]
struct InScope {
    /// The group expression, for names bound by a binding group
    group: Option<Expression>,
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,

    parents: Vec<Enclosing>,
    /// Binders introduced by each node on the parent stack
    frames: Vec<Vec<AnyVar>>,

    vars: HashMap<Var, InScope>,
    conts: HashMap<ContVar, InScope>,
    /// Continuation environments hidden by the function definitions being
    /// walked, outermost first
    hidden_conts: Vec<HashMap<ContVar, InScope>>,
    /// Groups whose definitions are being walked
    open_groups: HashSet<Expression>,

    expressions: HashSet<Expression>,
    definitions: HashSet<Definition>,
    bound_vars: HashSet<Var>,
    bound_conts: HashSet<ContVar>,
    occurrences: HashMap<Occur, Expression>,
    cont_occurrences: HashMap<ContOccur, Expression>,
}

impl Checker {
    /// Registers a node on first sight and checks its enclosing link. Returns
    /// false when the node should not be descended into.
    fn enter(&mut self, program: &Program, node: Enclosing) -> bool {
        let parent = self.parents.last().copied();

        if !program.is_live_node(node) {
            if let Some(parent) = parent {
                self.violations
                    .push(Violation::DanglingNode { node, parent });
            }
            return false;
        }

        let first = match node {
            Enclosing::Expression(expression) => self.expressions.insert(expression),
            Enclosing::Definition(definition) => self.definitions.insert(definition),
        };
        if !first {
            self.violations.push(Violation::SharedNode(node));
            return false;
        }

        let found = program.enclosing(node);
        if found != parent {
            self.violations.push(Violation::WrongEnclosing {
                node,
                expected: parent,
                found,
            });
        }

        self.parents.push(node);
        self.frames.push(Vec::new());

        true
    }

    fn leave(&mut self) {
        self.parents.pop();

        for binder in self.frames.pop().unwrap_or_default() {
            match binder {
                AnyVar::Var(var) => self.vars.remove(&var),
                AnyVar::Cont(var) => self.conts.remove(&var),
            };
        }
    }

    /// The group a name bound at `site` belongs to, if any
    fn group_of(program: &Program, site: Enclosing) -> Option<Expression> {
        match site {
            Enclosing::Expression(expression) => match program.get(expression) {
                ExpressionKind::LetFunctions { .. } | ExpressionKind::LetContinuations { .. } => {
                    Some(expression)
                }
                _ => None,
            },
            Enclosing::Definition(_) => None,
        }
    }

    fn check_binder<V: Variable>(&mut self, program: &Program, var: V, site: Enclosing) -> bool {
        if !program.is_live_var(var) {
            self.violations.push(Violation::DanglingVariable {
                variable: var.any(),
                site,
            });
            return false;
        }

        let found = program.binding_site(var);
        if found != Some(site) {
            self.violations.push(Violation::WrongBindingSite {
                variable: var.any(),
                expected: site,
                found,
            });
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.push(var.any());
        }

        true
    }

    /// Checks the links of an occurrence, returning its variable when it can
    /// be looked up
    fn check_occurrence<O: Occurrence>(
        &mut self,
        program: &Program,
        occurrence: O,
        holder: Expression,
    ) -> Option<O::Variable> {
        if !program.is_live_occurrence(occurrence) {
            self.violations.push(Violation::DanglingOccurrence {
                occurrence: occurrence.any(),
                holder,
            });
            return None;
        }

        let variable = program.binding_variable(occurrence);
        if !program.is_live_var(variable) {
            self.violations.push(Violation::DanglingOccurrence {
                occurrence: occurrence.any(),
                holder,
            });
            return None;
        }

        let found = program.holder(occurrence);
        if found != holder {
            self.violations.push(Violation::WrongHolder {
                occurrence: occurrence.any(),
                expected: holder,
                found,
            });
        }

        if !program.occurrences(variable).any(|o| o == occurrence) {
            self.violations.push(Violation::UnregisteredOccurrence {
                occurrence: occurrence.any(),
                variable: variable.any(),
            });
        }

        Some(variable)
    }

    fn check_recursivity<O: Occurrence>(
        &mut self,
        program: &Program,
        occurrence: O,
        scope: InScope,
    ) {
        let expected = match scope.group {
            Some(group) if self.open_groups.contains(&group) => Recursivity::Recursive,
            _ => Recursivity::NonRecursive,
        };

        let found = program.recursivity(occurrence);
        if found != expected {
            self.violations.push(Violation::WrongRecursivity {
                occurrence: occurrence.any(),
                expected,
                found,
            });
        }
    }

    fn check_case(&mut self, program: &Program, case: Expression) {
        let ExpressionKind::Case {
            scrutinee,
            branches,
            default,
        } = program.get(case)
        else {
            return;
        };

        let tags = branches.tags().collect::<Vec<Tag>>();

        if let Some(pair) = tags.windows(2).find(|pair| pair[0] >= pair[1]) {
            if pair[0] == pair[1] {
                self.violations.push(Violation::MalformedCase {
                    case,
                    error: CaseError::DuplicateTag { tag: pair[0] },
                });
            } else {
                self.violations.push(Violation::UnorderedTags(case));
            }
            return;
        }

        if !program.is_live_occurrence(*scrutinee) {
            return;
        }

        let variable = program.binding_variable(*scrutinee);
        if !program.is_live_var(variable) {
            return;
        }

        if let Err(error) = branches.validate(program.kind(variable), default.is_some()) {
            self.violations
                .push(Violation::MalformedCase { case, error });
        }
    }

    fn check_let(&mut self, program: &Program, binding: Expression) {
        let ExpressionKind::Let { var, value, .. } = program.get(binding) else {
            return;
        };

        if !program.is_live_var(*var) {
            return;
        }

        let kind = program.kind(*var);
        let admitted = match value {
            Value::Constant(constant) => kind.admits_constant(constant),
            Value::Block { tag, .. } => kind.admits_block(*tag),
            Value::Var(occurrence) => {
                !program.is_live_occurrence(*occurrence) || {
                    let source = program.binding_variable(*occurrence);
                    !program.is_live_var(source) || kind.admits_var(program.kind(source))
                }
            }
        };

        if !admitted {
            self.violations.push(Violation::IncompatibleValue {
                binding,
                variable: *var,
            });
        }
    }

    fn check_group(&mut self, program: &Program, group: Expression) {
        let (definitions, functions) = match program.get(group) {
            ExpressionKind::LetFunctions { definitions, .. } => (definitions, true),
            ExpressionKind::LetContinuations { definitions, .. } => (definitions, false),
            _ => return,
        };

        for definition in definitions {
            if !program.is_live_definition(*definition) {
                continue;
            }

            let fits = match program.definition(*definition).kind {
                DefinitionKind::Function { .. } => functions,
                DefinitionKind::Continuation { .. } => !functions,
                DefinitionKind::Root { .. } => false,
            };

            if !fits {
                self.violations.push(Violation::MisplacedDefinition {
                    definition: *definition,
                    group,
                });
            }
        }
    }

    fn check_definition_type(&mut self, program: &Program, definition: Definition) {
        let data = program.definition(definition);
        let expected = data.definition_type.parameters();

        let matches = data.parameters.len() == expected.len()
            && data
                .parameters
                .iter()
                .zip(expected)
                .all(|(parameter, kind)| {
                    !program.is_live_var(*parameter) || program.kind(*parameter) == *kind
                });

        if !matches {
            self.violations
                .push(Violation::DefinitionTypeMismatch(definition));
        }
    }

    /// Looks for live entities the walk never reached and for occurrence sets
    /// listing something other than the uses of their variable
    fn check_leftovers(&mut self, program: &Program) {
        for expression in program.live_expressions() {
            if !self.expressions.contains(&expression) {
                self.violations
                    .push(Violation::UnreachableNode(expression.into()));
            }
        }

        for definition in program.live_definitions() {
            if !self.definitions.contains(&definition) {
                self.violations
                    .push(Violation::UnreachableNode(definition.into()));
            }
        }

        for var in program.variables::<Var>() {
            self.check_variable_leftovers(program, var, |checker, var| {
                checker.bound_vars.contains(&var)
            });
        }

        for var in program.variables::<ContVar>() {
            self.check_variable_leftovers(program, var, |checker, var| {
                checker.bound_conts.contains(&var)
            });
        }

        for occurrence in program.vars.occurrences.indices() {
            if !self.occurrences.contains_key(&occurrence) {
                self.violations
                    .push(Violation::UnreachableOccurrence(occurrence.any()));
            }
        }

        for occurrence in program.cont_vars.occurrences.indices() {
            if !self.cont_occurrences.contains_key(&occurrence) {
                self.violations
                    .push(Violation::UnreachableOccurrence(occurrence.any()));
            }
        }
    }

    fn check_variable_leftovers<V: Variable>(
        &mut self,
        program: &Program,
        var: V,
        bound: impl Fn(&Self, V) -> bool,
    ) {
        let used = program.occurrences(var).next().is_some();

        // Fresh variables nobody refers to are harmless
        if !bound(self, var) && (used || program.binding_site(var).is_some()) {
            self.violations.push(Violation::UnreachableVariable(var.any()));
        }

        for occurrence in program.occurrences(var) {
            let belongs = program.is_live_occurrence(occurrence)
                && program.binding_variable(occurrence) == var;

            if !belongs {
                self.violations.push(Violation::StaleOccurrenceEntry {
                    variable: var.any(),
                    occurrence: occurrence.any(),
                });
            }
        }
    }
}

impl Visitor for Checker {
    fn visit_definition(&mut self, program: &Program, definition: Definition) {
        let group = match self.parents.last() {
            Some(Enclosing::Expression(group)) => Some(*group),
            _ => None,
        };

        if !self.enter(program, definition.into()) {
            return;
        }

        self.check_definition_type(program, definition);

        let boundary = program.definition(definition).is_function_boundary();
        if boundary {
            self.hidden_conts.push(std::mem::take(&mut self.conts));
        }

        if let Some(group) = group {
            self.open_groups.insert(group);
        }

        walk_definition(self, program, definition);

        if let Some(group) = group {
            self.open_groups.remove(&group);
        }

        self.leave();

        if boundary {
            self.conts = self.hidden_conts.pop().unwrap_or_default();
        }
    }

    fn visit_expression(&mut self, program: &Program, expression: Expression) {
        if !self.enter(program, expression.into()) {
            return;
        }

        match program.get(expression) {
            ExpressionKind::Let { .. } => self.check_let(program, expression),
            ExpressionKind::Case { .. } => self.check_case(program, expression),
            ExpressionKind::LetFunctions { .. } | ExpressionKind::LetContinuations { .. } => {
                self.check_group(program, expression)
            }
            _ => {}
        }

        walk_expression(self, program, expression);

        self.leave();
    }

    fn visit_var_binder(&mut self, program: &Program, var: Var, site: Enclosing) {
        if !self.bound_vars.insert(var) {
            self.violations.push(Violation::BoundTwice(var.any()));
        }

        if self.check_binder(program, var, site) {
            let group = Self::group_of(program, site);
            self.vars.insert(var, InScope { group });
        }
    }

    fn visit_cont_binder(&mut self, program: &Program, var: ContVar, site: Enclosing) {
        if !self.bound_conts.insert(var) {
            self.violations.push(Violation::BoundTwice(var.any()));
        }

        if self.check_binder(program, var, site) {
            let group = Self::group_of(program, site);
            self.conts.insert(var, InScope { group });
        }
    }

    fn visit_occurrence(&mut self, program: &Program, occurrence: Occur, holder: Expression) {
        if self.occurrences.insert(occurrence, holder).is_some() {
            self.violations
                .push(Violation::SharedOccurrence(occurrence.any()));
            return;
        }

        let Some(variable) = self.check_occurrence(program, occurrence, holder) else {
            return;
        };

        match self.vars.get(&variable) {
            Some(scope) => {
                let scope = *scope;
                self.check_recursivity(program, occurrence, scope);
            }
            None => self.violations.push(Violation::OutOfScope {
                occurrence: occurrence.any(),
                variable: variable.any(),
            }),
        }
    }

    fn visit_cont_occurrence(
        &mut self,
        program: &Program,
        occurrence: ContOccur,
        holder: Expression,
    ) {
        if self.cont_occurrences.insert(occurrence, holder).is_some() {
            self.violations
                .push(Violation::SharedOccurrence(occurrence.any()));
            return;
        }

        let Some(variable) = self.check_occurrence(program, occurrence, holder) else {
            return;
        };

        match self.conts.get(&variable) {
            Some(scope) => {
                let scope = *scope;
                self.check_recursivity(program, occurrence, scope);
            }
            None if self.hidden_conts.iter().any(|env| env.contains_key(&variable)) => {
                self.violations.push(Violation::EscapingContinuation {
                    occurrence: occurrence.any(),
                    variable: variable.any(),
                })
            }
            None => self.violations.push(Violation::OutOfScope {
                occurrence: occurrence.any(),
                variable: variable.any(),
            }),
        }
    }
}
