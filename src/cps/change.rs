//! In-place rewrites used by optimization passes.
//!
//! Every operation here is a transaction: all of its preconditions are checked
//! against the current program first, and only then is the program mutated.
//! A rejected rewrite returns a [`ChangeError`] and leaves the program exactly
//! as it was. A successful one leaves every side table (enclosing nodes,
//! occurrence sets, recursivity tags) consistent with the new tree.

use std::collections::BTreeSet;

use log::trace;

use super::{
    Program,
    ast::{DefinitionKind, ExpressionKind, Tag, Value, Visibility},
    binders::{Occurrence, Variable},
    error::ChangeError,
    id::{
        AnyOccur, AnyVar, ContOccurSet, Definition, Enclosing, Expression, OccurSet, Recursivity,
    },
    scope::Graft,
    visit::Footprint,
};

impl Program {
    /// Points `occurrence` at `to` instead of its current variable. `to` must
    /// be in scope at the occurrence; its recursivity is recomputed for the
    /// new variable.
    pub fn substitute<O: Occurrence>(
        &mut self,
        occurrence: O,
        to: O::Variable,
    ) -> Result<(), ChangeError> {
        let recursivity = self.check_substitution(occurrence, to)?;

        trace!(
            "substituting {to} for {} at {occurrence}",
            self.binding_variable(occurrence)
        );

        <O::Variable as Variable>::table_mut(self).repoint(occurrence, to, recursivity);
        self.verify_after_change("substitute");

        Ok(())
    }

    /// Points every occurrence of `from` at `to`, returning how many were
    /// moved. Either all of them move or none does.
    pub fn substitute_all<V: Variable>(&mut self, from: V, to: V) -> Result<usize, ChangeError> {
        if !self.is_live_var(from) {
            return Err(ChangeError::UnknownVariable(from.any()));
        }

        if from == to {
            return Ok(0);
        }

        let moves = self
            .occurrences(from)
            .map(|occurrence| {
                self.check_substitution(occurrence, to)
                    .map(|recursivity| (occurrence, recursivity))
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!("substituting {to} for {from} at {} occurrence(s)", moves.len());

        for (occurrence, recursivity) in &moves {
            V::table_mut(self).repoint(*occurrence, to, *recursivity);
        }
        self.verify_after_change("substitute_all");

        Ok(moves.len())
    }

    /// Splices `replacement` in the place of `target` and destroys what is
    /// left of `target`.
    ///
    /// `replacement` is either a pending subtree or a strict descendant of
    /// `target` (typically a body or a branch being promoted). Occurrences in
    /// `replacement` are resolved from their new position and retagged; the
    /// rewrite is rejected if any of them would fall out of scope or if a
    /// binder in the destroyed region is still used from outside of it.
    pub fn replace(
        &mut self,
        target: Expression,
        replacement: Expression,
    ) -> Result<(), ChangeError> {
        for node in [target, replacement] {
            if !self.is_live_expression(node) {
                return Err(ChangeError::UnknownNode(node.into()));
            }
        }

        if !self.is_attached(target) {
            return Err(ChangeError::Detached(target.into()));
        }

        let pending = self.enclosing(replacement).is_none();
        let descendant = self
            .ancestors(replacement)
            .any(|ancestor| ancestor == Enclosing::Expression(target));

        if target == replacement || !(pending || descendant) {
            return Err(ChangeError::InvalidReplacement {
                target,
                replacement,
            });
        }

        let parent = self
            .enclosing(target)
            .ok_or(ChangeError::Detached(target.into()))?;

        let graft = Graft {
            root: replacement,
            parent: Some(parent),
        };
        let resolution = self.resolve_subtree(replacement.into(), Some(graft))?;

        let region = Footprint::of(self, target.into(), Some(replacement));
        self.check_self_contained(&region, &Inside::of(&region))?;

        trace!("replacing {target} with {replacement} under {parent}");

        match parent {
            Enclosing::Expression(parent) => {
                let replaced = self.expressions[parent]
                    .kind
                    .replace_child(target, replacement);
                debug_assert!(replaced, "{target} is not a child of {parent}");
            }
            Enclosing::Definition(parent) => {
                self.definitions[parent].data.body = replacement;
            }
        }
        self.expressions[replacement].enclosing = Some(parent);

        for (occurrence, recursivity) in resolution.occurrences {
            self.vars.retag(occurrence, recursivity);
        }
        for (occurrence, recursivity) in resolution.cont_occurrences {
            self.cont_vars.retag(occurrence, recursivity);
        }

        self.destroy(region);
        self.verify_after_change("replace");

        Ok(())
    }

    /// Removes a `let` whose variable is never used, its body takes its place.
    /// Returns the body.
    pub fn remove_dead_let(&mut self, expression: Expression) -> Result<Expression, ChangeError> {
        if !self.is_live_expression(expression) {
            return Err(ChangeError::UnknownNode(expression.into()));
        }

        let ExpressionKind::Let { var, body, .. } = *self.get(expression) else {
            return Err(ChangeError::UnexpectedShape {
                expression,
                expected: "let",
            });
        };

        let occurrences = self.occurrences(var).count();
        if occurrences > 0 {
            return Err(ChangeError::BinderStillUsed {
                variable: var.any(),
                occurrences,
            });
        }

        self.replace(expression, body)?;

        Ok(body)
    }

    /// Removes a private function or a continuation whose name is not used
    /// outside of its own body. A group left without definitions is replaced
    /// by its body.
    pub fn remove_dead_definition(&mut self, definition: Definition) -> Result<(), ChangeError> {
        if !self.is_live_definition(definition) {
            return Err(ChangeError::UnknownNode(definition.into()));
        }

        let name = match self.definition(definition).kind {
            DefinitionKind::Root { .. } => return Err(ChangeError::IsRoot(definition)),
            DefinitionKind::Function {
                visibility: Visibility::Public,
                ..
            } => return Err(ChangeError::PublicDefinition(definition)),
            DefinitionKind::Function { name, .. } => name.any(),
            DefinitionKind::Continuation { name } => name.any(),
        };

        if !self.is_attached(definition) {
            return Err(ChangeError::Detached(definition.into()));
        }

        let group = self.definitions[definition]
            .enclosing
            .ok_or(ChangeError::Detached(definition.into()))?;

        let region = Footprint::of(self, definition.into(), None);
        let inside = Inside::of(&region);
        self.check_self_contained(&region, &inside)?;

        let outside = match name {
            AnyVar::Var(name) => count_outside(self.occurrences(name), &inside.occurrences),
            AnyVar::Cont(name) => count_outside(self.occurrences(name), &inside.cont_occurrences),
        };
        if outside > 0 {
            return Err(ChangeError::BinderStillUsed {
                variable: name,
                occurrences: outside,
            });
        }

        let (siblings, body) = match self.get(group) {
            ExpressionKind::LetFunctions { definitions, body }
            | ExpressionKind::LetContinuations { definitions, body } => (definitions.len(), *body),
            _ => {
                return Err(ChangeError::UnexpectedShape {
                    expression: group,
                    expected: "binding group",
                });
            }
        };

        if siblings == 1 {
            return self.replace(group, body);
        }

        trace!("removing dead {definition} ({name}) from {group}");

        if let ExpressionKind::LetFunctions { definitions, .. }
        | ExpressionKind::LetContinuations { definitions, .. } =
            &mut self.expressions[group].kind
        {
            definitions.retain(|d| *d != definition);
        }

        self.destroy(region);
        match name {
            AnyVar::Var(name) => self.vars.free(name),
            AnyVar::Cont(name) => self.cont_vars.free(name),
        }
        self.verify_after_change("remove_dead_definition");

        Ok(())
    }

    /// Replaces a case by the branch taken for `tag`, falling back to the
    /// default branch. Returns the selected branch.
    pub fn select_case_branch(
        &mut self,
        case: Expression,
        tag: Tag,
    ) -> Result<Expression, ChangeError> {
        if !self.is_live_expression(case) {
            return Err(ChangeError::UnknownNode(case.into()));
        }

        let ExpressionKind::Case {
            branches, default, ..
        } = self.get(case)
        else {
            return Err(ChangeError::UnexpectedShape {
                expression: case,
                expected: "case",
            });
        };

        let branch = branches
            .get(tag)
            .or(*default)
            .ok_or(ChangeError::NoSuchBranch { case, tag })?;

        self.replace(case, branch)?;

        Ok(branch)
    }

    /// Destroys a pending subtree that will never be attached. Names of
    /// pending definitions stay fresh and can be reused.
    pub fn discard(&mut self, pending: impl Into<Enclosing>) -> Result<(), ChangeError> {
        let pending = pending.into();

        if !self.is_live_node(pending) {
            return Err(ChangeError::UnknownNode(pending));
        }

        if self.enclosing(pending).is_some() || self.root.map(Enclosing::Definition) == Some(pending)
        {
            return Err(ChangeError::NotPending(pending));
        }

        let region = Footprint::of(self, pending, None);
        self.check_self_contained(&region, &Inside::of(&region))?;

        trace!("discarding pending {pending}");

        self.destroy(region);
        self.verify_after_change("discard");

        Ok(())
    }

    /// Validates moving `occurrence` over to `to`, returning the recursivity
    /// it will carry
    fn check_substitution<O: Occurrence>(
        &self,
        occurrence: O,
        to: O::Variable,
    ) -> Result<Recursivity, ChangeError> {
        if !self.is_live_occurrence(occurrence) {
            return Err(ChangeError::UnknownOccurrence(occurrence.any()));
        }

        if !self.is_live_var(to) {
            return Err(ChangeError::UnknownVariable(to.any()));
        }

        let holder = self.holder(occurrence);
        if !self.is_attached(holder) {
            return Err(ChangeError::Detached(holder.into()));
        }

        let recursivity = self.resolve(to, holder, None)?;

        if let (AnyOccur::Occur(occurrence), AnyVar::Var(to)) = (occurrence.any(), to.any()) {
            match self.get(holder) {
                ExpressionKind::Case {
                    scrutinee,
                    branches,
                    default,
                } if *scrutinee == occurrence => {
                    branches.validate(self.kind(to), default.is_some())?;
                }
                ExpressionKind::Let {
                    var,
                    value: Value::Var(aliased),
                    ..
                } if *aliased == occurrence => {
                    let kind = self.kind(*var);
                    let found = self.kind(to);

                    if !kind.admits_var(found) {
                        return Err(ChangeError::IncompatibleValue {
                            variable: *var,
                            kind,
                            found,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(recursivity)
    }

    /// Binders of a region that is about to be destroyed may only be used
    /// inside of that region
    fn check_self_contained(
        &self,
        region: &Footprint,
        inside: &Inside,
    ) -> Result<(), ChangeError> {
        for var in &region.vars {
            let outside = count_outside(self.occurrences(*var), &inside.occurrences);
            if outside > 0 {
                return Err(ChangeError::BinderStillUsed {
                    variable: var.any(),
                    occurrences: outside,
                });
            }
        }

        for var in &region.cont_vars {
            let outside = count_outside(self.occurrences(*var), &inside.cont_occurrences);
            if outside > 0 {
                return Err(ChangeError::BinderStillUsed {
                    variable: var.any(),
                    occurrences: outside,
                });
            }
        }

        Ok(())
    }

    /// Unregisters every occurrence of the region, then frees its binders and
    /// nodes
    fn destroy(&mut self, region: Footprint) {
        for occurrence in region.occurrences {
            self.vars.unregister(occurrence);
        }
        for occurrence in region.cont_occurrences {
            self.cont_vars.unregister(occurrence);
        }

        for var in region.vars {
            self.vars.free(var);
        }
        for var in region.cont_vars {
            self.cont_vars.free(var);
        }

        for expression in region.expressions {
            self.expressions.remove(expression);
        }
        for definition in region.definitions {
            self.definitions.remove(definition);
        }
    }

    fn verify_after_change(&self, operation: &str) {
        if !self.config.verify_changes {
            return;
        }

        if let Err(failure) = self.check() {
            panic!("{operation} left the program malformed: {failure}");
        }
    }
}

/// The occurrences of a region, for membership tests
struct Inside {
    occurrences: OccurSet,
    cont_occurrences: ContOccurSet,
}

impl Inside {
    fn of(region: &Footprint) -> Self {
        Self {
            occurrences: region.occurrences.iter().copied().collect(),
            cont_occurrences: region.cont_occurrences.iter().copied().collect(),
        }
    }
}

fn count_outside<O: Ord>(occurrences: impl Iterator<Item = O>, inside: &BTreeSet<O>) -> usize {
    occurrences.filter(|o| !inside.contains(o)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProgramConfig,
        cps::{
            ast::{Constant, FunctionType, ValueKind},
            binders::Occurrences,
            build::ValueSpec,
            error::{CaseError, ScopeError},
            id::{ContOccur, ContVar, Occur, Var},
            primitive::Primitive,
        },
    };

    fn nullary() -> FunctionType {
        FunctionType::new(vec![], ValueKind::Any)
    }

    /// `root(x, y) -> k { add(x, x) -> k }`
    fn doubled() -> (Program, Expression) {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let x = b.fresh_var("x", ValueKind::Int);
        let y = b.fresh_var("y", ValueKind::Int);

        let add = b
            .primitive(
                Primitive::Add,
                vec![Occur::maker(x), Occur::maker(x)],
                ContOccur::maker(k),
            )
            .unwrap();
        let root = b
            .root(
                k,
                vec![x, y],
                FunctionType::new(vec![ValueKind::Int; 2], ValueKind::Int),
                add,
            )
            .unwrap();
        b.finish(root).unwrap();

        (program, add)
    }

    fn operands(program: &Program, expression: Expression) -> Vec<Occur> {
        program.get(expression).occurrences()
    }

    #[test]
    fn substitute_moves_a_single_occurrence() {
        let (mut program, add) = doubled();
        let [first, second] = operands(&program, add)[..] else {
            panic!("expected two operands");
        };
        let x = program.binding_variable(first);
        let y = program
            .variables::<Var>()
            .find(|v| program.name(*v).value() == "y")
            .unwrap();

        program.substitute(second, y).unwrap();

        assert_eq!(program.number_of_occurrences(x), Occurrences::OneOccurrence(first));
        assert_eq!(program.number_of_occurrences(y), Occurrences::OneOccurrence(second));
        assert_eq!(program.binding_variable(second), y);
        assert!(program.check().is_ok());
    }

    #[test]
    fn substitute_all_moves_every_occurrence() {
        let (mut program, add) = doubled();
        let x = program.binding_variable(operands(&program, add)[0]);
        let y = program
            .variables::<Var>()
            .find(|v| *v != x)
            .unwrap();

        assert_eq!(program.substitute_all(x, y), Ok(2));
        assert_eq!(program.number_of_occurrences(x), Occurrences::NoOccurrence);
        assert_eq!(program.number_of_occurrences(y), Occurrences::SeveralOccurrences);
        assert_eq!(program.fold_on_occurrences(y, 0, |n, _| n + 1), 2);
    }

    #[test]
    fn substitute_rejects_a_variable_out_of_scope() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let j = b.fresh_cont_var("j");
        let x = b.fresh_var("x", ValueKind::Int);
        let a = b.fresh_var("a", ValueKind::Int);

        let forward = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(a)])
            .unwrap();
        let join = b.continuation(j, vec![a], forward).unwrap();
        let jump = b
            .continue_(ContOccur::maker(j), vec![Occur::maker(x)])
            .unwrap();
        let group = b.let_continuations(vec![join], jump).unwrap();
        let root = b
            .root(
                k,
                vec![x],
                FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
                group,
            )
            .unwrap();
        b.finish(root).unwrap();

        let use_of_x = operands(&program, jump)[0];

        assert_eq!(
            program.substitute(use_of_x, a),
            Err(ChangeError::Scope(ScopeError::OutOfScope {
                variable: a.any(),
                at: jump
            }))
        );
        assert_eq!(program.binding_variable(use_of_x), x);
        let forward_use = operands(&program, forward)[0];
        assert_eq!(
            program.number_of_occurrences(a),
            Occurrences::OneOccurrence(forward_use)
        );
    }

    #[test]
    fn substitute_all_is_all_or_nothing() {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let j = b.fresh_cont_var("j");
        let x = b.fresh_var("x", ValueKind::Int);
        let a = b.fresh_var("a", ValueKind::Int);

        // `a` is in scope for the use of `x` inside `j` but not for the jump
        let inside = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(x)])
            .unwrap();
        let join = b.continuation(j, vec![a], inside).unwrap();
        let jump = b
            .continue_(ContOccur::maker(j), vec![Occur::maker(x)])
            .unwrap();
        let group = b.let_continuations(vec![join], jump).unwrap();
        let root = b
            .root(
                k,
                vec![x],
                FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
                group,
            )
            .unwrap();
        b.finish(root).unwrap();

        let before = program.occurrences(x).collect::<Vec<_>>();

        assert_eq!(
            program.substitute_all(x, a),
            Err(ChangeError::Scope(ScopeError::OutOfScope {
                variable: a.any(),
                at: jump
            }))
        );
        assert_eq!(program.occurrences(x).collect::<Vec<_>>(), before);
        assert_eq!(program.number_of_occurrences(a), Occurrences::NoOccurrence);
        assert!(
            before
                .iter()
                .all(|o| program.binding_variable(*o) == x)
        );
        assert!(program.check().is_ok());
    }

    #[test]
    fn substituting_an_alias_keeps_the_binder_kind() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let x = b.fresh_var("x", ValueKind::Int);
        let flag = b.fresh_var("flag", ValueKind::Bool);
        let y = b.fresh_var("y", ValueKind::Int);

        let jump = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(y)])
            .unwrap();
        let alias = b.let_(y, ValueSpec::Var(Occur::maker(x)), jump).unwrap();
        let root = b
            .root(
                k,
                vec![x, flag],
                FunctionType::new(vec![ValueKind::Int, ValueKind::Bool], ValueKind::Int),
                alias,
            )
            .unwrap();
        b.finish(root).unwrap();

        let aliased = operands(&program, alias)[0];

        assert_eq!(
            program.substitute(aliased, flag),
            Err(ChangeError::IncompatibleValue {
                variable: y,
                kind: ValueKind::Int,
                found: ValueKind::Bool
            })
        );
        assert_eq!(program.binding_variable(aliased), x);
        assert!(program.check().is_ok());
    }

    #[test]
    fn substituting_a_scrutinee_revalidates_the_case() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let t = b.fresh_var("t", ValueKind::Tagged { constructors: 2 });
        let u = b.fresh_var("u", ValueKind::Tagged { constructors: 3 });

        let (zero, one) = (b.unreachable(), b.unreachable());
        let case = b
            .case(Occur::maker(t), vec![(0, zero), (1, one)], None)
            .unwrap();
        let root = b
            .root(
                k,
                vec![t, u],
                FunctionType::new(
                    vec![
                        ValueKind::Tagged { constructors: 2 },
                        ValueKind::Tagged { constructors: 3 },
                    ],
                    ValueKind::Any,
                ),
                case,
            )
            .unwrap();
        b.finish(root).unwrap();

        let scrutinee = operands(&program, case)[0];

        assert_eq!(
            program.substitute(scrutinee, u),
            Err(ChangeError::Case(CaseError::NonExhaustive { missing: vec![2] }))
        );
        assert_eq!(program.binding_variable(scrutinee), t);
    }

    #[test]
    fn remove_dead_let_promotes_the_body() {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let x = b.fresh_var("x", ValueKind::Int);
        let z = b.fresh_var("z", ValueKind::Tagged { constructors: 1 });

        let jump = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(x)])
            .unwrap();
        let dead = b
            .let_(
                z,
                ValueSpec::Block {
                    tag: 0,
                    fields: vec![Occur::maker(x)],
                },
                jump,
            )
            .unwrap();
        let root = b
            .root(
                k,
                vec![x],
                FunctionType::new(vec![ValueKind::Int], ValueKind::Int),
                dead,
            )
            .unwrap();
        b.finish(root).unwrap();

        assert_eq!(program.number_of_occurrences(x), Occurrences::SeveralOccurrences);
        assert_eq!(program.remove_dead_let(dead), Ok(jump));

        assert_eq!(program.enclosing(jump), Some(root.into()));
        assert_eq!(program.definition(root).body, jump);
        assert!(!program.is_live_expression(dead));
        assert!(!program.is_live_var(z));
        assert!(matches!(
            program.number_of_occurrences(x),
            Occurrences::OneOccurrence(_)
        ));
    }

    #[test]
    fn remove_dead_let_refuses_used_binders() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let y = b.fresh_var("y", ValueKind::Int);

        let jump = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(y)])
            .unwrap();
        let used = b.let_(y, Constant::Int(3).into(), jump).unwrap();
        let root = b.root(k, vec![], nullary(), used).unwrap();
        b.finish(root).unwrap();

        assert_eq!(
            program.remove_dead_let(used),
            Err(ChangeError::BinderStillUsed {
                variable: y.any(),
                occurrences: 1
            })
        );
        assert_eq!(
            program.remove_dead_let(jump),
            Err(ChangeError::UnexpectedShape {
                expression: jump,
                expected: "let"
            })
        );
        assert!(program.check().is_ok());
    }

    #[test]
    fn replace_retags_pending_occurrences() {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let r = b.fresh_cont_var("r");
        let f = b.fresh_var("f", ValueKind::Any);

        let placeholder = b.unreachable();
        let function = b
            .function(f, r, vec![], nullary(), Visibility::Public, placeholder)
            .unwrap();
        let call = b
            .apply(Occur::maker(f), vec![], ContOccur::maker(k))
            .unwrap();
        let group = b.let_functions(vec![function], call).unwrap();
        let root = b.root(k, vec![], nullary(), group).unwrap();
        b.finish(root).unwrap();

        // Built outside of the group, so made with a plain maker
        let mut b = program.builder();
        let again = b
            .apply(Occur::maker(f), vec![], ContOccur::maker(r))
            .unwrap();

        program.replace(placeholder, again).unwrap();

        let ExpressionKind::Apply { function: occ, .. } = *program.get(again) else {
            panic!("expected an apply");
        };
        assert_eq!(program.recursivity(occ), Recursivity::Recursive);
        assert_eq!(program.enclosing(again), Some(function.into()));
        assert!(!program.is_live_expression(placeholder));
    }

    #[test]
    fn replace_needs_a_pending_or_descendant_replacement() {
        let (mut program, add) = doubled();
        let root = program.root().unwrap();

        assert_eq!(
            program.replace(add, add),
            Err(ChangeError::InvalidReplacement {
                target: add,
                replacement: add
            })
        );

        let mut b = program.builder();
        let stop = b.unreachable();
        assert_eq!(
            program.replace(stop, add),
            Err(ChangeError::Detached(stop.into()))
        );
        assert_eq!(program.definition(root).body, add);
    }

    #[test]
    fn replace_rejects_replacements_using_destroyed_binders() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let y = b.fresh_var("y", ValueKind::Int);

        let jump = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(y)])
            .unwrap();
        let binding = b.let_(y, Constant::Int(3).into(), jump).unwrap();
        let root = b.root(k, vec![], nullary(), binding).unwrap();
        b.finish(root).unwrap();

        let mut b = program.builder();
        let stray = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(y)])
            .unwrap();

        assert!(matches!(
            program.replace(binding, stray),
            Err(ChangeError::Scope(ScopeError::OutOfScope { .. }))
        ));
        assert!(program.is_live_expression(binding));
        assert_eq!(program.enclosing(stray), None);
    }

    #[test]
    fn remove_dead_definition_shrinks_or_drops_the_group() {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let j1 = b.fresh_cont_var("j1");
        let j2 = b.fresh_cont_var("j2");

        let body1 = b.unreachable();
        let first = b.continuation(j1, vec![], body1).unwrap();
        let body2 = b.continue_(ContOccur::rec_maker(j2), vec![]).unwrap();
        let second = b.continuation(j2, vec![], body2).unwrap();
        let exit = b.continue_(ContOccur::maker(k), vec![]).unwrap();
        let group = b.let_continuations(vec![first, second], exit).unwrap();
        let root = b.root(k, vec![], nullary(), group).unwrap();
        b.finish(root).unwrap();

        // `j2` only calls itself
        program.remove_dead_definition(second).unwrap();
        assert_eq!(program.get(group).definitions(), &[first]);
        assert!(!program.is_live_var(j2));
        assert!(!program.is_live_definition(second));

        program.remove_dead_definition(first).unwrap();
        assert!(!program.is_live_expression(group));
        assert_eq!(program.definition(root).body, exit);
        assert_eq!(program.enclosing(exit), Some(root.into()));
    }

    #[test]
    fn remove_dead_definition_keeps_public_and_used_definitions() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let r = b.fresh_cont_var("r");
        let j = b.fresh_cont_var("j");
        let f = b.fresh_var("f", ValueKind::Any);

        let stop = b.unreachable();
        let function = b
            .function(f, r, vec![], nullary(), Visibility::Public, stop)
            .unwrap();
        let nothing = b.unreachable();
        let join = b.continuation(j, vec![], nothing).unwrap();
        let jump = b.continue_(ContOccur::maker(j), vec![]).unwrap();
        let inner = b.let_continuations(vec![join], jump).unwrap();
        let group = b.let_functions(vec![function], inner).unwrap();
        let root = b.root(k, vec![], nullary(), group).unwrap();
        b.finish(root).unwrap();

        assert_eq!(
            program.remove_dead_definition(function),
            Err(ChangeError::PublicDefinition(function))
        );
        assert_eq!(
            program.remove_dead_definition(join),
            Err(ChangeError::BinderStillUsed {
                variable: j.any(),
                occurrences: 1
            })
        );
        assert_eq!(
            program.remove_dead_definition(root),
            Err(ChangeError::IsRoot(root))
        );
        assert!(program.check().is_ok());
    }

    #[test]
    fn select_case_branch_drops_the_other_branches() {
        let mut program = Program::with_config(ProgramConfig::verified());
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let t = b.fresh_var("t", ValueKind::Tagged { constructors: 3 });

        let zero = b.unreachable();
        let one = b.continue_(ContOccur::maker(k), vec![]).unwrap();
        let other = b.unreachable();
        let case = b
            .case(Occur::maker(t), vec![(0, zero), (1, one)], Some(other))
            .unwrap();
        let root = b
            .root(
                k,
                vec![t],
                FunctionType::new(vec![ValueKind::Tagged { constructors: 3 }], ValueKind::Any),
                case,
            )
            .unwrap();
        b.finish(root).unwrap();

        assert_eq!(program.select_case_branch(case, 1), Ok(one));

        assert_eq!(program.definition(root).body, one);
        assert!(!program.is_live_expression(zero));
        assert!(!program.is_live_expression(other));
        assert_eq!(program.number_of_occurrences(t), Occurrences::NoOccurrence);
    }

    #[test]
    fn select_case_branch_falls_back_to_the_default() {
        let mut program = Program::new();
        let mut b = program.builder();

        let k = b.fresh_cont_var("k");
        let n = b.fresh_var("n", ValueKind::Int);

        let zero = b.unreachable();
        let other = b.continue_(ContOccur::maker(k), vec![]).unwrap();
        let case = b
            .case(Occur::maker(n), vec![(0, zero)], Some(other))
            .unwrap();
        let root = b
            .root(
                k,
                vec![n],
                FunctionType::new(vec![ValueKind::Int], ValueKind::Any),
                case,
            )
            .unwrap();
        b.finish(root).unwrap();

        assert_eq!(program.select_case_branch(case, 7), Ok(other));
        assert!(program.check().is_ok());
    }

    #[test]
    fn discard_frees_a_pending_subtree() {
        let (mut program, _) = doubled();
        let x = program.variables::<Var>().next().unwrap();
        let k = program.variables::<ContVar>().next().unwrap();

        let mut b = program.builder();
        let w = b.fresh_var("w", ValueKind::Int);
        let jump = b
            .continue_(ContOccur::maker(k), vec![Occur::maker(w)])
            .unwrap();
        let pending = b.let_(w, ValueSpec::Var(Occur::maker(x)), jump).unwrap();

        assert!(program.check().is_err());

        program.discard(pending).unwrap();

        assert!(!program.is_live_var(w));
        assert_eq!(program.number_of_occurrences(x), Occurrences::SeveralOccurrences);
        assert_eq!(program.occurrences(k).count(), 1);
        assert!(program.check().is_ok());
        assert_eq!(
            program.discard(program.root().unwrap()),
            Err(ChangeError::NotPending(program.root().unwrap().into()))
        );
    }
}
