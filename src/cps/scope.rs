//! Resolves where an occurrence stands relative to the binder of its
//! variable. Build uses it to validate a finished tree, Change uses it to
//! validate a rewrite before performing it and to retag the occurrences that
//! moved.

use super::{
    Program,
    binders::{BinderRole, Occurrence, Variable},
    error::ScopeError,
    id::{ContOccur, Enclosing, Expression, Occur, Recursivity},
    visit::Footprint,
};

/// Pretends that the subtree headed by `root` sits below `parent`. Used to
/// resolve a replacement at the position it is about to take.
#[derive(Debug, Clone, Copy)]
pub(super) struct Graft {
    pub root: Expression,
    pub parent: Option<Enclosing>,
}

/// The recursivity every occurrence of a subtree must carry
#[derive(Debug, Default)]
pub(super) struct Resolution {
    pub occurrences: Vec<(Occur, Recursivity)>,
    pub cont_occurrences: Vec<(ContOccur, Recursivity)>,
}

impl Program {
    fn parent_of(&self, node: Enclosing, graft: Option<Graft>) -> Option<Enclosing> {
        match graft {
            Some(graft) if node == Enclosing::Expression(graft.root) => graft.parent,
            _ => self.enclosing(node),
        }
    }

    /// Finds the binder of `var` walking up from the expression holding an
    /// occurrence. The binder must be a strict ancestor of the holder; a `Let`
    /// does not see its own variable in its value.
    pub(super) fn resolve<V: Variable>(
        &self,
        var: V,
        holder: Expression,
        graft: Option<Graft>,
    ) -> Result<Recursivity, ScopeError> {
        let Some(binding) = V::table(self).var(var).binding else {
            return Err(ScopeError::Unbound {
                variable: var.any(),
                at: holder,
            });
        };

        let mut child = Enclosing::Expression(holder);
        let mut current = self.parent_of(child, graft);

        while let Some(ancestor) = current {
            if ancestor == binding.site {
                let recursive = binding.role == BinderRole::GroupName
                    && matches!(child, Enclosing::Definition(_));

                return Ok(if recursive {
                    Recursivity::Recursive
                } else {
                    Recursivity::NonRecursive
                });
            }

            if let Enclosing::Definition(definition) = ancestor {
                if V::IS_CONTINUATION && self.definition(definition).is_function_boundary() {
                    return Err(ScopeError::EscapingContinuation {
                        variable: var.any(),
                        at: holder,
                    });
                }
            }

            child = ancestor;
            current = self.parent_of(ancestor, graft);
        }

        Err(ScopeError::OutOfScope {
            variable: var.any(),
            at: holder,
        })
    }

    pub(super) fn resolve_occurrence<O: Occurrence>(
        &self,
        occurrence: O,
        graft: Option<Graft>,
    ) -> Result<Recursivity, ScopeError> {
        let data = <O::Variable as Variable>::table(self).occurrence(occurrence);
        self.resolve(data.var, data.holder, graft)
    }

    /// Resolves every occurrence below `node`, stopping at the first one that
    /// is out of scope
    pub(super) fn resolve_subtree(
        &self,
        node: Enclosing,
        graft: Option<Graft>,
    ) -> Result<Resolution, ScopeError> {
        let footprint = Footprint::of(self, node, None);
        let mut resolution = Resolution::default();

        for occurrence in footprint.occurrences {
            let recursivity = self.resolve_occurrence(occurrence, graft)?;
            resolution.occurrences.push((occurrence, recursivity));
        }

        for occurrence in footprint.cont_occurrences {
            let recursivity = self.resolve_occurrence(occurrence, graft)?;
            resolution.cont_occurrences.push((occurrence, recursivity));
        }

        Ok(resolution)
    }
}
