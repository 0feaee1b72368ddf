//! Variables, occurrences and the side tables linking them. Both kinds of
//! binders ([`Var`] and [`ContVar`]) share one table implementation through
//! the [`Variable`] and [`Occurrence`] traits.

use std::{collections::BTreeSet, fmt::Display};

use super::{
    Program,
    ast::ValueKind,
    id::{AnyOccur, AnyVar, ContOccur, ContVar, Enclosing, Expression, Occur, Recursivity, Var},
};
use crate::{
    index::{Index, IndexVec},
    intern::InternedSymbol,
};

/// Implemented by the two binder handle types
pub trait Variable: Index + Display {
    type Occurrence: Occurrence<Variable = Self>;

    /// Continuation variables may not be captured by nested functions
    const IS_CONTINUATION: bool;

    fn table(program: &Program) -> &VarTable<Self, Self::Occurrence>;

    fn table_mut(program: &mut Program) -> &mut VarTable<Self, Self::Occurrence>;

    fn any(self) -> AnyVar;
}

/// Implemented by the two occurrence handle types
pub trait Occurrence: Index + Display {
    type Variable: Variable<Occurrence = Self>;

    fn any(self) -> AnyOccur;
}

impl Variable for Var {
    type Occurrence = Occur;

    const IS_CONTINUATION: bool = false;

    fn table(program: &Program) -> &VarTable<Self, Occur> {
        &program.vars
    }

    fn table_mut(program: &mut Program) -> &mut VarTable<Self, Occur> {
        &mut program.vars
    }

    fn any(self) -> AnyVar {
        AnyVar::Var(self)
    }
}

impl Variable for ContVar {
    type Occurrence = ContOccur;

    const IS_CONTINUATION: bool = true;

    fn table(program: &Program) -> &VarTable<Self, ContOccur> {
        &program.cont_vars
    }

    fn table_mut(program: &mut Program) -> &mut VarTable<Self, ContOccur> {
        &mut program.cont_vars
    }

    fn any(self) -> AnyVar {
        AnyVar::Cont(self)
    }
}

impl Occurrence for Occur {
    type Variable = Var;

    fn any(self) -> AnyOccur {
        AnyOccur::Occur(self)
    }
}

impl Occurrence for ContOccur {
    type Variable = ContVar;

    fn any(self) -> AnyOccur {
        AnyOccur::Cont(self)
    }
}

/// How many times a variable is used. `One` carries the single use-site so
/// that inliners can go straight to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrences<O> {
    NoOccurrence,
    OneOccurrence(O),
    SeveralOccurrences,
}

/// A capability to mint one occurrence of a variable. Build consumes makers
/// and creates the occurrence inside the node it constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Maker<V> {
    pub(super) var: V,
    pub(super) recursivity: Recursivity,
}

pub type OccurMaker = Maker<Var>;
pub type ContOccurMaker = Maker<ContVar>;

impl<V: Copy> Maker<V> {
    pub fn var(&self) -> V {
        self.var
    }

    pub fn recursivity(&self) -> Recursivity {
        self.recursivity
    }
}

impl Occur {
    /// A maker for a use of `var` outside of its binding group
    pub fn maker(var: Var) -> OccurMaker {
        Maker {
            var,
            recursivity: Recursivity::NonRecursive,
        }
    }

    /// A maker for a use of `var` inside its own binding group
    pub fn rec_maker(var: Var) -> OccurMaker {
        Maker {
            var,
            recursivity: Recursivity::Recursive,
        }
    }
}

impl ContOccur {
    pub fn maker(var: ContVar) -> ContOccurMaker {
        Maker {
            var,
            recursivity: Recursivity::NonRecursive,
        }
    }

    pub fn rec_maker(var: ContVar) -> ContOccurMaker {
        Maker {
            var,
            recursivity: Recursivity::Recursive,
        }
    }
}

/// What kind of construct introduces a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderRole {
    /// `Let`, scope is the let body
    Let,
    /// Name of a definition in a `LetFunctions`/`LetContinuations` group,
    /// scope is the whole group
    GroupName,
    /// Parameter of a definition, scope is the definition body
    Parameter,
    /// Return continuation of a function or of the root
    ReturnContinuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub site: Enclosing,
    pub role: BinderRole,
}

#[derive(Debug)]
pub struct VarData<O> {
    pub name: InternedSymbol,
    pub kind: ValueKind,
    /// Unset while the variable is fresh
    pub binding: Option<Binding>,
    /// Ordered by occurrence handle, which is creation order
    pub occurrences: BTreeSet<O>,
}

#[derive(Debug)]
pub struct OccurData<V> {
    pub var: V,
    pub recursivity: Recursivity,
    /// The expression holding the occurrence
    pub holder: Expression,
}

/// Arena for one kind of variable and its occurrences. All updates keep the
/// variable → occurrence sets and the occurrence → variable links in lockstep.
#[derive(Debug)]
pub struct VarTable<V: Index, O: Index> {
    pub(super) vars: IndexVec<V, VarData<O>>,
    pub(super) occurrences: IndexVec<O, OccurData<V>>,
}

impl<V: Index, O: Index> Default for VarTable<V, O> {
    fn default() -> Self {
        Self {
            vars: IndexVec::new(),
            occurrences: IndexVec::new(),
        }
    }
}

impl<V: Index, O: Index> VarTable<V, O> {
    pub(super) fn fresh(&mut self, name: InternedSymbol, kind: ValueKind) -> V {
        self.vars.push(VarData {
            name,
            kind,
            binding: None,
            occurrences: BTreeSet::new(),
        })
    }

    pub(super) fn var(&self, var: V) -> &VarData<O> {
        &self.vars[var]
    }

    pub(super) fn occurrence(&self, occurrence: O) -> &OccurData<V> {
        &self.occurrences[occurrence]
    }

    pub(super) fn bind(&mut self, var: V, binding: Binding) {
        let data = &mut self.vars[var];
        debug_assert!(data.binding.is_none(), "{var:?} bound twice");
        data.binding = Some(binding);
    }

    /// Creates an occurrence and registers it against `var`
    pub(super) fn mint(&mut self, var: V, recursivity: Recursivity, holder: Expression) -> O {
        let occurrence = self.occurrences.push(OccurData {
            var,
            recursivity,
            holder,
        });
        self.vars[var].occurrences.insert(occurrence);
        occurrence
    }

    /// Moves an existing occurrence over to another variable
    pub(super) fn repoint(&mut self, occurrence: O, to: V, recursivity: Recursivity) {
        let data = &mut self.occurrences[occurrence];
        let from = data.var;
        data.var = to;
        data.recursivity = recursivity;

        self.vars[from].occurrences.remove(&occurrence);
        self.vars[to].occurrences.insert(occurrence);
    }

    pub(super) fn retag(&mut self, occurrence: O, recursivity: Recursivity) {
        self.occurrences[occurrence].recursivity = recursivity;
    }

    /// Unregisters an occurrence from its variable and frees it
    pub(super) fn unregister(&mut self, occurrence: O) {
        if let Some(data) = self.occurrences.remove(occurrence) {
            if let Some(var) = self.vars.get_mut(data.var) {
                var.occurrences.remove(&occurrence);
            }
        }
    }

    /// Frees a variable that no longer has any occurrence
    pub(super) fn free(&mut self, var: V) {
        let data = self.vars.remove(var);
        debug_assert!(
            data.is_none_or(|d| d.occurrences.is_empty()),
            "freed {var:?} while it still has occurrences"
        );
    }

    pub(super) fn number_of_occurrences(&self, var: V) -> Occurrences<O> {
        let occurrences = &self.vars[var].occurrences;

        match occurrences.len() {
            0 => Occurrences::NoOccurrence,
            1 => match occurrences.first() {
                Some(occurrence) => Occurrences::OneOccurrence(*occurrence),
                None => Occurrences::NoOccurrence,
            },
            _ => Occurrences::SeveralOccurrences,
        }
    }
}
