use std::collections::{BTreeMap, BTreeSet};

use crate::index::simple_index;

simple_index! {
    /// Identifies an expression node in a [`Program`](super::Program)
    pub struct Expression;
}

simple_index! {
    /// Identifies a function, continuation or root definition
    pub struct Definition;
}

simple_index! {
    /// A value level binder
    pub struct Var;
}

simple_index! {
    /// A continuation level binder. Stands for "where control goes next"
    /// rather than for a value.
    pub struct ContVar;
}

simple_index! {
    /// A single use-site of a [`Var`]
    pub struct Occur;
}

simple_index! {
    /// A single use-site of a [`ContVar`]
    pub struct ContOccur;
}

/// The structural parent of a node. Also used wherever any node of the tree
/// needs to be named.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum Enclosing {
    Expression(Expression),
    Definition(Definition),
}

impl From<Expression> for Enclosing {
    fn from(value: Expression) -> Self {
        Enclosing::Expression(value)
    }
}

impl From<Definition> for Enclosing {
    fn from(value: Definition) -> Self {
        Enclosing::Definition(value)
    }
}

/// Whether an occurrence sits inside the simultaneous-binding group that
/// introduces its variable.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Recursivity {
    Recursive,
    NonRecursive,
}

/// Either kind of binder, for diagnostics
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum AnyVar {
    Var(Var),
    Cont(ContVar),
}

/// Either kind of occurrence, for diagnostics
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum AnyOccur {
    Occur(Occur),
    Cont(ContOccur),
}

pub type VarMap<T> = BTreeMap<Var, T>;
pub type VarSet = BTreeSet<Var>;
pub type ContVarMap<T> = BTreeMap<ContVar, T>;
pub type ContVarSet = BTreeSet<ContVar>;
pub type OccurMap<T> = BTreeMap<Occur, T>;
pub type OccurSet = BTreeSet<Occur>;
pub type ContOccurMap<T> = BTreeMap<ContOccur, T>;
pub type ContOccurSet = BTreeSet<ContOccur>;

macro_rules! display_handle {
    ($($name:ident => $prefix:literal),* $(,)?) => {
        $(
            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, concat!($prefix, " #{}"), self.0)
                }
            }
        )*
    };
}

display_handle! {
    Expression => "expression",
    Definition => "definition",
    Var => "variable",
    ContVar => "continuation variable",
    Occur => "occurrence",
    ContOccur => "continuation occurrence",
}

impl core::fmt::Display for Enclosing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Enclosing::Expression(e) => e.fmt(f),
            Enclosing::Definition(d) => d.fmt(f),
        }
    }
}

impl core::fmt::Display for AnyVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyVar::Var(v) => v.fmt(f),
            AnyVar::Cont(k) => k.fmt(f),
        }
    }
}

impl core::fmt::Display for AnyOccur {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyOccur::Occur(o) => o.fmt(f),
            AnyOccur::Cont(o) => o.fmt(f),
        }
    }
}

impl core::fmt::Display for Recursivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recursivity::Recursive => f.write_str("recursive"),
            Recursivity::NonRecursive => f.write_str("non-recursive"),
        }
    }
}
