use thiserror::Error;

use super::{
    ast::{Tag, ValueKind},
    id::{AnyOccur, AnyVar, Definition, Enclosing, Expression, Recursivity, Var},
};

/// An occurrence that cannot see its variable from where it sits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("{variable} is used at {at} but is never bound")]
    Unbound { variable: AnyVar, at: Expression },

    #[error("{variable} is used at {at} outside of its scope")]
    OutOfScope { variable: AnyVar, at: Expression },

    #[error("{variable} is captured by a nested function at {at}")]
    EscapingContinuation { variable: AnyVar, at: Expression },
}

/// A malformed case dispatch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error("duplicate case tag {tag}")]
    DuplicateTag { tag: Tag },

    #[error("case tag {tag} is out of range for a scrutinee with {constructors} constructors")]
    TagOutOfRange { tag: Tag, constructors: Tag },

    #[error("case is not exhaustive, missing tags {missing:?}")]
    NonExhaustive { missing: Vec<Tag> },
}

/// A contract violation by a caller of the build operations. The program is
/// left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("{0} does not exist (anymore)")]
    UnknownVariable(AnyVar),

    #[error("{0} does not exist (anymore)")]
    UnknownNode(Enclosing),

    #[error("{0} is already bound")]
    AlreadyBound(AnyVar),

    #[error("{0} is bound twice by the same node")]
    DuplicateBinder(AnyVar),

    #[error("{0} already has an enclosing node")]
    AlreadyAttached(Enclosing),

    #[error("{0} is used twice as a child")]
    DuplicateChild(Enclosing),

    #[error("{0} is the program root")]
    IsRoot(Enclosing),

    #[error(transparent)]
    Case(#[from] CaseError),

    #[error("expected {expected} operands, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("parameter {variable} has kind {found:?} but the definition type says {expected:?}")]
    KindMismatch {
        variable: Var,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{variable} of kind {kind:?} cannot hold the value bound to it")]
    IncompatibleValue { variable: Var, kind: ValueKind },

    #[error("{definition} is not a {expected} definition")]
    WrongDefinitionKind {
        definition: Definition,
        expected: &'static str,
    },

    #[error("a binding group needs at least one definition")]
    EmptyGroup,

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("{occurrence} should be {expected} at its position")]
    WrongRecursivity {
        occurrence: AnyOccur,
        expected: Recursivity,
    },

    #[error("the program already has a root")]
    RootAlreadyInstalled,
}

/// A rejected rewrite. The program is left exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("{0} does not exist (anymore)")]
    UnknownVariable(AnyVar),

    #[error("{0} does not exist (anymore)")]
    UnknownOccurrence(AnyOccur),

    #[error("{0} does not exist (anymore)")]
    UnknownNode(Enclosing),

    #[error("{0} is not reachable from the program root")]
    Detached(Enclosing),

    #[error("{0} is attached, expected a subtree that was built but not attached")]
    NotPending(Enclosing),

    #[error("{replacement} is neither pending nor a descendant of {target}")]
    InvalidReplacement {
        target: Expression,
        replacement: Expression,
    },

    #[error("{expression} is not a {expected}")]
    UnexpectedShape {
        expression: Expression,
        expected: &'static str,
    },

    #[error("{variable} still has {occurrences} occurrence(s)")]
    BinderStillUsed { variable: AnyVar, occurrences: usize },

    #[error("{0} is public and cannot be removed")]
    PublicDefinition(Definition),

    #[error("{0} is the program root")]
    IsRoot(Definition),

    #[error("{variable} of kind {kind:?} cannot alias a variable of kind {found:?}")]
    IncompatibleValue {
        variable: Var,
        kind: ValueKind,
        found: ValueKind,
    },

    #[error("case {case} has no branch for tag {tag} and no default")]
    NoSuchBranch { case: Expression, tag: Tag },

    #[error(transparent)]
    Case(#[from] CaseError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}
