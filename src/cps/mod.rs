//! A continuation passing style intermediate representation. Every
//! computation passes its result to an explicit continuation and every value
//! and continuation is named by a binder.
//!
//! The tree lives in a [`Program`] arena and is addressed through handles.
//! Alongside the tree the program keeps the links optimization passes query
//! all the time (enclosing node, occurrences of a binder, binder of an
//! occurrence) and keeps them up to date through the [`build`] and [`change`]
//! operations. [`check`] verifies them from scratch.

pub mod ast;
pub mod binders;
pub mod build;
pub mod change;
pub mod check;
pub mod error;
pub mod free_vars;
pub mod id;
pub mod pretty_print;
pub mod primitive;
pub mod program;
mod scope;
pub mod visit;

pub use ast::*;
pub use binders::{
    BinderRole, ContOccurMaker, Maker, OccurMaker, Occurrence, Occurrences, Variable,
};
pub use build::{Builder, ValueSpec};
pub use check::{CheckFailed, Violation, check_program};
pub use error::{BuildError, CaseError, ChangeError, ScopeError};
pub use id::*;
pub use primitive::Primitive;
pub use program::Program;
