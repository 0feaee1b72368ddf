//! Core of the Drip CPS intermediate representation: the tree, the indices
//! kept alongside it and the operations building, rewriting and verifying it.

pub mod config;
pub mod cps;
pub mod index;
pub mod intern;
