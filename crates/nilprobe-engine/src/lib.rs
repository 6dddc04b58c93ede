//! nilprobe engine - interprocedural nil pointer dereference analysis

pub mod analysis;
pub mod frame;
pub mod lattice;
pub mod locator;
pub mod rules;
pub mod sink;

pub use analysis::{Engine, NilAnalyzer, NilOptions, NilReport};
