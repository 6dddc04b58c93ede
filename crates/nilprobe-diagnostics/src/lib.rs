//! nilprobe diagnostics - diagnostic types and output formatters.

pub mod diagnostic;
pub mod human;
pub mod json;
pub mod sarif;

pub use diagnostic::*;
