//! A small JVM: class-file decoding, descriptor parsing and an interpreter
//! for static methods over int values and primitive arrays.
pub mod bytecode;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod heap;
pub mod intern;
pub mod interpreter;
pub mod jvm;
pub mod program;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use error::{Error, Fault, FaultKind, Result, Uncaught};
pub use runtime::{Runtime, RuntimeConfig};
