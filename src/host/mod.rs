//! Host Adapters
//!
//! Concrete implementations of the capability ports: the command-backed
//! ESXi adapter, plus an in-memory fake for tests.

pub mod esxcli;
pub mod runner;

#[cfg(test)]
pub(crate) mod fake;

pub use esxcli::*;
pub use runner::*;
