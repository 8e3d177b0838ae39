//! Configuration Module
//!
//! Decoding and validation of the declarative storage layout.

pub mod storage;

pub use storage::*;
