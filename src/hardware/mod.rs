//! Hardware Module
//!
//! Provides hardware discovery and serial number extraction.

pub mod discovery;
pub mod serial;

pub use discovery::*;
pub use serial::*;
