//! Hardware Discovery Module
//!
//! Discovers and enumerates the storage hardware of an ESXi host from the
//! text reports of its inventory tools.

pub mod nvme;
pub mod report;
pub mod scanner;

pub use nvme::*;
pub use report::*;
pub use scanner::*;
