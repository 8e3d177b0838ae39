//! Domain layer - Core records, platform constants and port definitions
//!
//! This module defines the core traits (ports) that host adapters implement,
//! following hexagonal architecture principles.

pub mod platform;
pub mod ports;

pub use platform::*;
pub use ports::*;
