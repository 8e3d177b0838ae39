//! Provisioning Module
//!
//! Mutating side of the pipeline: wipe, partition, then build datastores.

pub mod datastore;
pub mod partition;
pub mod wipe;

pub use datastore::*;
pub use partition::*;
pub use wipe::*;
