//! ESXi Storage Reconciler
//!
//! Applies a declarative storage layout (disks, partitions and VMFS
//! datastores) to the physical storage of a VMware ESXi host.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            Orchestrator                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐  │
//! │  │  Inventory   │──▶│    Config    │──▶│   Wipe → Partition →     │  │
//! │  │   Scanner    │   │  Reconciler  │   │   Datastore              │  │
//! │  └──────┬───────┘   └──────────────┘   └────────────┬─────────────┘  │
//! │         │      serial extraction, NVMe override     │                │
//! ├─────────┴───────────────────────────────────────────┴────────────────┤
//! │                Capability Ports (domain::ports)                      │
//! │    esxcli · partedUtil · vmkfstools · dd · sync · vmware -v          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Storage config decoding
//! - [`hardware`]: Inventory scanning and serial extraction
//! - [`reconcile`]: Binding declared disks to devices
//! - [`provision`]: Wipe, partition and datastore creation
//! - [`host`]: Command-backed host capabilities
//! - [`orchestrator`]: The end-to-end provisioning run
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod host;
pub mod orchestrator;
pub mod provision;
pub mod reconcile;

// Re-export commonly used types
pub use config::{StorageConfig, WipePolicy};

pub use domain::platform::PlatformGeneration;
pub use domain::ports::{
    BlockWriter, DeviceRecord, InventorySource, PartitionTool, StorageHost, VolumeTool,
};

pub use error::{Error, Result};

pub use hardware::{extract_serial, HardwareScanner, ScannerConfig};

pub use host::{CommandRunner, EsxiHost};

pub use orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
