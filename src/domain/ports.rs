//! Domain Ports - Core record types and capability traits
//!
//! These traits define the boundary between the reconciliation logic and the
//! host's storage tools. Each capability returns the captured text output of
//! the tool it wraps, or fails when that tool exits non-zero. The real
//! command-backed adapter lives in [`crate::host`]; tests substitute a fake
//! that serves canned text.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Inventory Records
// =============================================================================

/// A physical storage device discovered on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Platform device name (e.g., t10.ATA_____INTEL_SSDSC2KB480G8____PHYF...)
    pub identifier: String,
    /// Alternate identifier strings reported for the device
    pub aliases: Vec<String>,
    /// Serials embedded in the alias identifiers, in alias order
    pub alias_serials: Vec<String>,
    /// Canonical serial number, empty when extraction failed
    pub serial: String,
    /// Model string
    pub model: String,
    /// Vendor string
    pub vendor: String,
    /// Capacity in MiB
    pub size_mib: u64,
    /// Logical block size in bytes
    pub block_size: u32,
    /// Device path (e.g., /vmfs/devices/disks/<identifier>)
    pub devfs_path: String,
    /// Owning adapter (e.g., vmhba2)
    pub adapter: Option<String>,
    /// Controller the device is reached through
    pub controller: Option<String>,
}

impl DeviceRecord {
    /// Whether the device carries a usable serial
    pub fn has_serial(&self) -> bool {
        !self.serial.is_empty()
    }

    /// Whether the canonical serial or any alias serial equals `serial`
    pub fn answers_to(&self, serial: &str) -> bool {
        !serial.is_empty()
            && (self.serial == serial || self.alias_serials.iter().any(|s| s == serial))
    }
}

/// An NVMe controller and the serial of its attached drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRecord {
    /// Adapter name (e.g., vmhba2)
    pub adapter: String,
    /// Linux-style device name synthesized from enumeration order (nvme0, nvme1, ...)
    pub device_name: String,
    /// Serial number reported by the controller
    pub serial: String,
    /// Model number reported by the controller
    pub model: String,
}

/// One entry of the storage path topology (adapter -> controller -> device)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Runtime name of the path (e.g., vmhba2:C0:T0:L0)
    pub runtime_name: String,
    /// Device identifier the path leads to
    pub device: String,
    /// Serial embedded in the device display name
    pub display_serial: Option<String>,
    /// Adapter the path runs through
    pub adapter: String,
    /// Controller name as reported on the path
    pub controller: String,
    /// Serial embedded in the controller name
    pub controller_serial: Option<String>,
}

// =============================================================================
// Partitioning Types
// =============================================================================

/// Partition table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTableKind {
    #[default]
    Gpt,
    #[serde(alias = "dos")]
    Msdos,
}

impl fmt::Display for PartitionTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionTableKind::Gpt => write!(f, "gpt"),
            PartitionTableKind::Msdos => write!(f, "msdos"),
        }
    }
}

/// A partition to be added to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartition {
    pub number: u32,
    pub start_sector: u64,
    pub end_sector: u64,
    pub type_guid: String,
}

/// A concrete `device:partition` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionTarget {
    pub device_path: String,
    pub number: u32,
}

impl PartitionTarget {
    pub fn new(device_path: impl Into<String>, number: u32) -> Self {
        Self {
            device_path: device_path.into(),
            number,
        }
    }
}

impl fmt::Display for PartitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_path, self.number)
    }
}

/// Byte source for a raw block overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteSource {
    Zero,
    Random,
}

impl OverwriteSource {
    /// Character device the bytes are read from
    pub fn device(&self) -> &'static str {
        match self {
            OverwriteSource::Zero => "/dev/zero",
            OverwriteSource::Random => "/dev/urandom",
        }
    }
}

// =============================================================================
// Capability Ports
// =============================================================================

/// Read-only hardware inventory queries
pub trait InventorySource {
    /// List NVMe adapters
    fn nvme_adapters(&self) -> Result<String>;

    /// Controller identify detail for one NVMe adapter
    fn nvme_controller_detail(&self, adapter: &str) -> Result<String>;

    /// List every storage device
    fn device_list(&self) -> Result<String>;

    /// List block sizes and capacities of every storage device
    fn device_capacities(&self) -> Result<String>;

    /// List every storage path
    fn path_list(&self) -> Result<String>;

    /// Platform version banner
    fn platform_version(&self) -> Result<String>;
}

/// Partition table inspection and manipulation
pub trait PartitionTool {
    /// Current partition table report of a device
    fn partition_table(&self, device: &str) -> Result<String>;

    /// First and last usable sectors of a device
    fn usable_sectors(&self, device: &str) -> Result<String>;

    /// Write a new, empty partition table
    fn create_partition_table(&self, device: &str, kind: PartitionTableKind) -> Result<()>;

    /// Add a partition to an existing table
    fn add_partition(
        &self,
        device: &str,
        kind: PartitionTableKind,
        partition: &NewPartition,
    ) -> Result<()>;

    /// Delete a partition
    fn delete_partition(&self, device: &str, number: u32) -> Result<()>;

    /// Move the end of a partition
    fn resize_partition(&self, device: &str, number: u32, start: u64, end: u64) -> Result<()>;

    /// Rewrite the backup GPT header to match the device's real size
    fn repair_partition_table(&self, device: &str) -> Result<()>;

    /// Unmount every mounted filesystem
    fn unmount_all_filesystems(&self) -> Result<()>;

    /// Rescan all storage adapters
    fn rescan_storage(&self) -> Result<()>;
}

/// Datastore volume manipulation
pub trait VolumeTool {
    /// Create a filesystem volume on a head partition
    fn create_volume(&self, fs_type: &str, name: &str, head: &PartitionTarget) -> Result<()>;

    /// Span an existing volume onto another partition
    fn attach_extent(&self, head: &PartitionTarget, extent: &PartitionTarget) -> Result<()>;

    /// Grow a volume into the free space of its (already resized) partition
    fn grow_volume(&self, target: &PartitionTarget) -> Result<()>;

    /// List every volume extent
    fn volume_extents(&self) -> Result<String>;
}

/// Raw device writes
pub trait BlockWriter {
    /// Overwrite `blocks` blocks of `block_size` bytes, or the whole device when `None`
    fn overwrite(
        &self,
        device: &str,
        source: OverwriteSource,
        block_size: u32,
        blocks: Option<u64>,
    ) -> Result<()>;

    /// Flush all pending writes
    fn sync(&self) -> Result<()>;
}

/// Every capability the provisioning pipeline needs from a host
pub trait StorageHost: InventorySource + PartitionTool + VolumeTool + BlockWriter {}

impl<T> StorageHost for T where T: InventorySource + PartitionTool + VolumeTool + BlockWriter {}
