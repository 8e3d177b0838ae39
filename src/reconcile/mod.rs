//! Config Reconciler
//!
//! Binds every declared disk to a physical device by canonical serial.
//! Model strings and device names are never used for matching: neither is
//! stable across the tools that report them.
//!
//! Disks without a matching device are reported and left out of the
//! layout, together with their partitions and every datastore built on
//! them; the run goes on for every disk that did match.

pub mod controller_override;

pub use controller_override::*;

use crate::config::{DatastoreSpec, LogicalDisk, LogicalPartition, StorageConfig};
use crate::domain::ports::{DeviceRecord, PartitionTarget};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// =============================================================================
// Resolved Layout
// =============================================================================

/// A declared disk bound to a physical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDisk {
    pub config: LogicalDisk,
    /// Identifier of the matched device
    pub identifier: String,
    pub device_path: String,
    pub block_size: u32,
    /// The installation disk keeps its partition table; it is never relabelled
    pub already_partitioned: bool,
}

impl ResolvedDisk {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_boot_disk(&self) -> bool {
        self.config.is_boot_disk()
    }
}

/// The storage config bound to the host's devices
#[derive(Debug, Clone, Default, Serialize)]
pub struct Layout {
    pub disks: IndexMap<String, ResolvedDisk>,
    pub partitions: IndexMap<String, LogicalPartition>,
    pub datastores: IndexMap<String, DatastoreSpec>,
    /// Ids of declared disks no device matched
    pub unmatched: Vec<String>,
    /// Ids of declared datastores left out because a partition of theirs
    /// lies on an unmatched disk
    pub dropped_datastores: Vec<String>,
}

impl Layout {
    /// Resolve a partition id to its disk and `device:number` target
    pub fn resolve_partition(&self, id: &str) -> Option<(&ResolvedDisk, PartitionTarget)> {
        let partition = self.partitions.get(id)?;
        let disk = self.disks.get(&partition.device)?;
        Some((disk, PartitionTarget::new(&disk.device_path, partition.number)))
    }

    /// Every resolved installation disk
    pub fn boot_disks(&self) -> Vec<&ResolvedDisk> {
        self.disks.values().filter(|d| d.is_boot_disk()).collect()
    }

    /// Whether any declared datastore survived matching
    pub fn has_custom_layout(&self) -> bool {
        !self.datastores.is_empty()
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Matches declared disks to scanned devices
pub struct Reconciler;

impl Reconciler {
    /// Bind `config` to `devices`.
    ///
    /// The result does not depend on the order of `devices`.
    pub fn reconcile(config: &StorageConfig, devices: &[DeviceRecord]) -> Result<Layout> {
        let mut layout = Layout::default();
        let mut bound: HashMap<&str, &str> = HashMap::new();

        for disk in config.disks.values() {
            let Some(device) = find_device(devices, &disk.serial) else {
                warn!(
                    "No device found for disk {} (serial {:?}, model {:?}), skipping it",
                    disk.id, disk.serial, disk.model
                );
                layout.unmatched.push(disk.id.clone());
                continue;
            };

            if let Some(other) = bound.insert(&device.identifier, &disk.id) {
                return Err(Error::Configuration(format!(
                    "Disks {} and {} both match device {}",
                    other, disk.id, device.identifier
                )));
            }

            info!(
                "Matched disk {} (serial {}) to {}",
                disk.id, disk.serial, device.devfs_path
            );
            layout.disks.insert(
                disk.id.clone(),
                ResolvedDisk {
                    config: disk.clone(),
                    identifier: device.identifier.clone(),
                    device_path: device.devfs_path.clone(),
                    block_size: device.block_size,
                    already_partitioned: disk.is_boot_disk(),
                },
            );
        }

        for partition in config.partitions.values() {
            if layout.disks.contains_key(&partition.device) {
                layout.partitions.insert(partition.id.clone(), partition.clone());
            } else {
                debug!(
                    "Partition {} belongs to unmatched disk {}",
                    partition.id, partition.device
                );
            }
        }

        for datastore in config.datastores.values() {
            match datastore
                .devices
                .iter()
                .find(|id| !layout.partitions.contains_key(*id))
            {
                None => {
                    layout.datastores.insert(datastore.id.clone(), datastore.clone());
                }
                Some(missing) => {
                    warn!(
                        "Dropping datastore {} ({}): partition {} is not on a matched disk",
                        datastore.id, datastore.name, missing
                    );
                    layout.dropped_datastores.push(datastore.id.clone());
                }
            }
        }

        Ok(layout)
    }
}

/// Device whose canonical serial is `serial`, else one that carries it as an
/// alias serial. Ties go to the smallest identifier.
fn find_device<'a>(devices: &'a [DeviceRecord], serial: &str) -> Option<&'a DeviceRecord> {
    if serial.is_empty() {
        return None;
    }

    devices
        .iter()
        .filter(|d| d.has_serial() && d.serial == serial)
        .min_by(|a, b| a.identifier.cmp(&b.identifier))
        .or_else(|| {
            devices
                .iter()
                .filter(|d| d.answers_to(serial))
                .min_by(|a, b| a.identifier.cmp(&b.identifier))
        })
}
