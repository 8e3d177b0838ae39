//! Datastore Builder
//!
//! Creates the declared VMFS datastores. Each datastore is created on its
//! head partition and then spanned onto the remaining partitions in the
//! order they were declared.
//!
//! A config without datastores keeps the installer's `datastore1` and lets
//! it grow over the rest of the installation disk instead.

use super::partition::{PartitionPlanner, PlanOutcome};
use crate::domain::ports::{PartitionTarget, VolumeTool};
use crate::error::{Error, Result};
use crate::hardware::discovery::report::parse_table;
use crate::reconcile::{Layout, ResolvedDisk};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Filesystem type of a recreated default datastore
pub const DEFAULT_FS_TYPE: &str = "vmfs6";

// =============================================================================
// Extent Listing
// =============================================================================

/// One row of `esxcli storage vmfs extent list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeExtent {
    pub volume: String,
    pub uuid: String,
    pub extent_number: u32,
    /// Device identifier
    pub device: String,
    pub partition: u32,
}

/// Parse the extent listing. Volume names may contain spaces, so every row
/// is read from the right.
pub fn parse_extent_list(text: &str) -> Vec<VolumeExtent> {
    parse_table(text)
        .into_iter()
        .filter_map(|row| {
            let [name @ .., uuid, extent_number, device, partition] = row.as_slice() else {
                return None;
            };
            if name.is_empty() {
                return None;
            }
            Some(VolumeExtent {
                volume: name.join(" "),
                uuid: uuid.to_string(),
                extent_number: extent_number.parse().ok()?,
                device: device.to_string(),
                partition: partition.parse().ok()?,
            })
        })
        .collect()
}

// =============================================================================
// Builder
// =============================================================================

/// A datastore created during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltDatastore {
    pub name: String,
    pub head: PartitionTarget,
    /// Number of extents attached after the head
    pub extents: usize,
}

/// What happened to the installer's default datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDatastore {
    /// Partition resized and volume grown
    Extended,
    /// Already spans the whole disk
    AlreadyFull,
    /// Absent, created again on the reserved partition
    Recreated,
    /// Lives on a disk other than the installation disk
    Elsewhere,
}

/// Creates and grows VMFS datastores
pub struct DatastoreBuilder<'a> {
    volumes: &'a dyn VolumeTool,
    planner: PartitionPlanner<'a>,
}

impl<'a> DatastoreBuilder<'a> {
    pub fn new(volumes: &'a dyn VolumeTool, planner: PartitionPlanner<'a>) -> Self {
        Self { volumes, planner }
    }

    /// Build every datastore of the layout, in declared order
    pub fn build_all(&mut self, layout: &Layout) -> Result<Vec<BuiltDatastore>> {
        let mut built = Vec::with_capacity(layout.datastores.len());

        for spec in layout.datastores.values() {
            let targets = spec
                .devices
                .iter()
                .map(|id| {
                    layout.resolve_partition(id).ok_or_else(|| {
                        Error::Internal(format!(
                            "Datastore {} refers to unresolved partition {}",
                            spec.id, id
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for (disk, target) in &targets {
                self.ensure(disk, target)?;
            }

            let Some(((_, head), extents)) = targets.split_first() else {
                return Err(Error::Internal(format!("Datastore {} has no partitions", spec.id)));
            };

            self.volumes.create_volume(&spec.fs_type, &spec.name, head)?;
            for (_, extent) in extents {
                self.volumes.attach_extent(head, extent)?;
            }

            info!(
                "Datastore {} created on {} with {} additional extent(s)",
                spec.name,
                head,
                extents.len()
            );
            built.push(BuiltDatastore {
                name: spec.name.clone(),
                head: head.clone(),
                extents: extents.len(),
            });
        }

        Ok(built)
    }

    /// Grow the installer's datastore over the free space of `boot`, or
    /// create it again when the installer's datastore is gone
    pub fn extend_default(&mut self, boot: &ResolvedDisk) -> Result<DefaultDatastore> {
        let platform = self.planner.platform();
        let name = platform.default_datastore();
        let extents = parse_extent_list(&self.volumes.volume_extents()?);

        let Some(extent) = extents.iter().find(|e| e.volume == name) else {
            let target = PartitionTarget::new(&boot.device_path, platform.reserved_partition());
            info!("Datastore {} not found, creating it on {}", name, target);
            self.ensure(boot, &target)?;
            self.volumes.create_volume(DEFAULT_FS_TYPE, name, &target)?;
            return Ok(DefaultDatastore::Recreated);
        };

        if extent.device != boot.identifier {
            warn!(
                "Datastore {} lives on {}, not on installation disk {}; leaving it alone",
                name, extent.device, boot.identifier
            );
            return Ok(DefaultDatastore::Elsewhere);
        }

        if !self.planner.extend_to_end(&boot.device_path, extent.partition)? {
            info!("Datastore {} already fills {}", name, boot.device_path);
            return Ok(DefaultDatastore::AlreadyFull);
        }

        let target = PartitionTarget::new(&boot.device_path, extent.partition);
        self.volumes.grow_volume(&target)?;
        info!("Datastore {} extended on {}", name, target);
        Ok(DefaultDatastore::Extended)
    }

    fn ensure(&mut self, disk: &ResolvedDisk, target: &PartitionTarget) -> Result<()> {
        match self.planner.ensure_partition(disk, target.number)? {
            PlanOutcome::Declined => {
                debug!("Using existing installer partition {}", target);
            }
            PlanOutcome::AlreadyPresent | PlanOutcome::Created(_) => {}
        }
        Ok(())
    }
}
