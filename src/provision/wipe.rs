//! Disk Wipe Executor
//!
//! Clears every resolved disk according to its wipe policy before any
//! partition is created. The installation disk is never overwritten: its
//! GPT is repaired instead, and its default datastore partition is removed
//! when the config brings a datastore layout of its own.

use super::partition::PartitionTable;
use crate::config::WipePolicy;
use crate::domain::platform::PlatformGeneration;
use crate::domain::ports::{BlockWriter, OverwriteSource, PartitionTool};
use crate::error::Result;
use crate::reconcile::{Layout, ResolvedDisk};
use serde::Serialize;
use tracing::{debug, info};

/// The single action taken for one disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WipeAction {
    /// Fix the backup GPT header of the installation disk
    RepairBootDisk,
    /// Overwrite `blocks` logical blocks, or the whole device when `None`
    Overwrite {
        source: OverwriteSource,
        blocks: Option<u64>,
    },
    Nothing,
}

impl WipeAction {
    /// Action for a disk; the installation disk flag takes precedence over
    /// any wipe policy
    pub fn for_disk(disk: &ResolvedDisk) -> Self {
        if disk.is_boot_disk() {
            return WipeAction::RepairBootDisk;
        }
        match disk.config.wipe {
            Some(WipePolicy::Superblock) => WipeAction::Overwrite {
                source: OverwriteSource::Zero,
                blocks: Some(1),
            },
            Some(WipePolicy::Zero) => WipeAction::Overwrite {
                source: OverwriteSource::Zero,
                blocks: None,
            },
            Some(WipePolicy::Random) => WipeAction::Overwrite {
                source: OverwriteSource::Random,
                blocks: None,
            },
            None => WipeAction::Nothing,
        }
    }
}

/// Action applied to one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipeRecord {
    pub disk: String,
    pub device: String,
    pub action: WipeAction,
    /// The default datastore partition was deleted
    pub reclaimed: bool,
}

/// Runs wipe policies over a resolved layout
pub struct WipeExecutor<'a> {
    tool: &'a dyn PartitionTool,
    writer: &'a dyn BlockWriter,
    platform: PlatformGeneration,
}

impl<'a> WipeExecutor<'a> {
    pub fn new(
        tool: &'a dyn PartitionTool,
        writer: &'a dyn BlockWriter,
        platform: PlatformGeneration,
    ) -> Self {
        Self {
            tool,
            writer,
            platform,
        }
    }

    /// Wipe every disk of `layout`, then flush. `custom_layout` tells whether
    /// the config declares its own datastores.
    pub fn run(&self, layout: &Layout, custom_layout: bool) -> Result<Vec<WipeRecord>> {
        let mut records = Vec::with_capacity(layout.disks.len());

        for disk in layout.disks.values() {
            let action = WipeAction::for_disk(disk);
            let mut reclaimed = false;

            match action {
                WipeAction::RepairBootDisk => {
                    reclaimed = self.repair_boot_disk(disk, custom_layout)?;
                }
                WipeAction::Overwrite { source, blocks } => {
                    info!(
                        "Wiping disk {} ({}) from {}{}",
                        disk.id(),
                        disk.device_path,
                        source.device(),
                        if blocks.is_some() { ", first block only" } else { "" }
                    );
                    self.writer
                        .overwrite(&disk.device_path, source, disk.block_size, blocks)?;
                }
                WipeAction::Nothing => {
                    debug!("No wipe configured for disk {}", disk.id());
                }
            }

            records.push(WipeRecord {
                disk: disk.id().to_string(),
                device: disk.device_path.clone(),
                action,
                reclaimed,
            });
        }

        self.writer.sync()?;
        Ok(records)
    }

    fn repair_boot_disk(&self, disk: &ResolvedDisk, custom_layout: bool) -> Result<bool> {
        let device = disk.device_path.as_str();
        self.tool.repair_partition_table(device)?;

        if !custom_layout {
            return Ok(false);
        }

        let reserved = self.platform.reserved_partition();
        let table = PartitionTable::parse(device, &self.tool.partition_table(device)?)?;
        if !table.contains(reserved) {
            debug!("Default datastore partition {} of {} is already gone", reserved, device);
            return Ok(false);
        }

        info!(
            "Removing default datastore partition {} of installation disk {}",
            reserved, device
        );
        self.tool.unmount_all_filesystems()?;
        self.tool.delete_partition(device, reserved)?;
        self.tool.rescan_storage()?;
        Ok(true)
    }
}
