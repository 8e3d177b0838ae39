//! Partition Planner
//!
//! Places new partitions directly after the last occupied sector of a disk
//! and runs them to the disk's last usable sector. A partition number that
//! already exists on the device is never created twice.
//!
//! `partedUtil getptbl` reports a table as:
//!
//! ```text
//! gpt
//! 58369 255 63 937703088
//! 1 64 204863 C12A7328F81F11D2BA4B00A0C93EC93B systemPartition 128
//! 8 268437504 937703054 AA31E02A400F11DB9590000C2911D1B8 vmfs 0
//! ```
//!
//! The second line is the disk geometry (cylinders, heads, sectors per
//! track, total sectors); each following line is one partition.

use crate::domain::platform::PlatformGeneration;
use crate::domain::ports::{NewPartition, PartitionTool};
use crate::error::{Error, Result};
use crate::reconcile::ResolvedDisk;
use std::collections::HashSet;
use tracing::{debug, info};

/// Partition type of every partition this tool creates (VMFS data)
pub const VMFS_PARTITION_GUID: &str = "AA31E02A400F11DB9590000C2911D1B8";

// =============================================================================
// Partition Table Report
// =============================================================================

/// Disk geometry line of a partition table report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u64,
    pub heads: u64,
    pub sectors_per_track: u64,
    pub total_sectors: u64,
}

/// One partition of a partition table report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub number: u32,
    pub start_sector: u64,
    pub end_sector: u64,
    pub type_id: String,
}

/// Parsed `partedUtil getptbl` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    /// Table label (gpt, msdos, unknown)
    pub label: String,
    pub geometry: Geometry,
    pub entries: Vec<PartitionEntry>,
}

impl PartitionTable {
    pub fn parse(device: &str, text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let table_error = |reason: String| Error::PartitionTable {
            device: device.to_string(),
            reason,
        };

        let label = lines
            .next()
            .ok_or_else(|| table_error("empty partition table report".into()))?
            .to_string();

        let geometry_line = lines
            .next()
            .ok_or_else(|| table_error("missing geometry line".into()))?;
        let numbers = parse_numbers(geometry_line, 4)
            .ok_or_else(|| table_error(format!("bad geometry line: {}", geometry_line)))?;
        let geometry = Geometry {
            cylinders: numbers[0],
            heads: numbers[1],
            sectors_per_track: numbers[2],
            total_sectors: numbers[3],
        };

        let entries = lines
            .map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                let parsed = (fields.len() >= 4)
                    .then(|| {
                        Some(PartitionEntry {
                            number: fields[0].parse().ok()?,
                            start_sector: fields[1].parse().ok()?,
                            end_sector: fields[2].parse().ok()?,
                            type_id: fields[3].to_string(),
                        })
                    })
                    .flatten();
                parsed.ok_or_else(|| table_error(format!("bad partition line: {}", line)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            label,
            geometry,
            entries,
        })
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.iter().any(|e| e.number == number)
    }

    pub fn entry(&self, number: u32) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.number == number)
    }

    /// First sector after every occupied region. On a table without
    /// partitions the first track stays reserved.
    pub fn next_free_sector(&self) -> u64 {
        let last_used = self
            .entries
            .iter()
            .map(|e| e.end_sector)
            .max()
            .unwrap_or(0)
            .max(self.geometry.sectors_per_track);
        last_used + 1
    }
}

/// First and last usable sectors from `partedUtil getUsableSectors`
/// ("34 937703054")
pub fn parse_usable_sectors(device: &str, text: &str) -> Result<(u64, u64)> {
    match parse_numbers(text.trim(), 2).as_deref() {
        Some(&[first, last]) => Ok((first, last)),
        _ => Err(Error::PartitionTable {
            device: device.to_string(),
            reason: format!("bad usable sectors report: {}", text.trim()),
        }),
    }
}

fn parse_numbers(line: &str, count: usize) -> Option<Vec<u64>> {
    let numbers: Vec<u64> = line
        .split_whitespace()
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    (numbers.len() == count).then_some(numbers)
}

// =============================================================================
// Planner
// =============================================================================

/// What the planner did for one partition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Created(NewPartition),
    /// The partition number already exists on the device
    AlreadyPresent,
    /// Part of the installation disk's own layout, left alone
    Declined,
}

/// Creates partitions on resolved disks
pub struct PartitionPlanner<'a> {
    tool: &'a dyn PartitionTool,
    platform: PlatformGeneration,
    /// Devices that got a fresh partition table during this run
    labelled: HashSet<String>,
}

impl<'a> PartitionPlanner<'a> {
    pub fn new(tool: &'a dyn PartitionTool, platform: PlatformGeneration) -> Self {
        Self {
            tool,
            platform,
            labelled: HashSet::new(),
        }
    }

    pub fn platform(&self) -> PlatformGeneration {
        self.platform
    }

    /// Read and parse the current partition table of a device
    pub fn read_table(&self, device: &str) -> Result<PartitionTable> {
        PartitionTable::parse(device, &self.tool.partition_table(device)?)
    }

    /// Last usable sector of a device
    pub fn last_usable_sector(&self, device: &str) -> Result<u64> {
        let (_, last) = parse_usable_sectors(device, &self.tool.usable_sectors(device)?)?;
        Ok(last)
    }

    /// Make sure partition `number` exists on `disk`
    pub fn ensure_partition(&mut self, disk: &ResolvedDisk, number: u32) -> Result<PlanOutcome> {
        let device = disk.device_path.as_str();

        if disk.is_boot_disk() && disk.already_partitioned {
            let reserved = self.platform.reserved_partition();
            if number != reserved {
                debug!(
                    "Partition {} of installation disk {} belongs to the {} layout \
                     (reserved {}), not creating it",
                    number, device, self.platform, reserved
                );
                return Ok(PlanOutcome::Declined);
            }
        }

        let mut table = self.read_table(device)?;
        if table.contains(number) {
            debug!("Partition {} already exists on {}", number, device);
            return Ok(PlanOutcome::AlreadyPresent);
        }

        if self.needs_new_table(disk, &table) {
            self.tool.create_partition_table(device, disk.config.ptable)?;
            self.labelled.insert(device.to_string());
            table = self.read_table(device)?;
        }

        let start_sector = table.next_free_sector();
        let end_sector = self.last_usable_sector(device)?;
        if start_sector > end_sector {
            return Err(Error::PartitionTable {
                device: device.to_string(),
                reason: format!(
                    "no free space for partition {} (next free sector {}, last usable {})",
                    number, start_sector, end_sector
                ),
            });
        }

        let partition = NewPartition {
            number,
            start_sector,
            end_sector,
            type_guid: VMFS_PARTITION_GUID.to_string(),
        };
        info!(
            "Creating partition {} on {} ({}-{})",
            number, device, start_sector, end_sector
        );
        self.tool.add_partition(device, disk.config.ptable, &partition)?;

        Ok(PlanOutcome::Created(partition))
    }

    /// Move the end of partition `number` to the last usable sector of the
    /// device. Returns `false` when the partition already ends there.
    pub fn extend_to_end(&self, device: &str, number: u32) -> Result<bool> {
        let table = self.read_table(device)?;
        let entry = table.entry(number).ok_or_else(|| Error::PartitionTable {
            device: device.to_string(),
            reason: format!("partition {} does not exist", number),
        })?;

        let last_usable = self.last_usable_sector(device)?;
        if entry.end_sector >= last_usable {
            debug!("Partition {} of {} already ends at {}", number, device, entry.end_sector);
            return Ok(false);
        }

        info!(
            "Extending partition {} of {} from sector {} to {}",
            number, device, entry.end_sector, last_usable
        );
        self.tool
            .resize_partition(device, number, entry.start_sector, last_usable)?;
        Ok(true)
    }

    fn needs_new_table(&self, disk: &ResolvedDisk, table: &PartitionTable) -> bool {
        !disk.already_partitioned
            && !self.labelled.contains(&disk.device_path)
            && table.entries.is_empty()
    }
}
