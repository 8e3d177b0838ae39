//! ESXi Host Adapter
//!
//! Implements every capability port on top of the tools shipped with ESXi:
//! `esxcli`, `partedUtil`, `vmkfstools`, `dd`, `sync` and `vmware`.

use super::runner::CommandRunner;
use crate::domain::ports::{
    BlockWriter, InventorySource, NewPartition, OverwriteSource, PartitionTableKind,
    PartitionTarget, PartitionTool, VolumeTool,
};
use crate::error::{Error, Result};
use tracing::info;

/// Answers to the prompts `partedUtil fixGpt` asks before rewriting the
/// backup header
const FIX_GPT_ANSWERS: &str = "y\nFix\n";

/// Capability adapter for a live ESXi host
#[derive(Debug, Clone, Default)]
pub struct EsxiHost {
    runner: CommandRunner,
}

impl EsxiHost {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn esxcli(&self, args: &[&str]) -> Result<String> {
        self.runner.run("esxcli", args)
    }

    fn parted(&self, args: &[&str]) -> Result<String> {
        self.runner.run("partedUtil", args)
    }

    fn vmkfstools(&self, args: &[&str]) -> Result<String> {
        self.runner.run("vmkfstools", args)
    }
}

impl InventorySource for EsxiHost {
    fn nvme_adapters(&self) -> Result<String> {
        self.esxcli(&["nvme", "device", "list"])
    }

    fn nvme_controller_detail(&self, adapter: &str) -> Result<String> {
        self.esxcli(&["nvme", "device", "get", "-A", adapter])
    }

    fn device_list(&self) -> Result<String> {
        self.esxcli(&["storage", "core", "device", "list"])
    }

    fn device_capacities(&self) -> Result<String> {
        self.esxcli(&["storage", "core", "device", "capacity", "list"])
    }

    fn path_list(&self) -> Result<String> {
        self.esxcli(&["storage", "core", "path", "list"])
    }

    fn platform_version(&self) -> Result<String> {
        self.runner.run("vmware", &["-v"])
    }
}

impl PartitionTool for EsxiHost {
    fn partition_table(&self, device: &str) -> Result<String> {
        self.parted(&["getptbl", device])
    }

    fn usable_sectors(&self, device: &str) -> Result<String> {
        self.parted(&["getUsableSectors", device])
    }

    fn create_partition_table(&self, device: &str, kind: PartitionTableKind) -> Result<()> {
        info!("Creating {} partition table on {}", kind, device);
        self.parted(&["mklabel", device, &kind.to_string()])?;
        Ok(())
    }

    fn add_partition(
        &self,
        device: &str,
        kind: PartitionTableKind,
        partition: &NewPartition,
    ) -> Result<()> {
        let spec = format!(
            "{} {} {} {} 0",
            partition.number, partition.start_sector, partition.end_sector, partition.type_guid
        );
        info!("Adding partition \"{}\" to {}", spec, device);
        self.parted(&["add", device, &kind.to_string(), &spec])?;
        Ok(())
    }

    fn delete_partition(&self, device: &str, number: u32) -> Result<()> {
        info!("Deleting partition {} of {}", number, device);
        self.parted(&["delete", device, &number.to_string()])?;
        Ok(())
    }

    fn resize_partition(&self, device: &str, number: u32, start: u64, end: u64) -> Result<()> {
        info!("Resizing partition {} of {} to {}-{}", number, device, start, end);
        self.parted(&[
            "resize",
            device,
            &number.to_string(),
            &start.to_string(),
            &end.to_string(),
        ])?;
        Ok(())
    }

    fn repair_partition_table(&self, device: &str) -> Result<()> {
        info!("Repairing GPT backup header of {}", device);
        self.runner
            .run_with_input("partedUtil", &["fixGpt", device], Some(FIX_GPT_ANSWERS))?;
        Ok(())
    }

    fn unmount_all_filesystems(&self) -> Result<()> {
        info!("Unmounting all filesystems");
        self.esxcli(&["storage", "filesystem", "unmount", "-a"])?;
        Ok(())
    }

    fn rescan_storage(&self) -> Result<()> {
        info!("Rescanning storage adapters");
        self.esxcli(&["storage", "core", "adapter", "rescan", "--all"])?;
        Ok(())
    }
}

impl VolumeTool for EsxiHost {
    fn create_volume(&self, fs_type: &str, name: &str, head: &PartitionTarget) -> Result<()> {
        info!("Creating {} datastore {} on {}", fs_type, name, head);
        self.vmkfstools(&["-C", fs_type, "-S", name, &head.to_string()])?;
        Ok(())
    }

    fn attach_extent(&self, head: &PartitionTarget, extent: &PartitionTarget) -> Result<()> {
        info!("Spanning datastore on {} onto {}", head, extent);
        self.vmkfstools(&["-Z", &extent.to_string(), &head.to_string()])?;
        Ok(())
    }

    fn grow_volume(&self, target: &PartitionTarget) -> Result<()> {
        info!("Growing datastore on {}", target);
        let target = target.to_string();
        self.vmkfstools(&["--growfs", &target, &target])?;
        Ok(())
    }

    fn volume_extents(&self) -> Result<String> {
        self.esxcli(&["storage", "vmfs", "extent", "list"])
    }
}

impl BlockWriter for EsxiHost {
    fn overwrite(
        &self,
        device: &str,
        source: OverwriteSource,
        block_size: u32,
        blocks: Option<u64>,
    ) -> Result<()> {
        let input = format!("if={}", source.device());
        let output = format!("of={}", device);
        let bs = format!("bs={}", block_size);
        let mut args = vec![input.as_str(), output.as_str(), bs.as_str(), "conv=notrunc"];

        let count = blocks.map(|n| format!("count={}", n));
        if let Some(count) = count.as_deref() {
            args.push(count);
        }

        info!("Overwriting {} from {}", device, source.device());
        match self.runner.run("dd", &args) {
            Ok(_) => Ok(()),
            // dd fails with ENOSPC once it reaches the end of the device
            Err(Error::CommandFailed { stderr, .. })
                if blocks.is_none() && stderr.contains("No space left on device") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn sync(&self) -> Result<()> {
        self.runner.run("sync", &[])?;
        Ok(())
    }
}
