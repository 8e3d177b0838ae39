//! In-memory host used by tests
//!
//! Serves canned inventory text and keeps a small model of partition tables
//! and VMFS extents so that planning decisions made on later calls observe
//! the effect of earlier mutations. Every mutation is recorded in order.

use crate::domain::ports::{
    BlockWriter, InventorySource, NewPartition, OverwriteSource, PartitionTableKind,
    PartitionTarget, PartitionTool, VolumeTool,
};
use crate::error::{Error, Result};
use crate::provision::partition::VMFS_PARTITION_GUID;
use std::cell::RefCell;
use std::collections::BTreeMap;

const SYSTEM_GUID: &str = "C12A7328F81F11D2BA4B00A0C93EC93B";
const LINUX_GUID: &str = "EBD0A0A2B9E5443387C068B6B72699C7";
const VMFSL_GUID: &str = "4EB2EA3978554790A79EFAE495E21F8D";
const COREDUMP_GUID: &str = "9D27538040AD11DBBF97000C2911D1B8";

/// A mutation performed against the fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateTable { device: String, kind: PartitionTableKind },
    AddPartition { device: String, partition: NewPartition },
    DeletePartition { device: String, number: u32 },
    ResizePartition { device: String, number: u32, start: u64, end: u64 },
    RepairTable { device: String },
    UnmountAll,
    Rescan,
    CreateVolume { fs_type: String, name: String, head: PartitionTarget },
    AttachExtent { head: PartitionTarget, extent: PartitionTarget },
    GrowVolume { target: PartitionTarget },
    Overwrite { device: String, source: OverwriteSource, block_size: u32, blocks: Option<u64> },
    Sync,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreateTable { .. } => "create_table",
            Call::AddPartition { .. } => "add_partition",
            Call::DeletePartition { .. } => "delete_partition",
            Call::ResizePartition { .. } => "resize_partition",
            Call::RepairTable { .. } => "repair_table",
            Call::UnmountAll => "unmount_all",
            Call::Rescan => "rescan",
            Call::CreateVolume { .. } => "create_volume",
            Call::AttachExtent { .. } => "attach_extent",
            Call::GrowVolume { .. } => "grow_volume",
            Call::Overwrite { .. } => "overwrite",
            Call::Sync => "sync",
        }
    }
}

/// Partition table state of one fake disk
#[derive(Debug, Clone)]
pub struct FakeDisk {
    pub label: Option<PartitionTableKind>,
    pub total_sectors: u64,
    pub last_usable: u64,
    /// (number, start, end, type guid)
    pub entries: Vec<(u32, u64, u64, String)>,
}

impl FakeDisk {
    /// A disk with no partition table
    pub fn blank(total_sectors: u64) -> Self {
        Self {
            label: None,
            total_sectors,
            last_usable: total_sectors - 34,
            entries: Vec::new(),
        }
    }

    /// An ESXi 7 installation disk with datastore1 on partition 8
    pub fn esxi7_boot(total_sectors: u64) -> Self {
        let last_usable = total_sectors - 34;
        Self {
            label: Some(PartitionTableKind::Gpt),
            total_sectors,
            last_usable,
            entries: vec![
                (1, 64, 204_863, SYSTEM_GUID.to_string()),
                (5, 208_896, 8_595_455, LINUX_GUID.to_string()),
                (6, 8_597_504, 16_984_063, LINUX_GUID.to_string()),
                (7, 16_986_112, 268_435_455, VMFSL_GUID.to_string()),
                (8, 268_437_504, last_usable, VMFS_PARTITION_GUID.to_string()),
            ],
        }
    }

    /// An ESXi 6 installation disk with datastore1 on partition 3
    pub fn esxi6_boot(total_sectors: u64) -> Self {
        let last_usable = total_sectors - 34;
        Self {
            label: Some(PartitionTableKind::Gpt),
            total_sectors,
            last_usable,
            entries: vec![
                (1, 64, 8_191, SYSTEM_GUID.to_string()),
                (5, 8_224, 520_191, LINUX_GUID.to_string()),
                (6, 520_224, 1_032_191, LINUX_GUID.to_string()),
                (7, 1_032_224, 1_257_471, COREDUMP_GUID.to_string()),
                (8, 1_257_504, 1_843_199, LINUX_GUID.to_string()),
                (9, 1_843_200, 7_086_079, COREDUMP_GUID.to_string()),
                (2, 7_086_080, 15_472_639, LINUX_GUID.to_string()),
                (3, 15_472_640, last_usable, VMFS_PARTITION_GUID.to_string()),
            ],
        }
    }

    /// Drop the datastore partition, keeping the rest of the layout
    pub fn without_partition(mut self, number: u32) -> Self {
        self.entries.retain(|(n, ..)| *n != number);
        self
    }

    /// Grow the disk, as seen after an image was written to a larger drive
    pub fn grown_to(mut self, total_sectors: u64) -> Self {
        self.total_sectors = total_sectors;
        self.last_usable = total_sectors - 34;
        self
    }

    fn render(&self) -> String {
        let label = self.label.map(|k| k.to_string()).unwrap_or_else(|| "unknown".into());
        let cylinders = self.total_sectors / (255 * 63);
        let mut out = format!("{}\n{} 255 63 {}\n", label, cylinders, self.total_sectors);
        for (number, start, end, guid) in &self.entries {
            let name = if guid == VMFS_PARTITION_GUID { "vmfs" } else { "linuxNative" };
            out.push_str(&format!("{} {} {} {} {} 0\n", number, start, end, guid, name));
        }
        out
    }
}

#[derive(Debug, Clone)]
struct FakeExtent {
    volume: String,
    device: String,
    partition: u32,
}

/// Fake host implementing every capability port
#[derive(Debug, Default)]
pub struct FakeHost {
    version: String,
    nvme: Vec<(String, String)>,
    device_list: String,
    capacities: String,
    paths: String,
    disks: RefCell<BTreeMap<String, FakeDisk>>,
    extents: RefCell<Vec<FakeExtent>>,
    calls: RefCell<Vec<Call>>,
    failing: Option<&'static str>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            version: "VMware ESXi 7.0.3 build-19193900".to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, banner: &str) -> Self {
        self.version = banner.to_string();
        self
    }

    pub fn with_nvme_controller(mut self, adapter: &str, serial: &str, model: &str) -> Self {
        let detail = format!(
            "Controller Identify Info:\n   PCIVID: 0x1c5c\n   Serial Number: {}\n   \
             Model Number: {}\n",
            serial, model
        );
        self.nvme.push((adapter.to_string(), detail));
        self
    }

    pub fn with_inventory(mut self, devices: &str, capacities: &str, paths: &str) -> Self {
        self.device_list = devices.to_string();
        self.capacities = capacities.to_string();
        self.paths = paths.to_string();
        self
    }

    pub fn with_disk(self, device_path: &str, disk: FakeDisk) -> Self {
        self.disks.borrow_mut().insert(device_path.to_string(), disk);
        self
    }

    /// Register an existing VMFS extent on `device_identifier`
    pub fn with_extent(self, volume: &str, device_identifier: &str, partition: u32) -> Self {
        self.extents.borrow_mut().push(FakeExtent {
            volume: volume.to_string(),
            device: device_identifier.to_string(),
            partition,
        });
        self
    }

    /// Make the named mutation fail like a tool exiting non-zero
    pub fn failing(mut self, call_name: &'static str) -> Self {
        self.failing = Some(call_name);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(Call::name).collect()
    }

    pub fn count(&self, call_name: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.name() == call_name).count()
    }

    pub fn disk(&self, device_path: &str) -> Option<FakeDisk> {
        self.disks.borrow().get(device_path).cloned()
    }

    fn record(&self, call: Call) -> Result<()> {
        if self.failing == Some(call.name()) {
            return Err(Error::CommandFailed {
                command: call.name().to_string(),
                status: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }

    fn with_fake_disk<T>(&self, device: &str, f: impl FnOnce(&mut FakeDisk) -> T) -> Result<T> {
        let mut disks = self.disks.borrow_mut();
        let disk = disks.get_mut(device).ok_or_else(|| Error::CommandFailed {
            command: format!("partedUtil {}", device),
            status: Some(255),
            stderr: "No such file or directory".to_string(),
        })?;
        Ok(f(disk))
    }
}

fn identifier_of(device_path: &str) -> String {
    device_path.rsplit('/').next().unwrap_or(device_path).to_string()
}

impl InventorySource for FakeHost {
    fn nvme_adapters(&self) -> Result<String> {
        let mut out = String::from("HBA Name  Status  Signature\n--------  ------  ---------\n");
        for (i, (adapter, _)) in self.nvme.iter().enumerate() {
            out.push_str(&format!("{}  Online  nvmeMgmt-nvme{:08}\n", adapter, i));
        }
        Ok(out)
    }

    fn nvme_controller_detail(&self, adapter: &str) -> Result<String> {
        self.nvme
            .iter()
            .find(|(a, _)| a == adapter)
            .map(|(_, detail)| detail.clone())
            .ok_or_else(|| Error::CommandFailed {
                command: format!("esxcli nvme device get -A {}", adapter),
                status: Some(1),
                stderr: "Unable to find adapter".to_string(),
            })
    }

    fn device_list(&self) -> Result<String> {
        Ok(self.device_list.clone())
    }

    fn device_capacities(&self) -> Result<String> {
        Ok(self.capacities.clone())
    }

    fn path_list(&self) -> Result<String> {
        Ok(self.paths.clone())
    }

    fn platform_version(&self) -> Result<String> {
        Ok(self.version.clone())
    }
}

impl PartitionTool for FakeHost {
    fn partition_table(&self, device: &str) -> Result<String> {
        self.with_fake_disk(device, |disk| disk.render())
    }

    fn usable_sectors(&self, device: &str) -> Result<String> {
        self.with_fake_disk(device, |disk| format!("34 {}\n", disk.last_usable))
    }

    fn create_partition_table(&self, device: &str, kind: PartitionTableKind) -> Result<()> {
        self.record(Call::CreateTable { device: device.to_string(), kind })?;
        self.with_fake_disk(device, |disk| {
            disk.label = Some(kind);
            disk.entries.clear();
        })
    }

    fn add_partition(
        &self,
        device: &str,
        _kind: PartitionTableKind,
        partition: &NewPartition,
    ) -> Result<()> {
        self.record(Call::AddPartition {
            device: device.to_string(),
            partition: partition.clone(),
        })?;
        self.with_fake_disk(device, |disk| {
            disk.entries.push((
                partition.number,
                partition.start_sector,
                partition.end_sector,
                partition.type_guid.clone(),
            ));
        })
    }

    fn delete_partition(&self, device: &str, number: u32) -> Result<()> {
        self.record(Call::DeletePartition { device: device.to_string(), number })?;
        let identifier = identifier_of(device);
        self.extents
            .borrow_mut()
            .retain(|e| !(e.device == identifier && e.partition == number));
        self.with_fake_disk(device, |disk| disk.entries.retain(|(n, ..)| *n != number))
    }

    fn resize_partition(&self, device: &str, number: u32, start: u64, end: u64) -> Result<()> {
        self.record(Call::ResizePartition { device: device.to_string(), number, start, end })?;
        self.with_fake_disk(device, |disk| {
            for entry in disk.entries.iter_mut().filter(|(n, ..)| *n == number) {
                entry.1 = start;
                entry.2 = end;
            }
        })
    }

    fn repair_partition_table(&self, device: &str) -> Result<()> {
        self.record(Call::RepairTable { device: device.to_string() })
    }

    fn unmount_all_filesystems(&self) -> Result<()> {
        self.record(Call::UnmountAll)
    }

    fn rescan_storage(&self) -> Result<()> {
        self.record(Call::Rescan)
    }
}

impl VolumeTool for FakeHost {
    fn create_volume(&self, fs_type: &str, name: &str, head: &PartitionTarget) -> Result<()> {
        self.record(Call::CreateVolume {
            fs_type: fs_type.to_string(),
            name: name.to_string(),
            head: head.clone(),
        })?;
        self.extents.borrow_mut().push(FakeExtent {
            volume: name.to_string(),
            device: identifier_of(&head.device_path),
            partition: head.number,
        });
        Ok(())
    }

    fn attach_extent(&self, head: &PartitionTarget, extent: &PartitionTarget) -> Result<()> {
        self.record(Call::AttachExtent {
            head: head.clone(),
            extent: extent.clone(),
        })?;
        let head_device = identifier_of(&head.device_path);
        let volume = self
            .extents
            .borrow()
            .iter()
            .find(|e| e.device == head_device && e.partition == head.number)
            .map(|e| e.volume.clone())
            .unwrap_or_default();
        self.extents.borrow_mut().push(FakeExtent {
            volume,
            device: identifier_of(&extent.device_path),
            partition: extent.number,
        });
        Ok(())
    }

    fn grow_volume(&self, target: &PartitionTarget) -> Result<()> {
        self.record(Call::GrowVolume { target: target.clone() })
    }

    fn volume_extents(&self) -> Result<String> {
        let mut out = String::from(
            "Volume Name  VMFS UUID                            Extent Number  Device Name  Partition\n\
             -----------  -----------------------------------  -------------  -----------  ---------\n",
        );
        let extents = self.extents.borrow();
        for (i, extent) in extents.iter().enumerate() {
            let number = extents[..i].iter().filter(|e| e.volume == extent.volume).count();
            out.push_str(&format!(
                "{}  61e0ad2e-7b7e4a90-1f1a-0cc47a0b1c{:02x}  {}  {}  {}\n",
                extent.volume, i, number, extent.device, extent.partition
            ));
        }
        Ok(out)
    }
}

impl BlockWriter for FakeHost {
    fn overwrite(
        &self,
        device: &str,
        source: OverwriteSource,
        block_size: u32,
        blocks: Option<u64>,
    ) -> Result<()> {
        self.record(Call::Overwrite {
            device: device.to_string(),
            source,
            block_size,
            blocks,
        })
    }

    fn sync(&self) -> Result<()> {
        self.record(Call::Sync)
    }
}

// =============================================================================
// Inventory Fixtures
// =============================================================================

pub const DEVICE_LIST: &str = "\
t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
   Display Name: Local ATA Disk (t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__)
   Has Settable Display Name: true
   Size: 457862
   Device Type: Direct-Access
   Devfs Path: /vmfs/devices/disks/t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
   Vendor: ATA
   Model: INTEL SSDSC2KB48
   Other Names:
      vml.0100000000504859463939393939393941343830424

eui.0025388b91b1c7a1
   Display Name: Local NVMe Disk (eui.0025388b91b1c7a1)
   Size: 1831420
   Devfs Path: /vmfs/devices/disks/eui.0025388b91b1c7a1
   Vendor: NVMe
   Model: Dell Ent NVMe CM6
   Other Names:
      vml.050000000000253880
      t10.NVMe____Dell_Ent_NVMe_CM6_RI_1.92TB_Y1P0A00QTCE8

naa.600508b1001c0ef9
   Display Name: Local HP Logical Volume (naa.600508b1001c0ef9)
   Size: 286070
   Vendor: HP
   Model: LOGICAL VOLUME
";

pub const CAPACITIES: &str = "\
Device                                                                 Physical Blocksize  Logical Blocksize  Logical Block Count    Size  Format Type
---------------------------------------------------------------------  ------------------  -----------------  -------------------  ------  -----------
t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__                4096                512            937703088  457862 MiB  512e
eui.0025388b91b1c7a1                                                                 4096               4096            468843606  1831420 MiB  4Kn
";

pub const PATHS: &str = "\
sata.vmhba0-sata.0:0-t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
   UID: sata.vmhba0-sata.0:0-t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
   Runtime Name: vmhba0:C0:T0:L0
   Device: t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
   Device Display Name: Local ATA Disk (t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__)
   Adapter: vmhba0
   Controller: Not Applicable

pcie.3b00-pcie.0:0-eui.0025388b91b1c7a1
   Runtime Name: vmhba2:C0:T0:L0
   Device: eui.0025388b91b1c7a1
   Device Display Name: Local NVMe Disk (eui.0025388b91b1c7a1)
   Adapter: vmhba2
   Controller: nqn.2014-08.org.nvmexpress_1c5c_Dell_Ent_NVMe_CM6_RI_1.92TB_Y1P0A00QTCE8
";

