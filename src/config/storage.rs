//! Storage Config Decoding
//!
//! Decodes the declarative storage layout handed over by the provisioning
//! system. The document is either a bare storage section:
//!
//! ```yaml
//! version: 1
//! config:
//!   - {id: disk0, type: disk, serial: ABC123, ptable: gpt, grub_device: true}
//!   - {id: disk0-part1, type: partition, device: disk0, number: 1}
//!   - {id: vmfs6-0, type: vmfs6, name: datastore2, devices: [disk0-part1]}
//! ```
//!
//! or a full provisioning config carrying that section under `storage`.

use crate::domain::ports::PartitionTableKind;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

/// The only storage config schema version understood
pub const SUPPORTED_VERSION: u64 = 1;

// =============================================================================
// Config Entries
// =============================================================================

/// How a disk's contents are cleared before partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipePolicy {
    /// Overwrite the first logical block only
    #[serde(alias = "superblock-recursive", alias = "pvremove")]
    Superblock,
    /// Overwrite the whole device with zero bytes
    Zero,
    /// Overwrite the whole device with random bytes
    Random,
}

/// A disk declared in the storage config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalDisk {
    pub id: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub model: String,
    /// Serial as declared, with all whitespace removed
    #[serde(default, deserialize_with = "normalized_serial")]
    pub serial: String,
    /// Whether ESXi itself is installed on this disk
    #[serde(default, alias = "boot_disk")]
    pub grub_device: bool,
    #[serde(default)]
    pub ptable: PartitionTableKind,
    #[serde(default)]
    pub wipe: Option<WipePolicy>,
}

impl LogicalDisk {
    pub fn is_boot_disk(&self) -> bool {
        self.grub_device
    }
}

/// A partition declared on a disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPartition {
    pub id: String,
    /// Owning disk id
    pub device: String,
    pub number: u32,
}

/// A VMFS datastore spanning one or more partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreSpec {
    pub id: String,
    pub name: String,
    /// Partition ids; the first is the head extent
    pub devices: Vec<String>,
    /// Filesystem type taken from the entry type (vmfs5, vmfs6)
    #[serde(default = "default_fs_type")]
    pub fs_type: String,
}

impl DatastoreSpec {
    /// Partition id of the head extent
    pub fn head(&self) -> Option<&str> {
        self.devices.first().map(String::as_str)
    }

    /// Partition ids of the additional extents, in declared order
    pub fn extents(&self) -> &[String] {
        self.devices.get(1..).unwrap_or(&[])
    }
}

fn default_fs_type() -> String {
    "vmfs6".to_string()
}

/// Accept a string or any other YAML scalar; serials and model numbers
/// made only of digits are decoded as numbers by YAML
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(String::new()),
        Some(serde_yaml::Value::String(s)) => Ok(s),
        Some(serde_yaml::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

fn normalized_serial<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = scalar_string(deserializer)?;
    Ok(normalize_serial(&raw))
}

/// Remove every whitespace character from a declared serial
pub fn normalize_serial(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

// =============================================================================
// Storage Config
// =============================================================================

#[derive(Debug, Deserialize)]
struct StorageSection {
    version: u64,
    #[serde(default)]
    config: Vec<serde_yaml::Value>,
}

/// Decoded storage layout, keyed by config id in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageConfig {
    pub disks: IndexMap<String, LogicalDisk>,
    pub partitions: IndexMap<String, LogicalPartition>,
    pub datastores: IndexMap<String, DatastoreSpec>,
    /// Document text the config was decoded from
    #[serde(skip)]
    source: String,
}

impl StorageConfig {
    /// Read and decode a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Decode a config document (YAML, or JSON as its subset)
    pub fn parse(text: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        let section_value = match document.get("storage") {
            Some(storage) => storage.clone(),
            None => document,
        };

        let section: StorageSection = serde_yaml::from_value(section_value)?;
        if section.version != SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion {
                version: section.version,
            });
        }

        let mut config = StorageConfig {
            source: text.to_string(),
            ..Default::default()
        };
        for entry in section.config {
            config.insert_entry(entry)?;
        }
        config.validate()?;

        Ok(config)
    }

    /// The document as it was handed over, ignored entries included
    pub fn source(&self) -> &str {
        &self.source
    }

    fn insert_entry(&mut self, entry: serde_yaml::Value) -> Result<()> {
        let entry_type = entry
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Configuration("Config entry without a type".into()))?
            .to_string();

        match entry_type.as_str() {
            "disk" => {
                let disk: LogicalDisk = serde_yaml::from_value(entry)?;
                self.check_unique(&disk.id)?;
                self.disks.insert(disk.id.clone(), disk);
            }
            "partition" => {
                let partition: LogicalPartition = serde_yaml::from_value(entry)?;
                self.check_unique(&partition.id)?;
                self.partitions.insert(partition.id.clone(), partition);
            }
            "vmfs5" | "vmfs6" => {
                let mut datastore: DatastoreSpec = serde_yaml::from_value(entry)?;
                datastore.fs_type = entry_type.clone();
                self.check_unique(&datastore.id)?;
                self.datastores.insert(datastore.id.clone(), datastore);
            }
            other => {
                debug!("Ignoring storage config entry of type {}", other);
            }
        }

        Ok(())
    }

    fn check_unique(&self, id: &str) -> Result<()> {
        if self.disks.contains_key(id)
            || self.partitions.contains_key(id)
            || self.datastores.contains_key(id)
        {
            return Err(Error::Configuration(format!("Duplicate config id {}", id)));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut boot: Option<&str> = None;
        for disk in self.disks.values().filter(|d| d.is_boot_disk()) {
            if let Some(first) = boot {
                return Err(Error::DuplicateBootDisk {
                    first: first.to_string(),
                    second: disk.id.clone(),
                });
            }
            boot = Some(disk.id.as_str());
        }

        for partition in self.partitions.values() {
            if !self.disks.contains_key(&partition.device) {
                return Err(Error::Configuration(format!(
                    "Partition {} refers to unknown disk {}",
                    partition.id, partition.device
                )));
            }
        }

        for datastore in self.datastores.values() {
            if datastore.devices.is_empty() {
                return Err(Error::Configuration(format!(
                    "Datastore {} lists no partitions",
                    datastore.id
                )));
            }
            if let Some(missing) = datastore
                .devices
                .iter()
                .find(|id| !self.partitions.contains_key(*id))
            {
                return Err(Error::Configuration(format!(
                    "Datastore {} refers to unknown partition {}",
                    datastore.id, missing
                )));
            }
        }

        Ok(())
    }
}
