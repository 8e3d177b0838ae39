//! Storage Device Scanner
//!
//! Builds the host's device catalog from three read-only passes:
//!
//! 1. NVMe controllers, each queried for its drive serial
//! 2. the bulk device listing, joined with per-device block sizes
//! 3. the path topology, attributing each device to its adapter
//!
//! Unparseable sections yield devices with an empty serial instead of
//! failing the scan; such devices never match a configured disk.

use super::nvme::NvmeDiscovery;
use super::report::{parse_records, parse_table};
use crate::domain::ports::{ControllerRecord, DeviceRecord, InventorySource, PathRecord};
use crate::error::Result;
use crate::hardware::serial::{extract_serial, identifier_in_display_name, parse_structured};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

// =============================================================================
// Constants
// =============================================================================

const DEVFS_DISKS: &str = "/vmfs/devices/disks";
const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Device listing fields holding alias identifiers
const ALIAS_FIELDS: [&str; 2] = ["Other Names", "Other UIDs"];

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Configuration for the hardware scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Directory device paths are synthesized under when the listing omits one
    pub devfs_root: String,
    /// Block size assumed when the capacity listing omits a device
    pub default_block_size: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            devfs_root: DEVFS_DISKS.to_string(),
            default_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Unparsed tool output, kept for post-mortem diagnostics
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawInventory {
    pub devices: String,
    pub capacities: String,
    pub paths: String,
    pub controllers: String,
}

/// Everything the scanner learned about the host
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub devices: Vec<DeviceRecord>,
    pub controllers: Vec<ControllerRecord>,
    pub paths: Vec<PathRecord>,
    #[serde(skip)]
    pub raw: RawInventory,
}

// =============================================================================
// Hardware Scanner
// =============================================================================

/// Scans the storage inventory of an ESXi host
pub struct HardwareScanner<'a> {
    source: &'a dyn InventorySource,
    config: ScannerConfig,
}

impl<'a> HardwareScanner<'a> {
    /// Create a new hardware scanner
    pub fn new(source: &'a dyn InventorySource, config: ScannerConfig) -> Self {
        Self { source, config }
    }

    /// Discover all storage hardware on the host
    pub fn discover(&self) -> Result<Inventory> {
        let nvme = NvmeDiscovery::discover(self.source)?;
        info!("Found {} NVMe controllers", nvme.controllers.len());

        let device_text = self.source.device_list()?;
        let capacity_text = self.source.device_capacities()?;
        let block_sizes = parse_block_sizes(&capacity_text);
        let mut devices = parse_device_list(&device_text, &block_sizes, &self.config);
        info!("Found {} storage devices", devices.len());

        let path_text = self.source.path_list()?;
        let paths = parse_path_list(&path_text);
        attribute_adapters(&mut devices, &paths);

        Ok(Inventory {
            devices,
            controllers: nvme.controllers,
            paths,
            raw: RawInventory {
                devices: device_text,
                capacities: capacity_text,
                paths: path_text,
                controllers: nvme.raw,
            },
        })
    }
}

/// Logical block size per device identifier from the capacity listing
pub fn parse_block_sizes(text: &str) -> HashMap<String, u32> {
    parse_table(text)
        .into_iter()
        .filter_map(|row| {
            // Device  Physical Blocksize  Logical Blocksize  ...
            let size = row.get(2)?.parse().ok()?;
            Some((row.first()?.to_string(), size))
        })
        .collect()
}

/// Parse the bulk device listing into device records
pub fn parse_device_list(
    text: &str,
    block_sizes: &HashMap<String, u32>,
    config: &ScannerConfig,
) -> Vec<DeviceRecord> {
    parse_records(text)
        .into_iter()
        .map(|record| {
            let identifier = record.name.trim().to_string();
            let structured = parse_structured(&identifier);

            let mut serial = extract_serial(&identifier).unwrap_or_default();
            let aliases: Vec<String> = ALIAS_FIELDS
                .iter()
                .flat_map(|key| record.field_block(key))
                .map(str::to_string)
                .collect();

            let mut alias_serials = Vec::new();
            for alias in &aliases {
                if let Some(alias_serial) = extract_serial(alias) {
                    if serial.is_empty() {
                        serial = alias_serial.clone();
                    }
                    alias_serials.push(alias_serial);
                }
            }
            if serial.is_empty() {
                debug!("No serial found for device {}", identifier);
            }

            let model = structured
                .map(|s| s.model.to_string())
                .or_else(|| record.field("Model").map(str::to_string))
                .unwrap_or_default();

            let size_mib = record
                .field("Size")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);

            let devfs_path = record
                .field("Devfs Path")
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}/{}", config.devfs_root, identifier));

            let block_size = block_sizes
                .get(&identifier)
                .copied()
                .unwrap_or(config.default_block_size);

            DeviceRecord {
                vendor: record.field("Vendor").unwrap_or_default().to_string(),
                identifier,
                aliases,
                alias_serials,
                serial,
                model,
                size_mib,
                block_size,
                devfs_path,
                adapter: None,
                controller: None,
            }
        })
        .collect()
}

/// Parse the path topology report
pub fn parse_path_list(text: &str) -> Vec<PathRecord> {
    parse_records(text)
        .into_iter()
        .filter_map(|record| {
            let device = record.field("Device")?.to_string();
            let adapter = record.field("Adapter")?.to_string();
            let controller = record.field("Controller").unwrap_or_default().to_string();

            let display_serial = record
                .field("Device Display Name")
                .and_then(identifier_in_display_name)
                .and_then(extract_serial)
                .or_else(|| extract_serial(&device));

            Some(PathRecord {
                runtime_name: record.field("Runtime Name").unwrap_or_default().to_string(),
                controller_serial: extract_serial(&controller),
                device,
                display_serial,
                adapter,
                controller,
            })
        })
        .collect()
}

/// Attribute devices to adapters by direct serial match. The first path
/// that matches a device wins.
fn attribute_adapters(devices: &mut [DeviceRecord], paths: &[PathRecord]) {
    for path in paths {
        let Some(serial) = path.display_serial.as_deref() else {
            continue;
        };

        if let Some(device) = devices
            .iter_mut()
            .find(|d| d.has_serial() && d.serial == serial && d.adapter.is_none())
        {
            debug!("Device {} is on adapter {}", device.identifier, path.adapter);
            device.adapter = Some(path.adapter.clone());
            device.controller = Some(path.controller.clone());
        }
    }
}
