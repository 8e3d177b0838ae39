//! NVMe-specific Discovery
//!
//! Enumerates NVMe adapters and queries each controller for the serial of
//! its attached drive. The primary device listing cannot be trusted to
//! report NVMe serials the way other tools do, so the controller serials
//! are collected independently and cross-checked later.

use super::report::parse_table;
use crate::domain::ports::{ControllerRecord, InventorySource};
use crate::error::Result;
use tracing::{debug, warn};

// =============================================================================
// NVMe Discovery
// =============================================================================

/// Raw text returned by the NVMe queries, kept for diagnostics
#[derive(Debug, Clone, Default)]
pub struct NvmeReport {
    pub controllers: Vec<ControllerRecord>,
    pub raw: String,
}

/// NVMe-specific discovery operations
pub struct NvmeDiscovery;

impl NvmeDiscovery {
    /// Enumerate every NVMe adapter and its controller serial
    pub fn discover(source: &dyn InventorySource) -> Result<NvmeReport> {
        let listing = source.nvme_adapters()?;
        let mut raw = listing.clone();
        let mut controllers = Vec::new();

        for (index, adapter) in Self::parse_adapters(&listing).into_iter().enumerate() {
            let detail = source.nvme_controller_detail(&adapter)?;
            raw.push_str(&format!("\n# {}\n{}", adapter, detail));

            let Some(serial) = Self::identify_field(&detail, "Serial Number") else {
                warn!("No serial reported by NVMe controller on {}", adapter);
                continue;
            };
            let model = Self::identify_field(&detail, "Model Number").unwrap_or_default();

            debug!("NVMe controller {} reports serial {}", adapter, serial);
            controllers.push(ControllerRecord {
                adapter,
                device_name: format!("nvme{}", index),
                serial,
                model,
            });
        }

        Ok(NvmeReport { controllers, raw })
    }

    /// Adapter names from the NVMe device listing
    pub fn parse_adapters(listing: &str) -> Vec<String> {
        parse_table(listing)
            .into_iter()
            .filter_map(|row| row.first().map(|name| name.to_string()))
            .filter(|name| name.starts_with("vmhba"))
            .collect()
    }

    /// A field of the controller identify report, trimmed, if non-empty
    pub fn identify_field(detail: &str, key: &str) -> Option<String> {
        detail.lines().find_map(|line| {
            let (k, v) = line.trim().split_once(':')?;
            let value = v.trim();
            (k.trim() == key && !value.is_empty()).then(|| value.to_string())
        })
    }
}
