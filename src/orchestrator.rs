//! Storage Orchestrator
//!
//! Runs the provisioning pipeline in strict order:
//!
//! 1. record the decoded config
//! 2. resolve the platform generation
//! 3. scan the hardware inventory and record it
//! 4. correct NVMe serials and bind the config to devices, record the result
//! 5. wipe every matched disk, then sync
//! 6. create the declared datastores, or extend the default one
//!
//! Nothing is written to a disk before step 5, and the first failing storage
//! command ends the run.

use crate::config::StorageConfig;
use crate::diagnostics::{
    DiagnosticLog, CONFIG_LOG, CONTROLLERS_LOG, DEVICES_LOG, MATCHED_DISKS_LOG,
};
use crate::domain::platform::PlatformGeneration;
use crate::domain::ports::StorageHost;
use crate::error::{Error, Result};
use crate::hardware::discovery::{HardwareScanner, ScannerConfig};
use crate::provision::{
    BuiltDatastore, DatastoreBuilder, DefaultDatastore, PartitionPlanner, WipeExecutor,
    WipeRecord,
};
use crate::reconcile::{
    apply_controller_overrides, Layout, Reconciler, ResolvedDisk, SerialOverride,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Default directory for diagnostic files
pub const DEFAULT_LOG_DIR: &str = "/var/log/esxi-storage";

// =============================================================================
// Orchestrator Configuration
// =============================================================================

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory diagnostic files are written to
    pub log_dir: PathBuf,
    /// Platform generation; detected from the host when unset
    pub platform: Option<PlatformGeneration>,
    /// Inventory scanner settings
    pub scanner: ScannerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            platform: None,
            scanner: ScannerConfig::default(),
        }
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// What a completed run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub platform: PlatformGeneration,
    /// Ids of declared disks bound to a device
    pub matched: Vec<String>,
    pub unmatched: Vec<String>,
    pub overrides: Vec<SerialOverride>,
    pub wipes: Vec<WipeRecord>,
    pub datastores: Vec<BuiltDatastore>,
    /// Ids of declared datastores left out because of an unmatched disk
    pub dropped_datastores: Vec<String>,
    pub default_datastore: Option<DefaultDatastore>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives one provisioning run against a host
pub struct Orchestrator<'a, H: StorageHost> {
    host: &'a H,
    config: OrchestratorConfig,
    diagnostics: DiagnosticLog,
}

impl<'a, H: StorageHost> Orchestrator<'a, H> {
    pub fn new(host: &'a H, config: OrchestratorConfig) -> Self {
        let diagnostics = DiagnosticLog::new(&config.log_dir);
        Self {
            host,
            config,
            diagnostics,
        }
    }

    /// Apply `storage` to the host
    pub fn run(&self, storage: &StorageConfig) -> Result<RunSummary> {
        self.diagnostics
            .record(CONFIG_LOG, storage, Some(storage.source()));

        let platform = self.resolve_platform()?;
        info!("Provisioning storage for {}", platform);

        let scanner = HardwareScanner::new(self.host, self.config.scanner.clone());
        let inventory = scanner.discover()?;
        let raw_devices = format!(
            "{}\n{}\n{}",
            inventory.raw.devices, inventory.raw.capacities, inventory.raw.paths
        );
        self.diagnostics
            .record(DEVICES_LOG, &inventory.devices, Some(&raw_devices));
        self.diagnostics.record(
            CONTROLLERS_LOG,
            &inventory.controllers,
            Some(&inventory.raw.controllers),
        );

        let (devices, overrides) = apply_controller_overrides(
            &inventory.devices,
            &inventory.controllers,
            &inventory.paths,
        );
        let layout = Reconciler::reconcile(storage, &devices)?;
        self.diagnostics.record(MATCHED_DISKS_LOG, &layout, None);

        let custom_layout = layout.has_custom_layout();
        let default_target = if custom_layout {
            None
        } else {
            Some(single_boot_disk(&layout)?)
        };

        let wipes =
            WipeExecutor::new(self.host, self.host, platform).run(&layout, custom_layout)?;

        let planner = PartitionPlanner::new(self.host, platform);
        let mut builder = DatastoreBuilder::new(self.host, planner);
        let (datastores, default_datastore) = match default_target {
            Some(boot) => (Vec::new(), Some(builder.extend_default(boot)?)),
            None => (builder.build_all(&layout)?, None),
        };

        let summary = RunSummary {
            platform,
            matched: layout.disks.keys().cloned().collect(),
            unmatched: layout.unmatched.clone(),
            overrides,
            wipes,
            datastores,
            dropped_datastores: layout.dropped_datastores.clone(),
            default_datastore,
        };
        info!(
            "Storage provisioning complete: {} disk(s) matched, {} unmatched, \
             {} datastore(s) built",
            summary.matched.len(),
            summary.unmatched.len(),
            summary.datastores.len()
        );
        Ok(summary)
    }

    fn resolve_platform(&self) -> Result<PlatformGeneration> {
        match self.config.platform {
            Some(platform) => Ok(platform),
            None => PlatformGeneration::from_version_banner(&self.host.platform_version()?),
        }
    }
}

/// The one installation disk the default datastore lives on
fn single_boot_disk(layout: &Layout) -> Result<&ResolvedDisk> {
    match layout.boot_disks().as_slice() {
        [boot] => Ok(*boot),
        [] => Err(Error::Configuration(
            "No datastores declared and no installation disk matched; \
             cannot extend the default datastore"
                .into(),
        )),
        many => Err(Error::Configuration(format!(
            "No datastores declared and {} installation disks matched",
            many.len()
        ))),
    }
}
