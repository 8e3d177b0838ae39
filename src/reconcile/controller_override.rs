//! NVMe Controller Serial Override
//!
//! The SCSI layer and the NVMe layer of ESXi do not always agree on a
//! drive's serial, and the provisioning system records the one the NVMe
//! controller reports. This step corrects the scanned catalog:
//!
//! 1. a device that no path attributed by serial is attributed to an
//!    adapter when the path's controller name carries the serial of the
//!    NVMe controller on that same adapter, provided no other device already
//!    claims the adapter;
//! 2. a device that is the only one on an NVMe adapter takes the controller's
//!    serial as its canonical serial. The serial it had before is kept as an
//!    alias serial.

use crate::domain::ports::{ControllerRecord, DeviceRecord, PathRecord};
use serde::Serialize;
use tracing::info;

/// A serial replaced by the controller-reported one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialOverride {
    pub device: String,
    pub adapter: String,
    pub previous_serial: String,
    pub serial: String,
}

/// Return the corrected device catalog and the overrides applied to it
pub fn apply_controller_overrides(
    devices: &[DeviceRecord],
    controllers: &[ControllerRecord],
    paths: &[PathRecord],
) -> (Vec<DeviceRecord>, Vec<SerialOverride>) {
    let mut corrected = devices.to_vec();

    for path in paths {
        let Some(index) = corrected.iter().position(|d| d.identifier == path.device) else {
            continue;
        };
        if corrected[index].adapter.is_some() || adapter_claimed(&corrected, &path.adapter) {
            continue;
        }

        let cross_match = controllers.iter().any(|c| {
            c.adapter == path.adapter
                && path.controller_serial.as_deref() == Some(c.serial.as_str())
        });
        if cross_match {
            info!(
                "Device {} attributed to {} through its NVMe controller",
                path.device, path.adapter
            );
            corrected[index].adapter = Some(path.adapter.clone());
            corrected[index].controller = Some(path.controller.clone());
        }
    }

    let mut overrides = Vec::new();
    for controller in controllers {
        let mut claimants = corrected
            .iter_mut()
            .filter(|d| d.adapter.as_deref() == Some(controller.adapter.as_str()));

        let (Some(device), None) = (claimants.next(), claimants.next()) else {
            continue;
        };
        if device.serial == controller.serial {
            continue;
        }

        let previous = std::mem::replace(&mut device.serial, controller.serial.clone());
        if !previous.is_empty() && !device.alias_serials.contains(&previous) {
            device.alias_serials.push(previous.clone());
        }

        info!(
            "Serial of {} overridden by NVMe controller on {}: {:?} -> {}",
            device.identifier, controller.adapter, previous, controller.serial
        );
        overrides.push(SerialOverride {
            device: device.identifier.clone(),
            adapter: controller.adapter.clone(),
            previous_serial: previous,
            serial: controller.serial.clone(),
        });
    }

    (corrected, overrides)
}

fn adapter_claimed(devices: &[DeviceRecord], adapter: &str) -> bool {
    devices.iter().any(|d| d.adapter.as_deref() == Some(adapter))
}
