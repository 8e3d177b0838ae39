//! Platform Generation
//!
//! ESXi major releases lay out the installation disk differently. The
//! generation is resolved once at startup and passed explicitly to the
//! partition planner, wipe executor and datastore builder.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name ESXi gives the datastore it creates on the installation disk
pub const DEFAULT_DATASTORE_NAME: &str = "datastore1";

/// ESXi release line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformGeneration {
    /// ESXi 6.x: datastore on partition 3, system partitions up to 9
    Esxi6,
    /// ESXi 7.x and later: datastore on partition 8 after ESX-OSData
    Esxi7,
}

impl PlatformGeneration {
    /// Partition number the installer reserves for the default datastore
    pub fn reserved_partition(&self) -> u32 {
        match self {
            PlatformGeneration::Esxi6 => 3,
            PlatformGeneration::Esxi7 => 8,
        }
    }

    /// Name of the datastore created by the installer
    pub fn default_datastore(&self) -> &'static str {
        DEFAULT_DATASTORE_NAME
    }

    /// Parse the output of `vmware -v` ("VMware ESXi 7.0.3 build-19193900")
    pub fn from_version_banner(banner: &str) -> Result<Self> {
        let version = banner
            .split_whitespace()
            .skip_while(|word| !word.eq_ignore_ascii_case("esxi"))
            .nth(1)
            .ok_or_else(|| {
                Error::Internal(format!("Unrecognized version banner: {}", banner.trim()))
            })?;

        let major: u32 = version
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .ok_or_else(|| Error::Internal(format!("Unrecognized ESXi version: {}", version)))?;

        Ok(if major >= 7 {
            PlatformGeneration::Esxi7
        } else {
            PlatformGeneration::Esxi6
        })
    }
}

impl fmt::Display for PlatformGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformGeneration::Esxi6 => write!(f, "esxi6"),
            PlatformGeneration::Esxi7 => write!(f, "esxi7"),
        }
    }
}

impl FromStr for PlatformGeneration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "esxi6" | "6" => Ok(PlatformGeneration::Esxi6),
            "esxi7" | "esxi8" | "7" | "8" => Ok(PlatformGeneration::Esxi7),
            other => Err(format!("unknown platform generation: {}", other)),
        }
    }
}
