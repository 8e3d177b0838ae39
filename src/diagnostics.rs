//! Diagnostic Log Files
//!
//! Everything the run knows before it touches a disk is written to a small
//! set of files: the decoded config, the raw and parsed device inventory,
//! the NVMe controllers and the matched layout. Writing them is best
//! effort; a failed write is logged and never replaces the run's own error.

use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const CONFIG_LOG: &str = "config.log";
pub const DEVICES_LOG: &str = "devices.log";
pub const CONTROLLERS_LOG: &str = "nvme-controllers.log";
pub const MATCHED_DISKS_LOG: &str = "matched-disks.log";

/// Directory of diagnostic files, rewritten on every run
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    dir: PathBuf,
}

impl DiagnosticLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `value` as pretty JSON, preceded by `raw` tool output if any
    pub fn record<T: Serialize + ?Sized>(&self, file: &str, value: &T, raw: Option<&str>) {
        match self.try_record(file, value, raw) {
            Ok(path) => debug!("Wrote {}", path.display()),
            Err(e) => warn!("Could not write diagnostic file {}: {:#}", file, e),
        }
    }

    fn try_record<T: Serialize + ?Sized>(
        &self,
        file: &str,
        value: &T,
        raw: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let mut contents = format!("# {} {}\n", file, chrono::Utc::now().to_rfc3339());
        if let Some(raw) = raw {
            contents.push_str(raw.trim_end());
            contents.push_str("\n\n");
        }
        contents.push_str(&serde_json::to_string_pretty(value).context("serializing")?);
        contents.push('\n');

        let path = self.dir.join(file);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
