//! ESXi Storage Reconciler
//!
//! Reads a storage config and applies it to the local ESXi host.
//!
//! Exit status: 0 on success, 1 when a storage command fails, 2 for an
//! invalid config and 3 for an unsupported config version.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use esxi_storage::error::EXIT_SUCCESS;
use esxi_storage::orchestrator::DEFAULT_LOG_DIR;
use esxi_storage::{
    EsxiHost, Orchestrator, OrchestratorConfig, PlatformGeneration, Result, RunSummary,
    StorageConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ESXi Storage Reconciler - applies a declarative storage layout to an ESXi host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Storage config (YAML or JSON)
    config: PathBuf,

    /// Directory for diagnostic files
    #[arg(long, env = "ESXI_STORAGE_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Platform generation (esxi6, esxi7); detected from `vmware -v` when unset
    #[arg(long, env = "ESXI_STORAGE_PLATFORM")]
    platform: Option<PlatformGeneration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting {} {}", esxi_storage::NAME, esxi_storage::VERSION);
    info!("  Config: {}", args.config.display());
    info!("  Diagnostics: {}", args.log_dir.display());

    match run(&args) {
        Ok(summary) => {
            if !summary.unmatched.is_empty() {
                info!("Disks without a matching device: {}", summary.unmatched.join(", "));
            }
            ExitCode::from(EXIT_SUCCESS as u8)
        }
        Err(e) => {
            error!("Storage provisioning failed: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: &Args) -> Result<RunSummary> {
    let storage = StorageConfig::load(&args.config)?;

    let config = OrchestratorConfig {
        log_dir: args.log_dir.clone(),
        platform: args.platform,
        ..Default::default()
    };

    let host = EsxiHost::default();
    Orchestrator::new(&host, config).run(&storage)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
