//! Error types for the ESXi storage reconciler
//!
//! Provides structured error types for configuration decoding, inventory
//! parsing and the external storage tools driven by the provisioning
//! pipeline.

use thiserror::Error;

/// Unified error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported storage config version {version}, only version 1 is supported")]
    UnsupportedVersion { version: u64 },

    #[error("Multiple boot disks declared: {first} and {second}")]
    DuplicateBootDisk { first: String, second: String },

    // =========================================================================
    // External Command Errors
    // =========================================================================
    #[error("Command `{command}` exited with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Partition table error on {device}: {reason}")]
    PartitionTable { device: String, reason: String },

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process exit status for a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit status for a failed storage command or other runtime failure
pub const EXIT_RUNTIME_FAILURE: i32 = 1;
/// Process exit status for an invalid storage config
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Process exit status for an unsupported storage config version
pub const EXIT_UNSUPPORTED_VERSION: i32 = 3;

impl Error {
    /// Whether this error originates from the declared configuration
    /// rather than from the host
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::UnsupportedVersion { .. }
                | Error::DuplicateBootDisk { .. }
                | Error::YamlParse(_)
        )
    }

    /// Exit status the binary reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnsupportedVersion { .. } => EXIT_UNSUPPORTED_VERSION,
            e if e.is_configuration() => EXIT_CONFIG_ERROR,
            _ => EXIT_RUNTIME_FAILURE,
        }
    }
}

/// Result type alias for the reconciler
pub type Result<T> = std::result::Result<T, Error>;
