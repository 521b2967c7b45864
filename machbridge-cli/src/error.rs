//! CLI error types and exit codes.

use machbridge_core::{ConfigError, ControlError, WolError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or IO errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Control failure - a remote machine operation failed
    pub const CONTROL_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Machine not found in the configuration
    #[error("Machine not found: {0}")]
    MachineNotFound(String),

    /// Wake-on-LAN error
    #[error("Wake-on-LAN error: {0}")]
    Wol(#[from] WolError),

    /// The machine cannot be woken because no MAC address is configured
    #[error("Machine '{0}' has no MAC address configured")]
    NoMacConfigured(String),

    /// Machine control error
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, wake-on-LAN, IO)
    /// - 2: Control failure (machine not found, remote operation failed)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::MachineNotFound(_) | Self::Control(_) => exit_codes::CONTROL_FAILURE,
            Self::Config(_) | Self::Wol(_) | Self::NoMacConfigured(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
