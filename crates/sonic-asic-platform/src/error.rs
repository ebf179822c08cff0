//! Platform error types and bring-up phases.
//!
//! Every platform failure names the phase that produced it so the daemon can
//! report exactly where bring-up or teardown stopped.

use std::fmt;
use thiserror::Error;

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Lifecycle phases of the switch platform, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformPhase {
    /// System log output initialization.
    LogInit,
    /// SDK command infrastructure initialization.
    CliInit,
    /// Device probe and driver attach.
    DeviceProbe,
    /// High-availability memory setup.
    HaInit,
    /// In-service software upgrade start.
    IssuStart,
    /// Default SDK init sequence (loads the platform config file on cold boot).
    SystemInit,
    /// In-service software upgrade completion.
    IssuDone,
    /// SDK shutdown.
    SystemShutdown,
    /// High-availability memory cleanup.
    HaCleanup,
    /// Device detach.
    DeviceDetach,
}

impl PlatformPhase {
    /// Returns the phase name used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PlatformPhase::LogInit => "log_init",
            PlatformPhase::CliInit => "cli_init",
            PlatformPhase::DeviceProbe => "device_probe",
            PlatformPhase::HaInit => "ha_init",
            PlatformPhase::IssuStart => "issu_start",
            PlatformPhase::SystemInit => "system_init",
            PlatformPhase::IssuDone => "issu_done",
            PlatformPhase::SystemShutdown => "system_shutdown",
            PlatformPhase::HaCleanup => "ha_cleanup",
            PlatformPhase::DeviceDetach => "device_detach",
        }
    }
}

impl fmt::Display for PlatformPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for platform lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// A lifecycle phase failed.
    #[error("platform phase {phase} failed: {message}")]
    PhaseFailed {
        /// The phase that failed.
        phase: PlatformPhase,
        /// Failure description from the SDK.
        message: String,
    },

    /// `init` was called on a platform that is already up.
    #[error("platform already initialized")]
    AlreadyInitialized,

    /// `shutdown` was called on a platform that is not up.
    #[error("platform not initialized")]
    NotInitialized,

    /// The platform configuration is inconsistent.
    #[error("invalid platform configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl PlatformError {
    /// Creates a phase failure.
    pub fn phase_failed(phase: PlatformPhase, message: impl Into<String>) -> Self {
        Self::PhaseFailed {
            phase,
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the failed phase, if the error came from one.
    pub fn phase(&self) -> Option<PlatformPhase> {
        match self {
            PlatformError::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
