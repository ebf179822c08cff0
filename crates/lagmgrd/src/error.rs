//! Error types for LAG management operations.
//!
//! Each [`LagError`] variant corresponds to exactly one wire [`LagStatus`].

use thiserror::Error;

use crate::rpc::LagStatus;

/// Result type alias for LAG operations.
pub type LagResult<T> = Result<T, LagError>;

/// Errors returned by the LAG registry and service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LagError {
    /// Malformed identifier, empty or duplicated member list.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// A LAG with this identifier already exists.
    #[error("LAG '{lag_id}' already exists")]
    AlreadyExists {
        /// The conflicting LAG identifier.
        lag_id: String,
    },

    /// The LAG, or a port's membership in it, does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// A port is already aggregated into a LAG.
    #[error("Port '{port}' is already a member of LAG '{lag_id}'")]
    AlreadyMember {
        /// The port alias.
        port: String,
        /// The LAG currently owning the port.
        lag_id: String,
    },

    /// The service is not accepting work or the registry lock timed out.
    #[error("Service busy: {reason}")]
    Busy {
        /// Why the request was not served.
        reason: String,
    },

    /// Unexpected internal state.
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl LagError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(lag_id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            lag_id: lag_id.into(),
        }
    }

    /// Creates a not found error for an unknown LAG.
    pub fn lag_not_found(lag_id: impl AsRef<str>) -> Self {
        Self::NotFound {
            message: format!("LAG '{}' does not exist", lag_id.as_ref()),
        }
    }

    /// Creates a not found error for a port that is not a member of the LAG.
    pub fn not_member(port: impl AsRef<str>, lag_id: impl AsRef<str>) -> Self {
        Self::NotFound {
            message: format!(
                "Port '{}' is not a member of LAG '{}'",
                port.as_ref(),
                lag_id.as_ref()
            ),
        }
    }

    /// Creates a not found error for a port that belongs to no LAG.
    pub fn port_not_aggregated(port: impl AsRef<str>) -> Self {
        Self::NotFound {
            message: format!("Port '{}' is not a member of any LAG", port.as_ref()),
        }
    }

    /// Creates an already member error.
    pub fn already_member(port: impl Into<String>, lag_id: impl Into<String>) -> Self {
        Self::AlreadyMember {
            port: port.into(),
            lag_id: lag_id.into(),
        }
    }

    /// Creates a busy error.
    pub fn busy(reason: impl Into<String>) -> Self {
        Self::Busy {
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the wire status for this error.
    pub fn status(&self) -> LagStatus {
        match self {
            LagError::InvalidArgument { .. } => LagStatus::InvalidArgument,
            LagError::AlreadyExists { .. } => LagStatus::AlreadyExists,
            LagError::NotFound { .. } => LagStatus::NotFound,
            LagError::AlreadyMember { .. } => LagStatus::AlreadyMember,
            LagError::Busy { .. } => LagStatus::Busy,
            LagError::Internal { .. } => LagStatus::Internal,
        }
    }

    /// Returns true if the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LagError::Busy { .. })
    }
}
