//! Failure kinds surfaced to callers of the workflow.
//!
//! Each concrete error type (`LmError`, `RoleError`) maps onto one of these so
//! a caller can decide whether rerunning the whole workflow makes sense.
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote call itself failed (spawn, network, auth, rate limit).
    RemoteCallError,
    /// The model answered, but not in the requested structure.
    SchemaViolation,
    /// A role id outside the catalog was requested.
    UnknownRole,
    /// The call exceeded the configured deadline.
    RemoteCallTimeout,
}

impl ErrorKind {
    /// Transient failures are worth retrying the whole run for.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RemoteCallError | Self::RemoteCallTimeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteCallError => write!(f, "remote_call_error"),
            Self::SchemaViolation => write!(f, "schema_violation"),
            Self::UnknownRole => write!(f, "unknown_role"),
            Self::RemoteCallTimeout => write!(f, "remote_call_timeout"),
        }
    }
}
