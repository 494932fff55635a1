//! Error types.
//!
//! Backend calls fail with a [`BackendError`]. Handlers never pass those
//! through: every failure is classified into an [`OperationError`] carrying
//! one [`ErrorKind`] from the fixed taxonomy below.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure signal reported by a resource backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum BackendErrorKind {
    /// The resource to create already exists.
    #[error("already exists")]
    AlreadyExists,
    /// The addressed resource does not exist.
    #[error("not found")]
    NotFound,
    /// Caller lacks rights, or the resource is system-owned.
    #[error("access denied")]
    AccessDenied,
    /// Throttled, or a quota was exceeded.
    #[error("throttled")]
    Throttled,
    /// The request was rejected as malformed.
    #[error("malformed request")]
    Malformed,
    /// A policy write raced against a newer revision.
    #[error("conflict")]
    Conflict,
    /// Anything else the backend reports.
    #[error("service error")]
    Other,
}

/// Error returned by a [`ResourceBackend`](crate::ResourceBackend) call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}{}", message_suffix(.message))]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: Option<String>,
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn bare(kind: BackendErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

/// Terminal failure classes surfaced to the invocation host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AccessDenied,
    #[serde(rename = "ResourceConflict")]
    Conflict,
    #[serde(rename = "ServiceLimitExceeded")]
    LimitExceeded,
    /// Malformed request, violated precondition, or exhausted stabilization.
    InternalFailure,
    #[serde(rename = "GeneralServiceException")]
    GeneralServiceError,
}

impl ErrorKind {
    /// Defects are worth alerting on; everything else is an expected user error.
    pub fn is_defect(&self) -> bool {
        matches!(self, ErrorKind::InternalFailure)
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::Conflict => "ResourceConflict",
            ErrorKind::LimitExceeded => "ServiceLimitExceeded",
            ErrorKind::InternalFailure => "InternalFailure",
            ErrorKind::GeneralServiceError => "GeneralServiceException",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Classified, terminal failure of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {type_name} [{identifier}]: {message}")]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    pub kind: ErrorKind,
    /// Resource type name, e.g. `Registry`.
    pub type_name: String,
    /// Identifying name of the resource the operation targeted.
    pub identifier: String,
    pub message: String,
}

impl OperationError {
    pub fn new(
        kind: ErrorKind,
        type_name: &str,
        identifier: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            type_name: type_name.to_string(),
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }

    pub fn is_defect(&self) -> bool {
        self.kind.is_defect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(BackendErrorKind::Conflict, "revision 3 is stale");
        assert_eq!(err.to_string(), "conflict: revision 3 is stale");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
        assert_eq!(
            BackendError::bare(BackendErrorKind::NotFound).to_string(),
            "not found"
        );
    }

    #[test]
    fn test_only_internal_failure_is_defect() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::AlreadyExists,
            ErrorKind::AccessDenied,
            ErrorKind::Conflict,
            ErrorKind::LimitExceeded,
            ErrorKind::GeneralServiceError,
        ];
        assert!(kinds.iter().all(|k| !k.is_defect()));
        assert!(ErrorKind::InternalFailure.is_defect());
    }

    #[test]
    fn test_operation_error_carries_identifier() {
        let err = OperationError::new(ErrorKind::NotFound, "Registry", "orders", "missing");
        assert_eq!(err.to_string(), "NotFound: Registry [orders]: missing");
    }

    #[test]
    fn test_error_kind_serializes_to_code() {
        for kind in [ErrorKind::Conflict, ErrorKind::LimitExceeded, ErrorKind::GeneralServiceError] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.code().to_string()));
        }
    }
}
