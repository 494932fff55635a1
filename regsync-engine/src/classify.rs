//! Backend failure classification.
//!
//! [`base_kind`] is the full mapping from backend signals to [`ErrorKind`].
//! Each [`Operation`] narrows it: kinds the operation does not surface
//! collapse into [`ErrorKind::GeneralServiceError`], so an unexpected signal
//! is never silently reinterpreted (a `NotFound` from a create is opaque).

use crate::error::{BackendError, BackendErrorKind, ErrorKind, OperationError};

/// Backend call sites with their own error mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateRegistry,
    ReadRegistry,
    UpdateRegistry,
    DeleteRegistry,
    ListRegistries,
    GetPolicy,
    PutPolicy,
    DeletePolicy,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::CreateRegistry,
        Operation::ReadRegistry,
        Operation::UpdateRegistry,
        Operation::DeleteRegistry,
        Operation::ListRegistries,
        Operation::GetPolicy,
        Operation::PutPolicy,
        Operation::DeletePolicy,
    ];

    /// Kinds this operation reports as-is.
    pub fn surfaces(&self) -> &'static [ErrorKind] {
        use ErrorKind::*;
        match self {
            Operation::CreateRegistry => &[AlreadyExists, AccessDenied, LimitExceeded, InternalFailure],
            Operation::ReadRegistry => &[NotFound, InternalFailure],
            Operation::UpdateRegistry | Operation::DeleteRegistry => {
                &[NotFound, AccessDenied, InternalFailure]
            }
            Operation::ListRegistries => &[LimitExceeded, InternalFailure],
            Operation::GetPolicy | Operation::DeletePolicy => &[NotFound],
            Operation::PutPolicy => &[Conflict],
        }
    }

    /// Label used in messages for opaque service errors.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CreateRegistry => "CreateRegistry",
            Operation::ReadRegistry => "DescribeRegistry",
            Operation::UpdateRegistry => "UpdateRegistry",
            Operation::DeleteRegistry => "DeleteRegistry",
            Operation::ListRegistries => "ListRegistries",
            Operation::GetPolicy => "GetPolicy",
            Operation::PutPolicy => "PutPolicy",
            Operation::DeletePolicy => "DeletePolicy",
        }
    }
}

/// Full mapping, before per-operation narrowing.
pub fn base_kind(kind: BackendErrorKind) -> ErrorKind {
    match kind {
        BackendErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        BackendErrorKind::NotFound => ErrorKind::NotFound,
        BackendErrorKind::AccessDenied => ErrorKind::AccessDenied,
        BackendErrorKind::Throttled => ErrorKind::LimitExceeded,
        BackendErrorKind::Malformed => ErrorKind::InternalFailure,
        BackendErrorKind::Conflict => ErrorKind::Conflict,
        BackendErrorKind::Other => ErrorKind::GeneralServiceError,
    }
}

/// Classify a backend failure for `op`.
pub fn classify(op: Operation, err: &BackendError) -> ErrorKind {
    let kind = base_kind(err.kind);
    if op.surfaces().contains(&kind) {
        kind
    } else {
        ErrorKind::GeneralServiceError
    }
}

/// Classify and wrap a backend failure into a terminal [`OperationError`].
pub fn to_operation_error(
    op: Operation,
    type_name: &str,
    identifier: &str,
    err: &BackendError,
) -> OperationError {
    let kind = classify(op, err);
    let message = match kind {
        ErrorKind::GeneralServiceError => format!("{} failed: {}", op.label(), err),
        _ => err.to_string(),
    };
    OperationError::new(kind, type_name, identifier, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKEND_KINDS: [BackendErrorKind; 7] = [
        BackendErrorKind::AlreadyExists,
        BackendErrorKind::NotFound,
        BackendErrorKind::AccessDenied,
        BackendErrorKind::Throttled,
        BackendErrorKind::Malformed,
        BackendErrorKind::Conflict,
        BackendErrorKind::Other,
    ];

    #[test]
    fn test_classify_is_total_and_deterministic() {
        for op in Operation::ALL {
            for kind in BACKEND_KINDS {
                let err = BackendError::bare(kind);
                let first = classify(op, &err);
                assert_eq!(first, classify(op, &err));
                assert!(
                    first == ErrorKind::GeneralServiceError || op.surfaces().contains(&first),
                    "{:?}/{:?} mapped outside the operation's table",
                    op,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_other_always_general_service_error() {
        for op in Operation::ALL {
            assert_eq!(
                classify(op, &BackendError::bare(BackendErrorKind::Other)),
                ErrorKind::GeneralServiceError
            );
        }
    }

    #[test]
    fn test_create_registry_mapping() {
        let op = Operation::CreateRegistry;
        let cases = [
            (BackendErrorKind::AlreadyExists, ErrorKind::AlreadyExists),
            (BackendErrorKind::AccessDenied, ErrorKind::AccessDenied),
            (BackendErrorKind::Throttled, ErrorKind::LimitExceeded),
            (BackendErrorKind::Malformed, ErrorKind::InternalFailure),
            (BackendErrorKind::NotFound, ErrorKind::GeneralServiceError),
        ];
        for (backend, expected) in cases {
            assert_eq!(classify(op, &BackendError::bare(backend)), expected);
        }
    }

    #[test]
    fn test_already_exists_only_meaningful_for_create() {
        for op in Operation::ALL {
            let kind = classify(op, &BackendError::bare(BackendErrorKind::AlreadyExists));
            if op == Operation::CreateRegistry {
                assert_eq!(kind, ErrorKind::AlreadyExists);
            } else {
                assert_eq!(kind, ErrorKind::GeneralServiceError);
            }
        }
    }

    #[test]
    fn test_put_policy_conflict() {
        let err = BackendError::new(BackendErrorKind::Conflict, "stale revision");
        assert_eq!(classify(Operation::PutPolicy, &err), ErrorKind::Conflict);
        assert_eq!(
            classify(Operation::UpdateRegistry, &err),
            ErrorKind::GeneralServiceError
        );
    }

    #[test]
    fn test_operation_error_message_names_call() {
        let err = to_operation_error(
            Operation::DeletePolicy,
            "RegistryPolicy",
            "orders",
            &BackendError::new(BackendErrorKind::Other, "boom"),
        );
        assert_eq!(err.kind, ErrorKind::GeneralServiceError);
        assert_eq!(err.identifier, "orders");
        assert_eq!(err.message, "DeletePolicy failed: service error: boom");
    }
}
