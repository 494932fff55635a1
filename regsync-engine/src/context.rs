//! Reconciliation context carried between invocations.

use serde::{Deserialize, Serialize};

/// Progress of one in-flight multi-invocation operation.
///
/// Created by the first invocation, returned with every `InProgress` event
/// and replayed verbatim by the host. It is not resource state: once a
/// terminal event is returned, the host discards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackContext {
    /// The mutating backend call succeeded.
    pub mutation_issued: bool,
    /// A read confirmed the mutation is visible.
    pub stabilized: bool,
    /// Stale polls still allowed before giving up.
    pub retries_remaining: u32,
    /// Revision marker returned by the mutating call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<String>,
}

impl CallbackContext {
    /// Fresh context with all phase flags cleared.
    pub fn new(retry_budget: u32) -> Self {
        Self {
            mutation_issued: false,
            stabilized: false,
            retries_remaining: retry_budget,
            expected_revision: None,
        }
    }

    /// Encode as the opaque blob handed to the host.
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a blob previously produced by [`CallbackContext::to_blob`].
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }
}
