//! Invocation results returned to the host.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::CallbackContext;
use crate::error::OperationError;
use crate::model::ResourceModel;

/// Result of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEvent {
    /// Terminal success with the observed model.
    Success { model: ResourceModel },
    /// Not yet stabilized. Redeliver `context` after `delay`.
    InProgress {
        model: ResourceModel,
        context: CallbackContext,
        #[serde(with = "delay_secs")]
        delay: Duration,
    },
    /// Terminal failure.
    Failed { error: OperationError },
}

impl ProgressEvent {
    pub fn success(model: ResourceModel) -> Self {
        ProgressEvent::Success { model }
    }

    pub fn failed(error: OperationError) -> Self {
        ProgressEvent::Failed { error }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::InProgress { .. })
    }

    /// Context the host must persist, if any.
    pub fn context(&self) -> Option<&CallbackContext> {
        match self {
            ProgressEvent::InProgress { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ResourceModel> {
        match self {
            ProgressEvent::Success { model } | ProgressEvent::InProgress { model, .. } => {
                Some(model)
            }
            ProgressEvent::Failed { .. } => None,
        }
    }
}

impl From<Result<ResourceModel, OperationError>> for ProgressEvent {
    fn from(result: Result<ResourceModel, OperationError>) -> Self {
        match result {
            Ok(model) => ProgressEvent::success(model),
            Err(error) => ProgressEvent::failed(error),
        }
    }
}

/// One page of list results. Models carry identifying fields only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub models: Vec<ResourceModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

mod delay_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(delay.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
