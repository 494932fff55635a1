//! Resource handlers.
//!
//! Each handler maps lifecycle actions for one resource type onto the
//! backend. Single-shot actions answer in one invocation; actions whose
//! effect is only eventually visible go through the [`Engine`](crate::Engine).

pub mod policy;
pub mod registry;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::context::CallbackContext;
use crate::error::OperationError;
use crate::model::ResourceModel;
use crate::outcome::ProgressEvent;

/// Lifecycle action requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "Create",
            Action::Read => "Read",
            Action::Update => "Update",
            Action::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// One invocation's input, minus the callback context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerRequest {
    pub desired: ResourceModel,
    pub logical_resource_id: Option<String>,
    pub client_request_token: Option<String>,
}

impl HandlerRequest {
    pub fn new(desired: ResourceModel) -> Self {
        Self {
            desired,
            ..Default::default()
        }
    }

    pub fn with_identity(
        mut self,
        logical_resource_id: impl Into<String>,
        client_request_token: impl Into<String>,
    ) -> Self {
        self.logical_resource_id = Some(logical_resource_id.into());
        self.client_request_token = Some(client_request_token.into());
        self
    }
}

/// Trait for resource handlers.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name, e.g. `Registry`.
    fn type_name(&self) -> &'static str;

    async fn create(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent;

    async fn read(&self, request: HandlerRequest) -> ProgressEvent;

    async fn update(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent;

    async fn delete(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent;

    /// Dispatch `action`. Read ignores `context`.
    async fn invoke(
        &self,
        action: Action,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent {
        match action {
            Action::Create => self.create(request, context).await,
            Action::Read => self.read(request).await,
            Action::Update => self.update(request, context).await,
            Action::Delete => self.delete(request, context).await,
        }
    }
}

/// Turn a single-shot result into an event, logging the outcome.
pub(crate) fn finish(label: &str, result: Result<ResourceModel, OperationError>) -> ProgressEvent {
    match &result {
        Ok(model) => info!("{} [{}] succeeded", label, model.display_name()),
        Err(e) if e.is_defect() => error!("{} failed: {}", label, e),
        Err(e) => warn!("{} failed: {}", label, e),
    }
    ProgressEvent::from(result)
}
