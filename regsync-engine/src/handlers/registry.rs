//! Registry handler - single-shot CRUD and list against the backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{finish, HandlerRequest, ResourceHandler};
use crate::backend::ResourceBackend;
use crate::classify::{to_operation_error, Operation};
use crate::config::EngineConfig;
use crate::context::CallbackContext;
use crate::error::{ErrorKind, OperationError};
use crate::identity::generate_identifier;
use crate::model::ResourceModel;
use crate::outcome::{ListPage, ProgressEvent};
use crate::translator;

pub const TYPE_NAME: &str = "Registry";

/// Registry handler.
pub struct RegistryHandler {
    backend: Arc<dyn ResourceBackend>,
    config: EngineConfig,
}

impl RegistryHandler {
    pub fn new(backend: Arc<dyn ResourceBackend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// One page of registry summaries.
    pub async fn list(&self, next_token: Option<String>) -> Result<ListPage, OperationError> {
        let req = translator::to_list_request(next_token, self.config.list_page_size);
        debug!("Registry::List page size {}", req.limit);
        let resp = self
            .backend
            .list_registries(req)
            .await
            .map_err(|e| to_operation_error(Operation::ListRegistries, TYPE_NAME, "*", &e))?;

        let next_token = resp.next_token.clone();
        let models = translator::from_list_response(resp);
        info!("Registry::List returned {} registries", models.len());
        Ok(ListPage { models, next_token })
    }

    /// Desired model with an identifier, generated from the request when absent.
    fn assign_identifier(&self, request: &HandlerRequest) -> Result<ResourceModel, OperationError> {
        let mut model = request.desired.clone();
        if model.id.is_none() {
            let (logical_id, token) = match (
                request.logical_resource_id.as_deref(),
                request.client_request_token.as_deref(),
            ) {
                (Some(l), Some(t)) => (l, t),
                _ => {
                    return Err(OperationError::new(
                        ErrorKind::InternalFailure,
                        TYPE_NAME,
                        model.display_name(),
                        "no identifier and no logical resource id/request token to derive one",
                    ))
                }
            };
            let id = generate_identifier(logical_id, token, self.config.identifier_max_length);
            info!("Registry::Create assigned identifier {}", id);
            model.id = Some(id);
        }
        if model.registry_name.is_none() {
            model.registry_name = model.id.clone();
        }
        Ok(model)
    }

    async fn create_model(&self, request: &HandlerRequest) -> Result<ResourceModel, OperationError> {
        let model = self.assign_identifier(request)?;
        let resp = self
            .backend
            .create_registry(translator::to_create_request(&model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::CreateRegistry, TYPE_NAME, model.display_name(), &e)
            })?;
        Ok(translator::from_create_response(&model, resp))
    }

    async fn read_model(&self, model: &ResourceModel) -> Result<ResourceModel, OperationError> {
        let resp = self
            .backend
            .describe_registry(translator::to_read_request(model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::ReadRegistry, TYPE_NAME, model.display_name(), &e)
            })?;
        Ok(translator::from_read_response(model, resp))
    }

    async fn update_model(&self, model: &ResourceModel) -> Result<ResourceModel, OperationError> {
        self.backend
            .update_registry(translator::to_update_request(model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::UpdateRegistry, TYPE_NAME, model.display_name(), &e)
            })?;
        self.read_model(model).await
    }

    async fn delete_model(&self, model: &ResourceModel) -> Result<ResourceModel, OperationError> {
        self.backend
            .delete_registry(translator::to_delete_request(model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::DeleteRegistry, TYPE_NAME, model.display_name(), &e)
            })?;
        Ok(model.clone())
    }
}

#[async_trait]
impl ResourceHandler for RegistryHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(
        &self,
        request: HandlerRequest,
        _context: Option<CallbackContext>,
    ) -> ProgressEvent {
        finish("Registry::Create", self.create_model(&request).await)
    }

    async fn read(&self, request: HandlerRequest) -> ProgressEvent {
        finish("Registry::Read", self.read_model(&request.desired).await)
    }

    async fn update(
        &self,
        request: HandlerRequest,
        _context: Option<CallbackContext>,
    ) -> ProgressEvent {
        finish("Registry::Update", self.update_model(&request.desired).await)
    }

    async fn delete(
        &self,
        request: HandlerRequest,
        _context: Option<CallbackContext>,
    ) -> ProgressEvent {
        finish("Registry::Delete", self.delete_model(&request.desired).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::error::{BackendError, BackendErrorKind};
    use crate::model::Tag;

    fn handler() -> (Arc<MemoryBackend>, RegistryHandler) {
        let backend = Arc::new(MemoryBackend::new());
        let handler = RegistryHandler::new(backend.clone(), EngineConfig::default());
        (backend, handler)
    }

    fn failure_kind(event: ProgressEvent) -> ErrorKind {
        match event {
            ProgressEvent::Failed { error } => error.kind,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_then_read_round_trips() {
        let (_, h) = handler();
        let mut desired = ResourceModel::named("orders");
        desired.id = Some("orders".to_string());
        desired.description = Some("order events".to_string());

        let created = h.create(HandlerRequest::new(desired.clone()), None).await;
        let created = created.model().cloned().unwrap();
        assert_eq!(created.id.as_deref(), Some("orders"));
        assert_eq!(created.tags, None);
        assert!(created.registry_arn.as_deref().unwrap().ends_with("/orders"));

        let read = h.read(HandlerRequest::new(desired)).await;
        assert_eq!(read.model(), Some(&created));
    }

    #[tokio::test]
    async fn test_create_assigns_identifier() {
        let (backend, h) = handler();
        let req = HandlerRequest::new(ResourceModel::default()).with_identity("MyReg", "tok123");

        let event = h.create(req, None).await;
        let model = event.model().cloned().unwrap();
        let id = model.id.clone().unwrap();
        assert_eq!(id, generate_identifier("MyReg", "tok123", 50));
        assert_eq!(model.registry_name.as_deref(), Some(id.as_str()));
        assert!(backend.snapshot().await.registries.contains_key(&id));
    }

    #[tokio::test]
    async fn test_create_without_identity_is_internal_failure() {
        let (backend, h) = handler();
        let event = h.create(HandlerRequest::new(ResourceModel::default()), None).await;
        assert_eq!(failure_kind(event), ErrorKind::InternalFailure);
        assert_eq!(backend.calls(Operation::CreateRegistry).await, 0);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_already_exists() {
        let (backend, h) = handler();
        backend.seed_registry("orders", None).await;
        let event = h
            .create(HandlerRequest::new(ResourceModel::named("orders")), None)
            .await;
        assert_eq!(failure_kind(event), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_create_keeps_tags() {
        let (_, h) = handler();
        let mut desired = ResourceModel::named("orders");
        desired.tags = Some([Tag::new("team", "payments")].into_iter().collect());
        let event = h.create(HandlerRequest::new(desired.clone()), None).await;
        assert_eq!(event.model().unwrap().tags, desired.tags);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_, h) = handler();
        let event = h.read(HandlerRequest::new(ResourceModel::named("ghost"))).await;
        assert_eq!(failure_kind(event), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_reads_back() {
        let (backend, h) = handler();
        backend.seed_registry("orders", Some("old")).await;
        let mut desired = ResourceModel::named("orders");
        desired.description = Some("new".to_string());

        let event = h.update(HandlerRequest::new(desired), None).await;
        assert_eq!(event.model().unwrap().description.as_deref(), Some("new"));
        assert_eq!(backend.calls(Operation::ReadRegistry).await, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_desired_model() {
        let (backend, h) = handler();
        backend.seed_registry("orders", None).await;
        let desired = ResourceModel::named("orders");
        let event = h.delete(HandlerRequest::new(desired.clone()), None).await;
        assert_eq!(event, ProgressEvent::success(desired));
        assert!(backend.snapshot().await.registries.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reserved_is_access_denied() {
        let (backend, h) = handler();
        backend.seed_registry("aws.events", None).await;
        let event = h
            .delete(HandlerRequest::new(ResourceModel::named("aws.events")), None)
            .await;
        assert_eq!(failure_kind(event), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_unexpected_signal_is_general_service_error() {
        let (backend, h) = handler();
        backend
            .fail_next(
                Operation::CreateRegistry,
                BackendError::bare(BackendErrorKind::NotFound),
            )
            .await;
        let event = h
            .create(HandlerRequest::new(ResourceModel::named("orders")), None)
            .await;
        assert_eq!(failure_kind(event), ErrorKind::GeneralServiceError);
    }

    #[tokio::test]
    async fn test_list_pages() {
        let backend = Arc::new(MemoryBackend::new());
        for name in ["a", "b", "c"] {
            backend.seed_registry(name, Some("ignored")).await;
        }
        let h = RegistryHandler::new(
            backend,
            EngineConfig {
                list_page_size: 2,
                ..Default::default()
            },
        );

        let first = h.list(None).await.unwrap();
        assert_eq!(first.models.len(), 2);
        assert!(first.models.iter().all(|m| m.description.is_none()));
        let second = h.list(first.next_token).await.unwrap();
        assert_eq!(second.models.len(), 1);
        assert_eq!(second.next_token, None);
    }

    #[tokio::test]
    async fn test_list_throttled_is_limit_exceeded() {
        let (backend, h) = handler();
        backend
            .fail_next(
                Operation::ListRegistries,
                BackendError::new(BackendErrorKind::Throttled, "slow down"),
            )
            .await;
        let err = h.list(None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LimitExceeded);
    }
}
