//! Registry policy handler.
//!
//! Policy writes are eventually consistent: a put returns a new revision
//! that reads may not report for a while. Create, update and delete each
//! issue one mutation and then poll through the [`Engine`] until the read
//! side agrees.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{finish, HandlerRequest, ResourceHandler};
use crate::backend::ResourceBackend;
use crate::classify::{to_operation_error, Operation};
use crate::config::EngineConfig;
use crate::context::CallbackContext;
use crate::engine::{Engine, Observation, Stabilizer};
use crate::error::{ErrorKind, OperationError};
use crate::model::ResourceModel;
use crate::outcome::ProgressEvent;
use crate::translator;

pub const TYPE_NAME: &str = "RegistryPolicy";

/// Registry policy handler.
pub struct PolicyHandler {
    backend: Arc<dyn ResourceBackend>,
    engine: Engine,
}

impl PolicyHandler {
    pub fn new(backend: Arc<dyn ResourceBackend>, config: EngineConfig) -> Self {
        Self {
            backend,
            engine: Engine::new(&config),
        }
    }

    async fn read_model(&self, model: &ResourceModel) -> Result<ResourceModel, OperationError> {
        let resp = self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
            .map_err(|e| to_operation_error(Operation::GetPolicy, TYPE_NAME, model.display_name(), &e))?;
        Ok(translator::from_policy_response(model, resp))
    }
}

/// A policy is identified by its registry.
fn with_policy_id(mut model: ResourceModel) -> ResourceModel {
    if model.id.is_none() {
        model.id = model.registry_name.clone();
    }
    model
}

fn matches_revision(expected: Option<&str>, observed: &str) -> bool {
    expected.map_or(true, |e| e == observed)
}

struct CreatePolicy {
    backend: Arc<dyn ResourceBackend>,
}

#[async_trait]
impl Stabilizer for CreatePolicy {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn action(&self) -> &'static str {
        "RegistryPolicy::Create"
    }

    async fn mutate(&self, model: &ResourceModel) -> Result<Option<String>, OperationError> {
        let name = model.display_name();

        self.backend
            .describe_registry(translator::to_read_request(model))
            .await
            .map_err(|e| to_operation_error(Operation::ReadRegistry, TYPE_NAME, name, &e))?;

        match self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
        {
            Ok(_) => {
                return Err(OperationError::new(
                    ErrorKind::AlreadyExists,
                    TYPE_NAME,
                    name,
                    "registry already has a policy",
                ))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(to_operation_error(Operation::GetPolicy, TYPE_NAME, name, &e)),
        }

        let resp = self
            .backend
            .put_policy(translator::to_put_policy_request(model, None))
            .await
            .map_err(|e| to_operation_error(Operation::PutPolicy, TYPE_NAME, name, &e))?;
        Ok(Some(resp.revision_id))
    }

    async fn observe(
        &self,
        model: &ResourceModel,
        expected: Option<&str>,
    ) -> Result<Observation, OperationError> {
        match self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
        {
            Ok(resp) if matches_revision(expected, &resp.revision_id) => Ok(Observation::Converged(
                translator::from_policy_response(model, resp),
            )),
            Ok(_) => Ok(Observation::Pending),
            // The first write may not be readable yet.
            Err(e) if e.is_not_found() => Ok(Observation::Pending),
            Err(e) => Err(to_operation_error(
                Operation::GetPolicy,
                TYPE_NAME,
                model.display_name(),
                &e,
            )),
        }
    }
}

struct UpdatePolicy {
    backend: Arc<dyn ResourceBackend>,
}

#[async_trait]
impl Stabilizer for UpdatePolicy {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn action(&self) -> &'static str {
        "RegistryPolicy::Update"
    }

    async fn mutate(&self, model: &ResourceModel) -> Result<Option<String>, OperationError> {
        let name = model.display_name();
        let current = self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
            .map_err(|e| to_operation_error(Operation::GetPolicy, TYPE_NAME, name, &e))?;
        debug!(
            "RegistryPolicy::Update [{}] based on revision {}",
            name, current.revision_id
        );

        let resp = self
            .backend
            .put_policy(translator::to_put_policy_request(
                model,
                Some(current.revision_id),
            ))
            .await
            .map_err(|e| to_operation_error(Operation::PutPolicy, TYPE_NAME, name, &e))?;
        Ok(Some(resp.revision_id))
    }

    async fn observe(
        &self,
        model: &ResourceModel,
        expected: Option<&str>,
    ) -> Result<Observation, OperationError> {
        let resp = self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::GetPolicy, TYPE_NAME, model.display_name(), &e)
            })?;
        if matches_revision(expected, &resp.revision_id) {
            Ok(Observation::Converged(translator::from_policy_response(
                model, resp,
            )))
        } else {
            Ok(Observation::Pending)
        }
    }
}

struct DeletePolicy {
    backend: Arc<dyn ResourceBackend>,
}

#[async_trait]
impl Stabilizer for DeletePolicy {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn action(&self) -> &'static str {
        "RegistryPolicy::Delete"
    }

    async fn mutate(&self, model: &ResourceModel) -> Result<Option<String>, OperationError> {
        self.backend
            .delete_policy(translator::to_delete_policy_request(model))
            .await
            .map_err(|e| {
                to_operation_error(Operation::DeletePolicy, TYPE_NAME, model.display_name(), &e)
            })?;
        Ok(None)
    }

    async fn observe(
        &self,
        model: &ResourceModel,
        _expected: Option<&str>,
    ) -> Result<Observation, OperationError> {
        match self
            .backend
            .get_policy(translator::to_get_policy_request(model))
            .await
        {
            Ok(_) => Ok(Observation::Pending),
            Err(e) if e.is_not_found() => Ok(Observation::Converged(model.clone())),
            Err(e) => Err(to_operation_error(
                Operation::GetPolicy,
                TYPE_NAME,
                model.display_name(),
                &e,
            )),
        }
    }
}

#[async_trait]
impl ResourceHandler for PolicyHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent {
        let stabilizer = CreatePolicy {
            backend: self.backend.clone(),
        };
        self.engine
            .step(&stabilizer, with_policy_id(request.desired), context)
            .await
    }

    async fn read(&self, request: HandlerRequest) -> ProgressEvent {
        let model = with_policy_id(request.desired);
        finish("RegistryPolicy::Read", self.read_model(&model).await)
    }

    async fn update(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent {
        let stabilizer = UpdatePolicy {
            backend: self.backend.clone(),
        };
        self.engine
            .step(&stabilizer, with_policy_id(request.desired), context)
            .await
    }

    async fn delete(
        &self,
        request: HandlerRequest,
        context: Option<CallbackContext>,
    ) -> ProgressEvent {
        let stabilizer = DeletePolicy {
            backend: self.backend.clone(),
        };
        self.engine
            .step(&stabilizer, with_policy_id(request.desired), context)
            .await
    }
}
