//! Stabilization state machine.
//!
//! Drives one asynchronous mutation to a confirmed, visible result across
//! any number of invocations:
//!
//! ```text
//! NOT_STARTED --mutate--> MUTATION_ISSUED --poll--> STABILIZING --poll--> STABILIZED
//!                                                        |
//!                                                        +--budget spent--> EXHAUSTED
//! ```
//!
//! All progress lives in the [`CallbackContext`]; the engine itself holds
//! only configuration and can serve any number of operations concurrently.
//! Waiting is never done in-process: an unconverged poll returns
//! [`ProgressEvent::InProgress`] and the host redelivers after the delay.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::context::CallbackContext;
use crate::error::{ErrorKind, OperationError};
use crate::model::ResourceModel;
use crate::outcome::ProgressEvent;

/// Result of one stabilization poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The mutation is visible; carries the model refreshed from the read.
    Converged(ResourceModel),
    /// Not visible yet.
    Pending,
}

/// One asynchronous mutation and the read that confirms it.
#[async_trait]
pub trait Stabilizer: Send + Sync {
    /// Resource type name used in errors, e.g. `RegistryPolicy`.
    fn type_name(&self) -> &'static str;

    /// Action label used in logs, e.g. `RegistryPolicy::Update`.
    fn action(&self) -> &'static str;

    /// Issue the mutating call. Returns the revision marker to wait for, if any.
    ///
    /// Called at most once per operation, even when the host redelivers.
    async fn mutate(&self, model: &ResourceModel) -> Result<Option<String>, OperationError>;

    /// Read the backend and decide whether the mutation is visible.
    async fn observe(
        &self,
        model: &ResourceModel,
        expected_revision: Option<&str>,
    ) -> Result<Observation, OperationError>;
}

/// Reconciliation engine.
#[derive(Debug, Clone)]
pub struct Engine {
    retry_budget: u32,
    callback_delay: Duration,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            retry_budget: config.retry_budget,
            callback_delay: config.callback_delay(),
        }
    }

    /// Run one invocation of the operation `stabilizer` describes.
    ///
    /// `context` is `None` on the first invocation and the context from the
    /// previous `InProgress` event afterwards.
    pub async fn step<S>(
        &self,
        stabilizer: &S,
        model: ResourceModel,
        context: Option<CallbackContext>,
    ) -> ProgressEvent
    where
        S: Stabilizer + ?Sized,
    {
        let mut model = model;
        let mut ctx = context.unwrap_or_else(|| CallbackContext::new(self.retry_budget));
        let action = stabilizer.action();

        if !ctx.mutation_issued {
            match stabilizer.mutate(&model).await {
                Ok(revision) => {
                    ctx.expected_revision = revision;
                    ctx.mutation_issued = true;
                    info!(
                        "{} [{}] mutation issued (revision {})",
                        action,
                        model.display_name(),
                        ctx.expected_revision.as_deref().unwrap_or("-")
                    );
                }
                Err(e) => return fail(action, e),
            }
        }

        if let Some(revision) = &ctx.expected_revision {
            model.revision_id = Some(revision.clone());
        }

        if !ctx.stabilized {
            debug!(
                "{} [{}] polling, {} retries remaining",
                action,
                model.display_name(),
                ctx.retries_remaining
            );
            match stabilizer
                .observe(&model, ctx.expected_revision.as_deref())
                .await
            {
                Ok(Observation::Converged(observed)) => {
                    ctx.stabilized = true;
                    model = observed;
                }
                Ok(Observation::Pending) => {
                    if ctx.retries_remaining == 0 {
                        return fail(
                            action,
                            OperationError::new(
                                ErrorKind::InternalFailure,
                                stabilizer.type_name(),
                                model.display_name(),
                                "stabilization retry budget exhausted",
                            ),
                        );
                    }
                    ctx.retries_remaining -= 1;
                    warn!(
                        "{} [{}] not stabilized yet, {} retries remaining",
                        action,
                        model.display_name(),
                        ctx.retries_remaining
                    );
                }
                Err(e) => return fail(action, e),
            }
        }

        if ctx.stabilized {
            info!("{} [{}] stabilized", action, model.display_name());
            return ProgressEvent::success(model);
        }

        ProgressEvent::InProgress {
            model,
            context: ctx,
            delay: self.callback_delay,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn fail(action: &str, err: OperationError) -> ProgressEvent {
    if err.is_defect() {
        error!("{} failed: {}", action, err);
    } else {
        warn!("{} failed: {}", action, err);
    }
    ProgressEvent::failed(err)
}
