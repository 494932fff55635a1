//! Invocation driving.
//!
//! The host owns the retry loop: it persists the context of an in-progress
//! event and feeds it back on the next invocation, after the requested delay.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;
use regsync_engine::{
    Action, EngineConfig, HandlerRequest, PolicyHandler, ProgressEvent, RegistryHandler,
    ResourceBackend, ResourceHandler,
};
use tracing::info;

use crate::store;

/// Resource types the host can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceType {
    Registry,
    Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Create,
    Read,
    Update,
    Delete,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Create => Action::Create,
            ActionArg::Read => Action::Read,
            ActionArg::Update => Action::Update,
            ActionArg::Delete => Action::Delete,
        }
    }
}

pub fn handler_for(
    resource: ResourceType,
    backend: Arc<dyn ResourceBackend>,
    config: EngineConfig,
) -> Box<dyn ResourceHandler> {
    match resource {
        ResourceType::Registry => Box::new(RegistryHandler::new(backend, config)),
        ResourceType::Policy => Box::new(PolicyHandler::new(backend, config)),
    }
}

/// Key identifying one operation in the context file, e.g.
/// `RegistryPolicy::Update orders`.
pub fn operation_key(type_name: &str, action: Action, request: &HandlerRequest) -> String {
    format!("{}::{} {}", type_name, action, request.desired.display_name())
}

/// Run one invocation, resuming from and updating this operation's entry in
/// the context file.
pub async fn invoke_once(
    handler: &dyn ResourceHandler,
    action: Action,
    request: HandlerRequest,
    context_path: &Path,
) -> Result<ProgressEvent> {
    let operation = operation_key(handler.type_name(), action, &request);
    let context = store::load_context(context_path, &operation).await?;
    if let Some(ctx) = &context {
        info!(
            "Resuming {} ({} retries remaining)",
            operation, ctx.retries_remaining
        );
    }

    let event = handler.invoke(action, request, context).await;
    store::store_context(context_path, &operation, &event).await?;
    Ok(event)
}

/// Invoke until a terminal event, sleeping the requested delay scaled by
/// `delay_scale` between invocations.
pub async fn drive(
    handler: &dyn ResourceHandler,
    action: Action,
    request: HandlerRequest,
    delay_scale: f64,
) -> ProgressEvent {
    let mut context = None;
    let mut invocation = 1;
    loop {
        let event = handler.invoke(action, request.clone(), context).await;
        match event {
            ProgressEvent::InProgress {
                context: next,
                delay,
                ..
            } => {
                let wait = delay.mul_f64(delay_scale.max(0.0));
                info!(
                    "{}::{} in progress after invocation {}, retrying in {:?}",
                    handler.type_name(),
                    action,
                    invocation,
                    wait
                );
                tokio::time::sleep(wait).await;
                context = Some(next);
                invocation += 1;
            }
            terminal => return terminal,
        }
    }
}
