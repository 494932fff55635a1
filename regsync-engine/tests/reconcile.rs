//! End-to-end reconciliation tests against the in-memory backend.
//!
//! Each test drives handlers the way a host does: one invocation at a time,
//! passing the serialized context from one invocation to the next.

use std::sync::Arc;
use std::time::Duration;

use regsync_engine::classify::Operation;
use regsync_engine::identity::generate_identifier;
use regsync_engine::{
    Action, BackendError, BackendErrorKind, CallbackContext, EngineConfig, ErrorKind,
    HandlerRequest, MemoryBackend, PolicyHandler, ProgressEvent, RegistryHandler,
    ResourceHandler, ResourceModel,
};

fn policy(name: &str, document: &str) -> ResourceModel {
    ResourceModel {
        id: Some(name.to_string()),
        registry_name: Some(name.to_string()),
        policy: Some(document.to_string()),
        ..Default::default()
    }
}

/// Invoke until terminal, round-tripping the context through its blob form.
async fn drive(
    handler: &dyn ResourceHandler,
    action: Action,
    desired: ResourceModel,
) -> (ProgressEvent, usize) {
    let mut blob: Option<String> = None;
    let mut invocations = 0;
    loop {
        let context = blob
            .as_deref()
            .map(|b| CallbackContext::from_blob(b).unwrap());
        let event = handler
            .invoke(action, HandlerRequest::new(desired.clone()), context)
            .await;
        invocations += 1;
        match event.context() {
            Some(ctx) => blob = Some(ctx.to_blob().unwrap()),
            None => return (event, invocations),
        }
    }
}

// =============================================================================
// Policy update convergence
// =============================================================================

#[tokio::test]
async fn test_update_stale_read_then_success() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    assert_eq!(backend.seed_policy("orders", "P1").await, "r1");
    backend.set_visibility_lag(1).await;

    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());

    let first = handler
        .update(HandlerRequest::new(policy("orders", "P2")), None)
        .await;
    let (context, delay) = match &first {
        ProgressEvent::InProgress { context, delay, .. } => (context.clone(), *delay),
        other => panic!("expected in progress, got {:?}", other),
    };
    assert_eq!(delay, Duration::from_secs(30));
    assert_eq!(
        context,
        CallbackContext {
            mutation_issued: true,
            stabilized: false,
            retries_remaining: 2,
            expected_revision: Some("r2".to_string()),
        }
    );

    let second = handler
        .update(HandlerRequest::new(policy("orders", "P2")), Some(context))
        .await;
    match second {
        ProgressEvent::Success { model } => {
            assert_eq!(model.policy.as_deref(), Some("P2"));
            assert_eq!(model.revision_id.as_deref(), Some("r2"));
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(backend.calls(Operation::PutPolicy).await, 1);
}

#[tokio::test]
async fn test_update_converges_after_full_budget() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    backend.seed_policy("orders", "P1").await;
    backend.set_visibility_lag(3).await;

    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());
    let (event, invocations) = drive(&handler, Action::Update, policy("orders", "P2")).await;

    assert!(matches!(event, ProgressEvent::Success { .. }));
    assert_eq!(invocations, 4);
    assert_eq!(backend.calls(Operation::PutPolicy).await, 1);
}

#[tokio::test]
async fn test_update_exhausts_budget() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    backend.seed_policy("orders", "P1").await;
    backend.set_visibility_lag(10).await;

    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());
    let (event, invocations) = drive(&handler, Action::Update, policy("orders", "P2")).await;

    match event {
        ProgressEvent::Failed { error } => {
            assert_eq!(error.kind, ErrorKind::InternalFailure);
            assert!(error.is_defect());
            assert_eq!(error.identifier, "orders");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(invocations, 4);
    assert_eq!(backend.calls(Operation::PutPolicy).await, 1);
}

#[tokio::test]
async fn test_redelivered_context_does_not_reissue_put() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    backend.seed_policy("orders", "P1").await;
    backend.set_visibility_lag(5).await;

    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());
    let first = handler
        .update(HandlerRequest::new(policy("orders", "P2")), None)
        .await;
    let context = first.context().cloned().unwrap();

    // The host delivers the same context twice.
    for _ in 0..2 {
        let event = handler
            .update(
                HandlerRequest::new(policy("orders", "P2")),
                Some(context.clone()),
            )
            .await;
        assert_eq!(event.context().map(|c| c.retries_remaining), Some(1));
    }
    assert_eq!(backend.calls(Operation::PutPolicy).await, 1);
}

#[tokio::test]
async fn test_concurrent_write_is_conflict() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    backend.seed_policy("orders", "P1").await;
    backend
        .fail_next(
            Operation::PutPolicy,
            BackendError::new(BackendErrorKind::Conflict, "revision r1 is stale"),
        )
        .await;

    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());
    let event = handler
        .update(HandlerRequest::new(policy("orders", "P2")), None)
        .await;
    match event {
        ProgressEvent::Failed { error } => {
            assert_eq!(error.kind, ErrorKind::Conflict);
            assert!(!error.is_defect());
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_throttled_put_is_general_service_error() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_registry("orders", None).await;
    backend.seed_policy("orders", "P1").await;
    backend
        .fail_next(
            Operation::PutPolicy,
            BackendError::bare(BackendErrorKind::Throttled),
        )
        .await;

    let handler = PolicyHandler::new(backend, EngineConfig::default());
    let event = handler
        .update(HandlerRequest::new(policy("orders", "P2")), None)
        .await;
    match event {
        ProgressEvent::Failed { error } => {
            assert_eq!(error.kind, ErrorKind::GeneralServiceError);
            assert!(error.message.starts_with("PutPolicy failed"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

// =============================================================================
// Policy lifecycle
// =============================================================================

#[tokio::test]
async fn test_policy_create_then_delete() {
    let backend = Arc::new(MemoryBackend::with_visibility_lag(2));
    backend.seed_registry("orders", None).await;
    let handler = PolicyHandler::new(backend.clone(), EngineConfig::default());

    let (created, _) = drive(&handler, Action::Create, policy("orders", "P1")).await;
    assert_eq!(created.model().and_then(|m| m.policy.as_deref()), Some("P1"));

    let (deleted, invocations) = drive(&handler, Action::Delete, policy("orders", "P1")).await;
    assert!(matches!(deleted, ProgressEvent::Success { .. }));
    assert_eq!(invocations, 3);

    let read = handler
        .read(HandlerRequest::new(ResourceModel::named("orders")))
        .await;
    assert!(matches!(
        read,
        ProgressEvent::Failed { error } if error.kind == ErrorKind::NotFound
    ));
}

#[tokio::test]
async fn test_concurrent_operations_share_one_handler() {
    let backend = Arc::new(MemoryBackend::with_visibility_lag(1));
    for i in 0..8 {
        backend.seed_registry(&format!("reg-{}", i), None).await;
    }
    let handler = Arc::new(PolicyHandler::new(backend.clone(), EngineConfig::default()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("reg-{}", i);
            drive(handler.as_ref(), Action::Create, policy(&name, &name)).await
        }));
    }
    for task in tasks {
        let (event, _) = task.await.unwrap();
        assert!(matches!(event, ProgressEvent::Success { .. }));
    }
    assert_eq!(backend.calls(Operation::PutPolicy).await, 8);
}

// =============================================================================
// Registry identity
// =============================================================================

#[tokio::test]
async fn test_create_retry_reuses_generated_name() {
    let backend = Arc::new(MemoryBackend::new());
    let handler = RegistryHandler::new(backend.clone(), EngineConfig::default());
    let request = HandlerRequest::new(ResourceModel::default()).with_identity("MyReg", "tok123");

    let first = handler.create(request.clone(), None).await;
    let id = first.model().and_then(|m| m.id.clone()).unwrap();
    assert_eq!(id, id.to_lowercase());
    assert!(id.len() <= 50);
    assert_eq!(id, generate_identifier("MyReg", "tok123", 50));

    // The retry targets the same remote name, which now exists.
    let retry = handler.create(request, None).await;
    assert!(matches!(
        retry,
        ProgressEvent::Failed { error } if error.kind == ErrorKind::AlreadyExists && error.identifier == id
    ));
    assert_eq!(backend.snapshot().await.registries.len(), 1);
}
