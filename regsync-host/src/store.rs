//! On-disk state between invocations: backend snapshot, callback context,
//! and the desired model.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use regsync_engine::backend::memory::MemoryState;
use regsync_engine::{CallbackContext, MemoryBackend, ProgressEvent, ResourceModel};
use tracing::{debug, info};

/// Load the backend from `path`. A missing file is a fresh, empty backend.
pub async fn load_backend(path: &Path) -> Result<MemoryBackend> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let state: MemoryState = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse backend state {}", path.display()))?;
            debug!(
                "Loaded {} registries from {}",
                state.registries.len(),
                path.display()
            );
            Ok(MemoryBackend::from_state(state))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No backend state at {}, starting empty", path.display());
            Ok(MemoryBackend::new())
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read backend state {}", path.display()))
        }
    }
}

pub async fn save_backend(backend: &MemoryBackend, path: &Path) -> Result<()> {
    let state = backend.snapshot().await;
    let raw = serde_json::to_string_pretty(&state)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write backend state {}", path.display()))
}

/// In-flight contexts keyed by the operation that owns them.
type ContextMap = BTreeMap<String, CallbackContext>;

async fn read_contexts(path: &Path) -> Result<ContextMap> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse contexts {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ContextMap::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read contexts {}", path.display())),
    }
}

async fn write_contexts(path: &Path, contexts: &ContextMap) -> Result<()> {
    if contexts.is_empty() {
        return match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove contexts {}", path.display()))
            }
        };
    }
    let raw = serde_json::to_string_pretty(contexts)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write contexts {}", path.display()))
}

/// Context left by the previous invocation of `operation`; `None` when this
/// is its first invocation. Contexts of other operations are ignored.
pub async fn load_context(path: &Path, operation: &str) -> Result<Option<CallbackContext>> {
    let mut contexts = read_contexts(path).await?;
    let context = contexts.remove(operation);
    if context.is_none() && !contexts.is_empty() {
        debug!(
            "No context for {}, {} other operation(s) in flight",
            operation,
            contexts.len()
        );
    }
    Ok(context)
}

/// Persist the context of an in-progress event; drop it once terminal.
/// Only the entry of `operation` is touched.
pub async fn store_context(path: &Path, operation: &str, event: &ProgressEvent) -> Result<()> {
    let mut contexts = read_contexts(path).await?;
    let changed = match event.context() {
        Some(ctx) => {
            contexts.insert(operation.to_string(), ctx.clone());
            true
        }
        None => contexts.remove(operation).is_some(),
    };
    if changed {
        write_contexts(path, &contexts).await?;
    }
    Ok(())
}

pub async fn load_model(path: &Path) -> Result<ResourceModel> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse model {}", path.display()))
}
