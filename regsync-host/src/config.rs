//! Engine configuration loading.
//!
//! Values come from an optional JSON file; command-line flags override them.

use std::path::Path;

use anyhow::{Context, Result};
use regsync_engine::EngineConfig;
use tracing::debug;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub retry_budget: Option<u32>,
    pub callback_delay_secs: Option<u64>,
}

pub async fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(budget) = overrides.retry_budget {
        config.retry_budget = budget;
    }
    if let Some(secs) = overrides.callback_delay_secs {
        config.callback_delay_secs = secs;
    }

    debug!("Engine config: {:?}", config);
    Ok(config)
}
