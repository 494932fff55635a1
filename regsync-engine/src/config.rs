//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tunables shared by all handlers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Stale polls allowed before stabilization fails.
    pub retry_budget: u32,
    /// Delay the host waits before redelivering an in-progress context.
    pub callback_delay_secs: u64,
    /// Page size cap for list requests.
    pub list_page_size: u32,
    /// Backend limit on registry name length.
    pub identifier_max_length: usize,
}

impl EngineConfig {
    pub fn callback_delay(&self) -> Duration {
        Duration::from_secs(self.callback_delay_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            callback_delay_secs: 30,
            list_page_size: 50,
            identifier_max_length: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"retry_budget": 5}"#).unwrap();
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.callback_delay(), Duration::from_secs(30));
        assert_eq!(config.list_page_size, 50);
    }
}
