//! Resource model shared by desired and observed state.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A single resource tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Desired or observed state of a registry and its policy.
///
/// Callers author the desired form; the observed form is only ever built by
/// the translator from backend responses. `tags: None` and an empty set are
/// different values: the backend's empty tag map always maps to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceModel {
    /// Primary identifier. Assigned once, never changed afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Policy document attached to the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Revision marker of the policy document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<Tag>>,
}

impl ResourceModel {
    /// Model addressing a registry by name.
    pub fn named(registry_name: impl Into<String>) -> Self {
        Self {
            registry_name: Some(registry_name.into()),
            ..Default::default()
        }
    }

    /// Remote name used to address the registry: the explicit name, else the identifier.
    pub fn remote_name(&self) -> Option<&str> {
        self.registry_name.as_deref().or(self.id.as_deref())
    }

    /// Label for log lines and error messages.
    pub fn display_name(&self) -> &str {
        self.remote_name().unwrap_or("<unnamed>")
    }

    /// Tag set as the backend's key/value map.
    pub fn tag_map(&self) -> HashMap<String, String> {
        self.tags
            .iter()
            .flatten()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect()
    }
}
