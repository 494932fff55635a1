//! Resource backend capability.
//!
//! The remote schema registry service as seen by the handlers:
//! - registries: create, describe, update, delete, list
//! - registry policies: get, put (revision-checked), delete
//!
//! Implementations are injected into handlers as `Arc<dyn ResourceBackend>`.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BackendError;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRegistryRequest {
    pub registry_name: String,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeRegistryRequest {
    pub registry_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRegistryRequest {
    pub registry_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRegistryRequest {
    pub registry_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRegistriesRequest {
    pub limit: u32,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPolicyRequest {
    pub registry_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPolicyRequest {
    pub registry_name: String,
    pub policy: String,
    /// Revision the write is based on; `None` for a first write.
    pub revision_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePolicyRequest {
    pub registry_name: String,
}

/// Registry as reported by create/describe/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDescription {
    pub registry_name: String,
    pub registry_arn: String,
    pub description: Option<String>,
    /// Empty when the registry has no tags.
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySummary {
    pub registry_name: String,
    pub registry_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRegistriesResponse {
    pub registries: Vec<RegistrySummary>,
    pub next_token: Option<String>,
}

/// Policy document and its revision marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResponse {
    pub policy: String,
    pub revision_id: String,
}

/// Remote registry service.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    async fn create_registry(&self, req: CreateRegistryRequest) -> Result<RegistryDescription>;

    async fn describe_registry(&self, req: DescribeRegistryRequest)
        -> Result<RegistryDescription>;

    async fn update_registry(&self, req: UpdateRegistryRequest) -> Result<RegistryDescription>;

    async fn delete_registry(&self, req: DeleteRegistryRequest) -> Result<()>;

    async fn list_registries(&self, req: ListRegistriesRequest) -> Result<ListRegistriesResponse>;

    /// Current policy and revision. `NotFound` if the registry or its policy is missing.
    async fn get_policy(&self, req: GetPolicyRequest) -> Result<PolicyResponse>;

    /// Write a policy. Fails with `Conflict` if `revision_id` is stale.
    async fn put_policy(&self, req: PutPolicyRequest) -> Result<PolicyResponse>;

    async fn delete_policy(&self, req: DeletePolicyRequest) -> Result<()>;
}
