//! In-memory registry service with delayed policy visibility.
//!
//! Registry calls are strongly consistent. Policy writes are applied at once
//! (so revision checks on `put_policy` see them) but only become visible to
//! `get_policy` after `visibility_lag` further reads, which is how the remote
//! service behaves right after a write.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    CreateRegistryRequest, DeletePolicyRequest, DeleteRegistryRequest, DescribeRegistryRequest,
    GetPolicyRequest, ListRegistriesRequest, ListRegistriesResponse, PolicyResponse,
    PutPolicyRequest, RegistryDescription, RegistrySummary, ResourceBackend, Result,
    UpdateRegistryRequest,
};
use crate::classify::Operation;
use crate::error::{BackendError, BackendErrorKind};

/// Registries with this prefix are owned by the service itself.
const SYSTEM_REGISTRY_PREFIX: &str = "aws.";

const DEFAULT_ARN_PREFIX: &str = "arn:aws:schemas:us-east-1:123456789012:registry/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub policy: String,
    pub revision_id: String,
}

/// Policy slot of one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Latest write; `None` after a delete.
    pub committed: Option<PolicyVersion>,
    /// What reads currently return.
    pub visible: Option<PolicyVersion>,
    /// Reads left before `visible` catches up with `committed`.
    pub pending_reads: u32,
}

/// Serializable backend state, persisted by the host between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryState {
    pub registries: BTreeMap<String, RegistryRecord>,
    pub policies: BTreeMap<String, PolicyRecord>,
    pub next_revision: u64,
    pub visibility_lag: u32,
    pub arn_prefix: String,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            registries: BTreeMap::new(),
            policies: BTreeMap::new(),
            next_revision: 1,
            visibility_lag: 0,
            arn_prefix: DEFAULT_ARN_PREFIX.to_string(),
        }
    }
}

impl MemoryState {
    fn arn(&self, name: &str) -> String {
        format!("{}{}", self.arn_prefix, name)
    }

    fn allocate_revision(&mut self) -> String {
        let revision = format!("r{}", self.next_revision);
        self.next_revision += 1;
        revision
    }

    fn describe(&self, name: &str) -> Result<RegistryDescription> {
        let record = self
            .registries
            .get(name)
            .ok_or_else(|| not_found_registry(name))?;
        Ok(RegistryDescription {
            registry_name: name.to_string(),
            registry_arn: self.arn(name),
            description: record.description.clone(),
            tags: record.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }
}

#[derive(Default)]
struct Inner {
    state: MemoryState,
    failures: HashMap<Operation, VecDeque<BackendError>>,
    calls: HashMap<Operation, usize>,
}

impl Inner {
    /// Count the call and pop an injected failure, if any.
    fn enter(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!("Injected failure for {}: {}", op.label(), err);
                Err(err)
            }
            None => Ok(()),
        }
    }
}

/// In-memory [`ResourceBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose policy writes stay invisible for `visibility_lag` reads.
    pub fn with_visibility_lag(visibility_lag: u32) -> Self {
        Self::from_state(MemoryState {
            visibility_lag,
            ..Default::default()
        })
    }

    pub fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                ..Default::default()
            }),
        }
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.inner.lock().await.state.clone()
    }

    pub async fn set_visibility_lag(&self, visibility_lag: u32) {
        self.inner.lock().await.state.visibility_lag = visibility_lag;
    }

    /// Fail the next call of `op` with `err`. Failures queue up per operation.
    pub async fn fail_next(&self, op: Operation, err: BackendError) {
        self.inner
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Number of calls made to `op`, including failed ones.
    pub async fn calls(&self, op: Operation) -> usize {
        self.inner.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Create a registry directly, bypassing failure injection.
    pub async fn seed_registry(&self, name: &str, description: Option<&str>) {
        let mut inner = self.inner.lock().await;
        inner.state.registries.insert(
            name.to_string(),
            RegistryRecord {
                description: description.map(str::to_string),
                tags: BTreeMap::new(),
            },
        );
    }

    /// Attach an already visible policy to `name` and return its revision.
    pub async fn seed_policy(&self, name: &str, policy: &str) -> String {
        let mut inner = self.inner.lock().await;
        let revision_id = inner.state.allocate_revision();
        let version = PolicyVersion {
            policy: policy.to_string(),
            revision_id: revision_id.clone(),
        };
        inner.state.policies.insert(
            name.to_string(),
            PolicyRecord {
                committed: Some(version.clone()),
                visible: Some(version),
                pending_reads: 0,
            },
        );
        revision_id
    }
}

fn not_found_registry(name: &str) -> BackendError {
    BackendError::new(
        BackendErrorKind::NotFound,
        format!("registry {} does not exist", name),
    )
}

fn not_found_policy(name: &str) -> BackendError {
    BackendError::new(
        BackendErrorKind::NotFound,
        format!("registry {} has no policy", name),
    )
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BackendError::new(
            BackendErrorKind::Malformed,
            "registry name must not be empty",
        ));
    }
    Ok(())
}

fn check_owned(name: &str) -> Result<()> {
    if name.starts_with(SYSTEM_REGISTRY_PREFIX) {
        return Err(BackendError::new(
            BackendErrorKind::AccessDenied,
            format!("registry {} is owned by the service", name),
        ));
    }
    Ok(())
}

#[async_trait]
impl ResourceBackend for MemoryBackend {
    async fn create_registry(&self, req: CreateRegistryRequest) -> Result<RegistryDescription> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::CreateRegistry)?;
        check_name(&req.registry_name)?;
        check_owned(&req.registry_name)?;

        if inner.state.registries.contains_key(&req.registry_name) {
            return Err(BackendError::new(
                BackendErrorKind::AlreadyExists,
                format!("registry {} already exists", req.registry_name),
            ));
        }

        debug!("Creating registry {}", req.registry_name);
        inner.state.registries.insert(
            req.registry_name.clone(),
            RegistryRecord {
                description: req.description,
                tags: req.tags.into_iter().collect(),
            },
        );
        inner.state.describe(&req.registry_name)
    }

    async fn describe_registry(
        &self,
        req: DescribeRegistryRequest,
    ) -> Result<RegistryDescription> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::ReadRegistry)?;
        check_name(&req.registry_name)?;
        inner.state.describe(&req.registry_name)
    }

    async fn update_registry(&self, req: UpdateRegistryRequest) -> Result<RegistryDescription> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::UpdateRegistry)?;
        check_name(&req.registry_name)?;
        check_owned(&req.registry_name)?;

        let record = inner
            .state
            .registries
            .get_mut(&req.registry_name)
            .ok_or_else(|| not_found_registry(&req.registry_name))?;
        record.description = req.description;
        inner.state.describe(&req.registry_name)
    }

    async fn delete_registry(&self, req: DeleteRegistryRequest) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::DeleteRegistry)?;
        check_name(&req.registry_name)?;
        check_owned(&req.registry_name)?;

        if inner.state.registries.remove(&req.registry_name).is_none() {
            return Err(not_found_registry(&req.registry_name));
        }
        inner.state.policies.remove(&req.registry_name);
        Ok(())
    }

    async fn list_registries(&self, req: ListRegistriesRequest) -> Result<ListRegistriesResponse> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::ListRegistries)?;

        let limit = req.limit.max(1) as usize;
        let mut names = inner
            .state
            .registries
            .keys()
            .filter(|name| req.next_token.as_deref().map_or(true, |token| name.as_str() > token));

        let page: Vec<&String> = names.by_ref().take(limit).collect();
        let has_more = names.next().is_some();

        let registries: Vec<RegistrySummary> = page
            .iter()
            .map(|name| RegistrySummary {
                registry_name: (*name).clone(),
                registry_arn: inner.state.arn(name),
            })
            .collect();
        let next_token = if has_more {
            registries.last().map(|r| r.registry_name.clone())
        } else {
            None
        };

        Ok(ListRegistriesResponse {
            registries,
            next_token,
        })
    }

    async fn get_policy(&self, req: GetPolicyRequest) -> Result<PolicyResponse> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::GetPolicy)?;
        check_name(&req.registry_name)?;

        if !inner.state.registries.contains_key(&req.registry_name) {
            return Err(not_found_registry(&req.registry_name));
        }

        let record = inner
            .state
            .policies
            .get_mut(&req.registry_name)
            .ok_or_else(|| not_found_policy(&req.registry_name))?;

        if record.pending_reads > 0 {
            record.pending_reads -= 1;
        } else {
            record.visible = record.committed.clone();
        }

        match &record.visible {
            Some(version) => Ok(PolicyResponse {
                policy: version.policy.clone(),
                revision_id: version.revision_id.clone(),
            }),
            None => Err(not_found_policy(&req.registry_name)),
        }
    }

    async fn put_policy(&self, req: PutPolicyRequest) -> Result<PolicyResponse> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::PutPolicy)?;
        check_name(&req.registry_name)?;

        if !inner.state.registries.contains_key(&req.registry_name) {
            return Err(not_found_registry(&req.registry_name));
        }

        let current = inner
            .state
            .policies
            .get(&req.registry_name)
            .and_then(|p| p.committed.as_ref())
            .map(|v| v.revision_id.clone());
        if let Some(expected) = &req.revision_id {
            if current.as_ref() != Some(expected) {
                return Err(BackendError::new(
                    BackendErrorKind::Conflict,
                    format!(
                        "revision {} is stale, current is {}",
                        expected,
                        current.as_deref().unwrap_or("none")
                    ),
                ));
            }
        }

        let revision_id = inner.state.allocate_revision();
        let lag = inner.state.visibility_lag;
        let version = PolicyVersion {
            policy: req.policy,
            revision_id: revision_id.clone(),
        };
        debug!(
            "Put policy for {} at revision {}",
            req.registry_name, revision_id
        );

        let record = inner
            .state
            .policies
            .entry(req.registry_name)
            .or_default();
        record.committed = Some(version.clone());
        record.pending_reads = lag;
        if lag == 0 {
            record.visible = Some(version.clone());
        }

        Ok(PolicyResponse {
            policy: version.policy,
            revision_id,
        })
    }

    async fn delete_policy(&self, req: DeletePolicyRequest) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(Operation::DeletePolicy)?;
        check_name(&req.registry_name)?;

        let lag = inner.state.visibility_lag;
        let record = inner
            .state
            .policies
            .get_mut(&req.registry_name)
            .filter(|p| p.committed.is_some())
            .ok_or_else(|| not_found_policy(&req.registry_name))?;

        record.committed = None;
        record.pending_reads = lag;
        if lag == 0 {
            record.visible = None;
        }
        Ok(())
    }
}
