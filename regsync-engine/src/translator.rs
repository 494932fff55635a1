//! Model <-> backend request/response mapping.
//!
//! Pure functions: no I/O, no validation. Missing names are passed through
//! as empty strings and left for the backend to reject.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{
    CreateRegistryRequest, DeletePolicyRequest, DeleteRegistryRequest, DescribeRegistryRequest,
    GetPolicyRequest, ListRegistriesRequest, ListRegistriesResponse, PolicyResponse,
    PutPolicyRequest, RegistryDescription, UpdateRegistryRequest,
};
use crate::model::{ResourceModel, Tag};

fn name_of(model: &ResourceModel) -> String {
    model.remote_name().unwrap_or_default().to_string()
}

pub fn to_create_request(model: &ResourceModel) -> CreateRegistryRequest {
    CreateRegistryRequest {
        registry_name: name_of(model),
        description: model.description.clone(),
        tags: model.tag_map(),
    }
}

pub fn to_read_request(model: &ResourceModel) -> DescribeRegistryRequest {
    DescribeRegistryRequest {
        registry_name: name_of(model),
    }
}

pub fn to_update_request(model: &ResourceModel) -> UpdateRegistryRequest {
    UpdateRegistryRequest {
        registry_name: name_of(model),
        description: model.description.clone(),
    }
}

pub fn to_delete_request(model: &ResourceModel) -> DeleteRegistryRequest {
    DeleteRegistryRequest {
        registry_name: name_of(model),
    }
}

pub fn to_list_request(next_token: Option<String>, page_size: u32) -> ListRegistriesRequest {
    ListRegistriesRequest {
        limit: page_size,
        next_token,
    }
}

pub fn to_get_policy_request(model: &ResourceModel) -> GetPolicyRequest {
    GetPolicyRequest {
        registry_name: name_of(model),
    }
}

pub fn to_put_policy_request(model: &ResourceModel, revision_id: Option<String>) -> PutPolicyRequest {
    PutPolicyRequest {
        registry_name: name_of(model),
        policy: model.policy.clone().unwrap_or_default(),
        revision_id,
    }
}

pub fn to_delete_policy_request(model: &ResourceModel) -> DeletePolicyRequest {
    DeletePolicyRequest {
        registry_name: name_of(model),
    }
}

/// Keeps the caller's identifier and overlays what the backend confirmed.
pub fn from_create_response(model: &ResourceModel, response: RegistryDescription) -> ResourceModel {
    from_description(model, response)
}

pub fn from_read_response(model: &ResourceModel, response: RegistryDescription) -> ResourceModel {
    from_description(model, response)
}

fn from_description(model: &ResourceModel, response: RegistryDescription) -> ResourceModel {
    ResourceModel {
        id: model.id.clone(),
        registry_name: Some(response.registry_name),
        registry_arn: Some(response.registry_arn),
        description: response.description,
        tags: to_model_tags(response.tags),
        ..Default::default()
    }
}

/// Registry summaries: name and arn only.
pub fn from_list_response(response: ListRegistriesResponse) -> Vec<ResourceModel> {
    response
        .registries
        .into_iter()
        .map(|summary| ResourceModel {
            registry_name: Some(summary.registry_name),
            registry_arn: Some(summary.registry_arn),
            ..Default::default()
        })
        .collect()
}

/// Overlays the policy document and revision read from the backend.
pub fn from_policy_response(model: &ResourceModel, response: PolicyResponse) -> ResourceModel {
    ResourceModel {
        policy: Some(response.policy),
        revision_id: Some(response.revision_id),
        ..model.clone()
    }
}

/// An empty backend map becomes `None`, never an empty set, so a model
/// created without tags reads back equal to itself.
fn to_model_tags(tags: HashMap<String, String>) -> Option<BTreeSet<Tag>> {
    if tags.is_empty() {
        return None;
    }
    Some(tags.into_iter().map(|(key, value)| Tag { key, value }).collect())
}
