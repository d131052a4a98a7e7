//! Request payloads and response shapes for the Pipedrive endpoints.
//!
//! # Design
//! Each payload is a struct whose optional fields are skipped when unset,
//! so an absent input never reaches Pipedrive as `null`. An id of `0` or an
//! empty string counts as unset. Responses are parsed into one of two
//! shapes; anything else is an unexpected response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numeric identifier Pipedrive assigns to organizations, persons, deals,
/// users and stages.
pub type EntityId = u64;

fn is_unset_id(id: &Option<EntityId>) -> bool {
    matches!(id, None | Some(0))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Body for `POST /organizations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub owner_id: Option<EntityId>,
}

/// Body for `POST /persons`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub owner_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub org_id: Option<EntityId>,
}

/// Input for `POST /deals`.
///
/// `message` is never sent under its own name: the client sanitizes it and
/// stores it in the configured deal custom field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDeal {
    pub title: String,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub user_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub person_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub org_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "is_unset_id")]
    pub stage_id: Option<EntityId>,
    #[serde(default, skip_serializing)]
    pub message: Option<String>,
}

/// Wire body for `POST /deals`: the deal's standard fields plus custom fields.
#[derive(Debug, Serialize)]
pub(crate) struct DealPayload<'a> {
    #[serde(flatten)]
    pub deal: &'a NewDeal,
    #[serde(flatten)]
    pub custom_fields: BTreeMap<&'a str, String>,
}

/// Body for `PUT /deals/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DealStageUpdate {
    pub stage_id: EntityId,
}

/// Body for `POST /notes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewNote {
    pub content: String,
    pub deal_id: EntityId,
}

/// `{"data": {"id": ...}}` returned by the create endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentifierResponse {
    pub data: EntityRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

/// `{"success": bool}` envelope Pipedrive puts on every reply.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
