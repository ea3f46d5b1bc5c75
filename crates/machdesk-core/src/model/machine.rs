// ── Machine domain type ──

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Resource;
use super::entity_id::EntityId;

/// A production machine as served by the `/machines` endpoint.
///
/// Fields the backend adds later land in `extra` so a refresh never drops
/// data the client does not model yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update for a [`Machine`]. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinePatch {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MachinePatch {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            category: None,
            group: None,
            manufacturer: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    /// Set an unmodelled field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Resource for Machine {
    type Patch = MachinePatch;

    const KIND: &'static str = "machine";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn patch_target(patch: &MachinePatch) -> &EntityId {
        &patch.id
    }

    fn apply_patch(&mut self, patch: MachinePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(group) = patch.group {
            self.group = group;
        }
        if let Some(manufacturer) = patch.manufacturer {
            self.manufacturer = manufacturer;
        }
        if patch.created_at.is_some() {
            self.created_at = patch.created_at;
        }
        self.extra.extend(patch.extra);
    }

    fn from_patch(patch: MachinePatch) -> Self {
        let mut machine = Self {
            id: patch.id.clone(),
            name: String::new(),
            category: String::new(),
            group: String::new(),
            manufacturer: String::new(),
            created_at: None,
            extra: Map::new(),
        };
        machine.apply_patch(patch);
        machine
    }
}
