//! Entity Module
//!
//! Plan records as the cache sees them: a stable id, a mutable status and
//! an opaque bag of every other attribute.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields merged into an entity by an optimistic update.
pub type Patch = Map<String, Value>;

/// A collection handed to consumers. Shared, never mutated in place.
pub type Collection = Arc<Vec<Entity>>;

// == Entity Id ==
/// Stable identifier of a plan record. The remote API uses numbers, but
/// string ids are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(i64),
    Text(String),
}

impl EntityId {
    /// Ids a path segment may refer to. A numeric segment matches both the
    /// number and the string of the same digits.
    pub fn candidates(raw: &str) -> Vec<Self> {
        let text = EntityId::Text(raw.to_string());
        match raw.parse::<i64>() {
            Ok(n) => vec![EntityId::Num(n), text],
            Err(_) => vec![text],
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Num(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

// == Entity ==
/// A cached plan record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Every other attribute, untouched by the cache
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Some(status.into()),
            fields: Map::new(),
        }
    }

    /// Adds an attribute, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    // == Merge ==
    /// Applies a partial update. `id` is never rewritten; a null or
    /// non-string `status` clears the status.
    pub fn merge(&mut self, patch: &Patch) {
        for (name, value) in patch {
            match name.as_str() {
                "id" => {}
                "status" => self.status = value.as_str().map(str::to_string),
                _ => {
                    self.fields.insert(name.clone(), value.clone());
                }
            }
        }
    }

    /// Returns a copy with the patch applied.
    pub fn merged(&self, patch: &Patch) -> Self {
        let mut entity = self.clone();
        entity.merge(patch);
        entity
    }
}
