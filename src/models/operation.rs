use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::{sort_timestamp, Record, Region};

/// Logical kind of a synced entity. Stored as a lowercase string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Weight,
    Meal,
    Exercise,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Weight, EntityType::Meal, EntityType::Exercise];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Weight => "weight",
            EntityType::Meal => "meal",
            EntityType::Exercise => "exercise",
        }
    }

    /// Region holding the optimistic cache for this kind.
    pub fn cache_region(self) -> Region {
        match self {
            EntityType::Weight => Region::Weights,
            EntityType::Meal => Region::Meals,
            EntityType::Exercise => Region::Exercises,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weight" => Ok(EntityType::Weight),
            "meal" => Ok(EntityType::Meal),
            "exercise" => Ok(EntityType::Exercise),
            _ => Err(format!(
                "Invalid entity type '{}'. Valid options: weight, meal, exercise",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.pad(name)
    }
}

/// An operation to be queued; id, timestamp and retry count are assigned on
/// enqueue.
///
/// Payload shapes: the full record for `create`, `{"id", "patch"}` for
/// `update`, and the bare id string for `delete`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub entity_type: EntityType,
    pub action: Action,
    pub payload: Value,
}

impl NewOperation {
    pub fn create<T: Serialize>(entity_type: EntityType, record: &T) -> serde_json::Result<Self> {
        Ok(Self {
            entity_type,
            action: Action::Create,
            payload: serde_json::to_value(record)?,
        })
    }

    pub fn update(entity_type: EntityType, id: Uuid, patch: Value) -> Self {
        Self {
            entity_type,
            action: Action::Update,
            payload: json!({ "id": id, "patch": patch }),
        }
    }

    pub fn delete(entity_type: EntityType, id: Uuid) -> Self {
        Self {
            entity_type,
            action: Action::Delete,
            payload: Value::String(id.to_string()),
        }
    }

    pub(crate) fn into_pending(self) -> PendingOperation {
        PendingOperation {
            id: Uuid::now_v7(),
            entity_type: self.entity_type,
            action: self.action,
            payload: self.payload,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }
}

/// A queued, not-yet-confirmed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub action: Action,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl PendingOperation {
    /// Id of the entity this operation targets, read from the payload.
    pub fn target_id(&self) -> Option<&str> {
        match self.action {
            Action::Create | Action::Update => self.payload.get("id").and_then(Value::as_str),
            Action::Delete => self.payload.as_str(),
        }
    }
}

impl Record for PendingOperation {
    const REGION: Region = Region::PendingOperations;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.created_at)
    }
}

/// An operation that exhausted its retry budget, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub operation: PendingOperation,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(operation: PendingOperation, error: impl Into<String>) -> Self {
        Self {
            operation,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}

impl Record for DeadLetter {
    const REGION: Region = Region::DeadLetters;

    fn key(&self) -> String {
        self.operation.id.to_string()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.failed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!(EntityType::from_str("Weight").unwrap(), EntityType::Weight);
        assert_eq!(EntityType::from_str("meal").unwrap(), EntityType::Meal);
        assert!(EntityType::from_str("sleep").is_err());
    }

    #[test]
    fn test_payload_shapes() {
        let id = Uuid::new_v4();

        let create = NewOperation::create(EntityType::Weight, &json!({ "id": id, "weight_kg": 70.0 }))
            .unwrap()
            .into_pending();
        assert_eq!(create.target_id(), Some(id.to_string().as_str()));
        assert_eq!(create.retry_count, 0);

        let update =
            NewOperation::update(EntityType::Meal, id, json!({ "calories": 450 })).into_pending();
        assert_eq!(update.payload["patch"]["calories"], 450);
        assert_eq!(update.target_id(), Some(id.to_string().as_str()));

        let delete = NewOperation::delete(EntityType::Exercise, id).into_pending();
        assert_eq!(delete.payload, Value::String(id.to_string()));
        assert_eq!(delete.target_id(), Some(id.to_string().as_str()));
    }

    #[test]
    fn test_operation_ids_follow_creation_order() {
        let first = NewOperation::delete(EntityType::Weight, Uuid::new_v4()).into_pending();
        let second = NewOperation::delete(EntityType::Weight, Uuid::new_v4()).into_pending();

        assert!(first.id < second.id);
        assert!(first.sort_key() <= second.sort_key());
    }

    #[test]
    fn test_entity_type_stored_as_string_tag() {
        let op = NewOperation::delete(EntityType::Exercise, Uuid::new_v4()).into_pending();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["entity_type"], "exercise");
        assert_eq!(json["action"], "delete");
    }
}
