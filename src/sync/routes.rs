//! Dispatch table from entity kind to remote path and verbs.
//!
//! Adding an entity kind is a new table entry, not new control flow.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::remote::{RemoteApi, RemoteError};
use crate::models::{Action, EntityType, PendingOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Post,
    Patch,
    Delete,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No route registered for entity type '{0}'")]
    NoRoute(EntityType),

    #[error("Operation {op} ({action}) has no target id in its payload")]
    MissingId { op: Uuid, action: Action },

    #[error("Update operation {0} has no patch in its payload")]
    MissingPatch(Uuid),
}

/// Where and how one entity kind is written remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Collection path, e.g. `/weights`.
    pub path: String,
    pub create: Verb,
    pub update: Verb,
    pub delete: Verb,
}

impl Route {
    /// REST collection defaults: POST the collection, PATCH and DELETE the
    /// member.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create: Verb::Post,
            update: Verb::Patch,
            delete: Verb::Delete,
        }
    }

    pub fn verb(&self, action: Action) -> Verb {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    fn member(&self, id: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), id)
    }

    /// Builds the wire request replaying `op`.
    pub fn request(&self, op: &PendingOperation) -> Result<RemoteRequest, DispatchError> {
        let verb = self.verb(op.action);

        match op.action {
            Action::Create => Ok(RemoteRequest {
                verb,
                path: self.path.clone(),
                body: Some(op.payload.clone()),
            }),
            Action::Update => {
                let id = op.target_id().ok_or(DispatchError::MissingId {
                    op: op.id,
                    action: op.action,
                })?;
                let patch = op
                    .payload
                    .get("patch")
                    .cloned()
                    .ok_or(DispatchError::MissingPatch(op.id))?;
                Ok(RemoteRequest {
                    verb,
                    path: self.member(id),
                    body: Some(patch),
                })
            }
            Action::Delete => {
                let id = op.target_id().ok_or(DispatchError::MissingId {
                    op: op.id,
                    action: op.action,
                })?;
                Ok(RemoteRequest {
                    verb,
                    path: self.member(id),
                    body: None,
                })
            }
        }
    }
}

/// A fully resolved remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub verb: Verb,
    pub path: String,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub async fn send(&self, remote: &dyn RemoteApi) -> Result<(), RemoteError> {
        let empty = Value::Null;
        let body = self.body.as_ref().unwrap_or(&empty);

        match self.verb {
            Verb::Post => remote.post(&self.path, body).await,
            Verb::Patch => remote.patch(&self.path, body).await,
            Verb::Delete => remote.delete(&self.path).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<EntityType, Route>,
}

impl RouteTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, entity_type: EntityType, route: Route) -> Self {
        self.routes.insert(entity_type, route);
        self
    }

    pub fn route(&self, entity_type: EntityType) -> Option<&Route> {
        self.routes.get(&entity_type)
    }

    pub fn request(&self, op: &PendingOperation) -> Result<RemoteRequest, DispatchError> {
        self.route(op.entity_type)
            .ok_or(DispatchError::NoRoute(op.entity_type))?
            .request(op)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::empty()
            .with_route(EntityType::Weight, Route::collection("/weights"))
            .with_route(EntityType::Meal, Route::collection("/meals"))
            .with_route(EntityType::Exercise, Route::collection("/exercises"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOperation;
    use serde_json::json;

    fn pending(op: NewOperation) -> PendingOperation {
        op.into_pending()
    }

    #[test]
    fn test_default_table_covers_every_entity_type() {
        let table = RouteTable::default();
        for entity_type in EntityType::ALL {
            assert!(table.route(entity_type).is_some(), "{}", entity_type);
        }
    }

    #[test]
    fn test_create_posts_collection_with_full_record() {
        let id = Uuid::new_v4();
        let record = json!({ "id": id, "weight_kg": 70.0 });
        let op = pending(NewOperation::create(EntityType::Weight, &record).unwrap());

        let request = RouteTable::default().request(&op).unwrap();
        assert_eq!(request.verb, Verb::Post);
        assert_eq!(request.path, "/weights");
        assert_eq!(request.body, Some(record));
    }

    #[test]
    fn test_update_patches_member_with_patch_only() {
        let id = Uuid::new_v4();
        let op = pending(NewOperation::update(
            EntityType::Meal,
            id,
            json!({ "calories": 420 }),
        ));

        let request = RouteTable::default().request(&op).unwrap();
        assert_eq!(request.verb, Verb::Patch);
        assert_eq!(request.path, format!("/meals/{}", id));
        assert_eq!(request.body, Some(json!({ "calories": 420 })));
    }

    #[test]
    fn test_delete_targets_member_without_body() {
        let id = Uuid::new_v4();
        let op = pending(NewOperation::delete(EntityType::Exercise, id));

        let request = RouteTable::default().request(&op).unwrap();
        assert_eq!(request.verb, Verb::Delete);
        assert_eq!(request.path, format!("/exercises/{}", id));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_custom_verb_mapping() {
        let mut route = Route::collection("/v2/weights/");
        route.update = Verb::Post;
        let table = RouteTable::empty().with_route(EntityType::Weight, route);

        let id = Uuid::new_v4();
        let op = pending(NewOperation::update(EntityType::Weight, id, json!({})));
        let request = table.request(&op).unwrap();
        assert_eq!(request.verb, Verb::Post);
        assert_eq!(request.path, format!("/v2/weights/{}", id));
    }

    #[test]
    fn test_dispatch_errors() {
        let table = RouteTable::empty();
        let op = pending(NewOperation::delete(EntityType::Meal, Uuid::new_v4()));
        assert!(matches!(table.request(&op), Err(DispatchError::NoRoute(EntityType::Meal))));

        let mut malformed = pending(NewOperation::update(EntityType::Meal, Uuid::new_v4(), json!({})));
        malformed.payload = json!({ "id": Uuid::new_v4() });
        assert!(matches!(
            RouteTable::default().request(&malformed),
            Err(DispatchError::MissingPatch(_))
        ));

        malformed.payload = json!({ "patch": {} });
        assert!(matches!(
            RouteTable::default().request(&malformed),
            Err(DispatchError::MissingId { .. })
        ));
    }
}
