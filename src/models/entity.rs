use uuid::Uuid;

use super::EntityType;
use crate::db::Record;

/// A locally cached domain entity that can be written while offline.
///
/// The cache row and the queued create share the same client-issued id.
pub trait CachedEntity: Record + Clone + 'static {
    const ENTITY_TYPE: EntityType;

    /// Caller-supplied fields for a new entity.
    type Draft: Send;

    /// Builds a new, not-yet-confirmed entity.
    fn from_draft(id: Uuid, draft: Self::Draft) -> Self;

    fn id(&self) -> Uuid;

    fn is_pending(&self) -> bool;

    fn set_pending(&mut self, pending: bool);
}
