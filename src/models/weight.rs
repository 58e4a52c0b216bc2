use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{CachedEntity, EntityType};
use crate::db::{sort_timestamp, Record, Region};

/// A body-weight measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: Uuid,
    pub weight_kg: f64,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
    /// Written locally, not yet confirmed by the server.
    #[serde(default)]
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWeight {
    pub weight_kg: f64,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewWeight {
    pub fn new(weight_kg: f64) -> Self {
        Self {
            weight_kg,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Record for WeightEntry {
    const REGION: Region = Region::Weights;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.recorded_at)
    }
}

impl CachedEntity for WeightEntry {
    const ENTITY_TYPE: EntityType = EntityType::Weight;
    type Draft = NewWeight;

    fn from_draft(id: Uuid, draft: NewWeight) -> Self {
        Self {
            id,
            weight_kg: draft.weight_kg,
            recorded_at: draft.recorded_at,
            notes: draft.notes,
            is_pending: true,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn is_pending(&self) -> bool {
        self.is_pending
    }

    fn set_pending(&mut self, pending: bool) {
        self.is_pending = pending;
    }
}

impl fmt::Display for WeightEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:.1} kg",
            self.recorded_at.format("%Y-%m-%d %H:%M"),
            self.weight_kg
        )?;
        if let Some(notes) = &self.notes {
            write!(f, "  ({})", notes)?;
        }
        if self.is_pending {
            write!(f, "  [pending]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_draft_marks_pending() {
        let id = Uuid::new_v4();
        let entry = WeightEntry::from_draft(id, NewWeight::new(70.2).with_notes("after run"));

        assert_eq!(entry.id, id);
        assert_eq!(entry.weight_kg, 70.2);
        assert_eq!(entry.notes.as_deref(), Some("after run"));
        assert!(entry.is_pending);
    }

    #[test]
    fn test_display() {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 7, 30, 0).unwrap();
        let entry = WeightEntry::from_draft(Uuid::new_v4(), NewWeight::new(69.8).recorded_at(at));

        let output = entry.to_string();
        assert!(output.contains("2026-10-01 07:30"));
        assert!(output.contains("69.8 kg"));
        assert!(output.contains("[pending]"));
    }
}
