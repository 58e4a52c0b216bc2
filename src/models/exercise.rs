use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{CachedEntity, EntityType};
use crate::db::{sort_timestamp, Record, Region};

/// A completed exercise session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub id: Uuid,
    pub activity: String,
    pub duration_minutes: u32,
    pub calories_burned: Option<u32>,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub activity: String,
    pub duration_minutes: u32,
    pub calories_burned: Option<u32>,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewExercise {
    pub fn new(activity: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            activity: activity.into(),
            duration_minutes,
            calories_burned: None,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    pub fn with_calories_burned(mut self, calories: u32) -> Self {
        self.calories_burned = Some(calories);
        self
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

impl Record for ExerciseEntry {
    const REGION: Region = Region::Exercises;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.recorded_at)
    }
}

impl CachedEntity for ExerciseEntry {
    const ENTITY_TYPE: EntityType = EntityType::Exercise;
    type Draft = NewExercise;

    fn from_draft(id: Uuid, draft: NewExercise) -> Self {
        Self {
            id,
            activity: draft.activity,
            duration_minutes: draft.duration_minutes,
            calories_burned: draft.calories_burned,
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

impl fmt::Display for ExerciseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} ({} min)",
            self.recorded_at.format("%Y-%m-%d %H:%M"),
            self.activity,
            self.duration_minutes
        )?;
        if let Some(calories) = self.calories_burned {
            write!(f, "  -{} kcal", calories)?;
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
    fn test_display_shows_duration_and_pending() {
        let at = Utc.with_ymd_and_hms(2026, 10, 2, 7, 30, 0).unwrap();
        let mut session = ExerciseEntry::from_draft(
            Uuid::new_v4(),
            NewExercise::new("running", 42)
                .with_calories_burned(410)
                .recorded_at(at),
        );

        assert_eq!(
            session.to_string(),
            "2026-10-02 07:30  running (42 min)  -410 kcal  [pending]"
        );

        session.set_pending(false);
        assert!(!session.to_string().contains("[pending]"));
    }

    #[test]
    fn test_sort_key_follows_recorded_at() {
        let day = |d| Utc.with_ymd_and_hms(2026, 1, d, 8, 0, 0).unwrap();
        let earlier = ExerciseEntry::from_draft(
            Uuid::new_v4(),
            NewExercise::new("yoga", 30).recorded_at(day(9)),
        );
        let later = ExerciseEntry::from_draft(
            Uuid::new_v4(),
            NewExercise::new("swim", 20).recorded_at(day(10)),
        );
        assert!(earlier.sort_key() < later.sort_key());
    }
}
