use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{CachedEntity, EntityType, MealType};
use crate::db::{sort_timestamp, Record, Region};

/// A logged meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: Uuid,
    pub name: String,
    pub meal_type: MealType,
    pub calories: Option<u32>,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub name: String,
    pub meal_type: MealType,
    pub calories: Option<u32>,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewMeal {
    pub fn new(name: impl Into<String>, meal_type: MealType) -> Self {
        Self {
            name: name.into(),
            meal_type,
            calories: None,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    pub fn with_calories(mut self, calories: u32) -> Self {
        self.calories = Some(calories);
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

impl Record for MealEntry {
    const REGION: Region = Region::Meals;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.recorded_at)
    }
}

impl CachedEntity for MealEntry {
    const ENTITY_TYPE: EntityType = EntityType::Meal;
    type Draft = NewMeal;

    fn from_draft(id: Uuid, draft: NewMeal) -> Self {
        Self {
            id,
            name: draft.name,
            meal_type: draft.meal_type,
            calories: draft.calories,
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

impl fmt::Display for MealEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:<9} {}",
            self.recorded_at.format("%Y-%m-%d %H:%M"),
            self.meal_type,
            self.name
        )?;
        if let Some(calories) = self.calories {
            write!(f, "  {} kcal", calories)?;
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

    #[test]
    fn test_meal_builder() {
        let draft = NewMeal::new("Oatmeal", MealType::Breakfast)
            .with_calories(350)
            .with_notes("with berries");
        let meal = MealEntry::from_draft(Uuid::new_v4(), draft);

        assert_eq!(meal.name, "Oatmeal");
        assert_eq!(meal.meal_type, MealType::Breakfast);
        assert_eq!(meal.calories, Some(350));
        assert!(meal.is_pending);
        assert!(meal.to_string().contains("350 kcal"));
    }

    #[test]
    fn test_missing_pending_flag_defaults_to_confirmed() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Salad",
            "meal_type": "lunch",
            "calories": null,
            "recorded_at": "2026-10-01T12:00:00Z",
            "notes": null
        });

        let meal: MealEntry = serde_json::from_value(json).unwrap();
        assert!(!meal.is_pending);
    }
}
