mod entity;
mod exercise;
mod meal;
mod meal_type;
mod metadata;
mod operation;
mod weight;

pub use entity::CachedEntity;
pub use exercise::{ExerciseEntry, NewExercise};
pub use meal::{MealEntry, NewMeal};
pub use meal_type::MealType;
pub use metadata::{Metadata, LAST_SYNC_AT};
pub use operation::{Action, DeadLetter, EntityType, NewOperation, PendingOperation};
pub use weight::{NewWeight, WeightEntry};
