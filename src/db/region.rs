use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// A logical region of the local store, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    PendingOperations,
    Weights,
    Meals,
    Exercises,
    Metadata,
    DeadLetters,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::PendingOperations,
        Region::Weights,
        Region::Meals,
        Region::Exercises,
        Region::Metadata,
        Region::DeadLetters,
    ];

    /// Table backing this region. Static, so safe to interpolate into SQL.
    pub fn table(self) -> &'static str {
        match self {
            Region::PendingOperations => "pending_operations",
            Region::Weights => "cached_weights",
            Region::Meals => "cached_meals",
            Region::Exercises => "cached_exercises",
            Region::Metadata => "metadata",
            Region::DeadLetters => "dead_letters",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// A value that lives in exactly one region.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const REGION: Region;

    /// Primary key.
    fn key(&self) -> String;

    /// Value of the secondary ordering index.
    fn sort_key(&self) -> String;
}

/// Fixed-width RFC 3339 timestamp, so lexical order matches time order.
pub fn sort_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
