use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{sort_timestamp, Record, Region};

/// Well-known metadata key written after a clean sync pass.
pub const LAST_SYNC_AT: &str = "last_sync_at";

/// Small key/value bookkeeping record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }
}

impl Record for Metadata {
    const REGION: Region = Region::Metadata;

    fn key(&self) -> String {
        self.key.clone()
    }

    fn sort_key(&self) -> String {
        sort_timestamp(&self.updated_at)
    }
}
