//! Offline-first local persistence and background sync for weight, meal and
//! exercise entries.
//!
//! The local SQLite store is the source of truth for reads; every write is
//! recorded as a pending operation and replayed against the server once
//! connectivity returns.

pub mod config;
pub mod db;
pub mod models;
pub mod sync;
