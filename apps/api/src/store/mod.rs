//! Named-collection storage.
//!
//! A collection is an insertion-ordered list of JSON objects keyed by their
//! string `id`. Endpoints only talk to [`CollectionStore`]; the file-backed
//! implementation lives in [`json_file`].

pub mod json_file;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub use json_file::JsonFileStore;

/// A single stored entity. Kept as a raw JSON object so fields the client
/// adds on update survive round trips untouched.
pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed collection data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Record {0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Creates the backing storage for `collection` if it is missing.
    /// Idempotent; every other operation calls it first.
    async fn ensure(&self, collection: &str) -> Result<(), StoreError>;

    async fn load_all(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// `Ok(None)` is a normal miss, distinct from a storage failure.
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Appends a fully populated record and returns it as stored.
    /// A colliding `id` is advanced to the next free value.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Shallow-merges `fields` over the record with `id`. The stored `id`
    /// stays pinned to the argument and `updatedAt` is refreshed.
    async fn replace_at(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Record, StoreError>;

    /// Returns whether a record was removed. Absent ids are not an error.
    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Ids are the creation instant in epoch milliseconds.
pub fn generate_id(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Returns `candidate` unless another record already uses it, in which case
/// the next unused value is picked.
pub(crate) fn unique_id(candidate: String, existing: &[Record]) -> String {
    let taken = |id: &str| existing.iter().any(|r| record_id(r) == Some(id));
    if !taken(&candidate) {
        return candidate;
    }

    if let Ok(mut n) = candidate.parse::<i64>() {
        loop {
            n += 1;
            let next = n.to_string();
            if !taken(&next) {
                return next;
            }
        }
    }

    let mut suffix = 1;
    loop {
        let next = format!("{candidate}-{suffix}");
        if !taken(&next) {
            return next;
        }
        suffix += 1;
    }
}

/// Refreshed `updatedAt` value that never moves behind `previous`.
pub(crate) fn next_updated_at(previous: Option<&Value>, now: DateTime<Utc>) -> String {
    let previous = previous
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    match previous {
        Some(prev) if prev > now => timestamp(prev),
        _ => timestamp(now),
    }
}
