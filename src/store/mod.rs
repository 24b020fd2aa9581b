//! Time-series store interface shared by every job.
//!
//! The store is a JSON tree addressed by slash-separated paths. Collections
//! (`live_data`, `alerts`) are appended to under generated, ordered keys;
//! single records (`efficiency_proof`, `predictions_ml`, `reports/latest`)
//! are overwritten whole.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Raw readings appended by the ingest bridge.
pub const LIVE_DATA: &str = "live_data";
/// Alerts appended by the rules engine and batch analytics.
pub const ALERTS: &str = "alerts";
/// Latest efficiency comparison.
pub const EFFICIENCY_PROOF: &str = "efficiency_proof";
/// Latest solar forecast.
pub const PREDICTIONS: &str = "predictions_ml";
/// Latest performance report.
pub const LATEST_REPORT: &str = "reports/latest";

/// Field every collection is ordered by.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Query result: generated key to record, in key order.
pub type Snapshot = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status} for {path}")]
    Status { path: String, status: u16 },
    #[error("cannot encode or decode record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Operations the jobs need from the external database.
///
/// Implementations take `&self` so one handle can be shared by every
/// component of a process.
pub trait Store {
    /// Appends `record` under a new key that sorts after every existing key
    /// at `path`, returning the key.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError>;

    /// Replaces whatever is stored at `path` with `record`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn overwrite(&self, path: &str, record: &Value) -> Result<(), StoreError>;

    /// Returns the value at `path`, or `None` if nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the read fails.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Children of `path` whose `order_by` field is at least `start`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the read fails.
    fn query_range(&self, path: &str, order_by: &str, start: &Value)
    -> Result<Snapshot, StoreError>;

    /// The `n` children of `path` with the greatest `order_by` values.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the read fails.
    fn query_last(&self, path: &str, order_by: &str, n: usize) -> Result<Snapshot, StoreError>;
}

/// Serializes `record` and appends it at `path`.
///
/// # Errors
///
/// Returns a `StoreError` if encoding or the write fails.
pub fn append_record<T: Serialize>(
    store: &dyn Store,
    path: &str,
    record: &T,
) -> Result<String, StoreError> {
    store.append(path, &serde_json::to_value(record)?)
}

/// Serializes `record` and overwrites `path` with it.
///
/// # Errors
///
/// Returns a `StoreError` if encoding or the write fails.
pub fn overwrite_record<T: Serialize>(
    store: &dyn Store,
    path: &str,
    record: &T,
) -> Result<(), StoreError> {
    store.overwrite(path, &serde_json::to_value(record)?)
}

/// Reads and decodes the record at `path`.
///
/// # Errors
///
/// Returns a `StoreError` if the read fails or the record does not decode.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn Store,
    path: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(path)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}

/// Orders two JSON scalars the way the realtime database orders children:
/// nulls, then booleans, then numbers, then strings. Objects and arrays
/// sort last and compare equal.
pub(crate) fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cmp::Ordering;

    #[test]
    fn values_order_like_the_database() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
        assert_eq!(
            compare_values(&json!("2024-06-01T10:00:00"), &json!("2024-06-01T09:59:59")),
            Ordering::Greater
        );
    }

    #[test]
    fn typed_helpers_round_trip() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Note {
            text: String,
        }

        let store = MemoryStore::new();
        let note = Note {
            text: "hello".into(),
        };
        overwrite_record(&store, "notes/one", &note).unwrap();
        let back: Option<Note> = get_record(&store, "notes/one").unwrap();
        assert_eq!(back, Some(note));

        let missing: Option<Note> = get_record(&store, "notes/two").unwrap();
        assert!(missing.is_none());
    }
}
