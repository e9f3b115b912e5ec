use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::LogEntry;

pub const LOGGED_NUTRIENTS_KEY: &str = "loggedNutrients";
pub const VISIBLE_NUTRIENTS_KEY: &str = "visibleNutrients";
pub const USER_METRICS_KEY: &str = "userMetrics";
pub const AI_GOAL_KEY: &str = "AI-Generated-Goal";
pub const HEIGHT_KEY: &str = "height";
pub const WEIGHT_KEY: &str = "weight";
pub const GENDER_KEY: &str = "gender";
pub const DOB_KEY: &str = "dob";

/// Key of the legacy per-nutrient goal scalar.
#[must_use]
pub fn goal_key(nutrient_id: &str) -> String {
    format!("{nutrient_id}-goal")
}

/// String-keyed JSON store. Values are opaque to the store; each key holds
/// one whole document and writes replace it.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    fn get_all(&self) -> Result<BTreeMap<String, Value>>;
    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool>;
    fn clear(&self) -> Result<()>;
}

pub fn get_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => {
            let typed = serde_json::from_value(value)
                .with_context(|| format!("Malformed value stored under '{key}'"))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

pub fn set_typed<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
        .with_context(|| format!("Failed to encode value for '{key}'"))?;
    store.set(key, &value)
}

/// Read the log list, skipping entries that cannot be decoded at all.
pub fn read_logs(store: &dyn KvStore) -> Result<Vec<LogEntry>> {
    let Some(value) = store.get(LOGGED_NUTRIENTS_KEY)? else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = value else {
        tracing::warn!(key = LOGGED_NUTRIENTS_KEY, "stored log list is not an array, ignoring");
        return Ok(Vec::new());
    };

    let mut logs = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<LogEntry>(item) {
            Ok(entry) => logs.push(entry),
            Err(e) => tracing::warn!(error = %e, "skipping undecodable log entry"),
        }
    }
    Ok(logs)
}

/// In-process store, used by tests and by embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.items().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.items().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.items().clone())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.items().remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.items().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_crud() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        store.set("k", &json!(1)).unwrap();
        store.set("k", &json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));

        store.set("other", &json!("x")).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 2);

        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());

        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_logs_missing_key() {
        let store = MemoryStore::new();
        assert!(read_logs(&store).unwrap().is_empty());
    }

    #[test]
    fn test_read_logs_skips_undecodable_entries() {
        let store = MemoryStore::new();
        store
            .set(
                LOGGED_NUTRIENTS_KEY,
                &json!([
                    {"id": "1", "nutrientId": "iron", "amount": 5, "timestamp": "2024-06-15T08:00:00.000Z"},
                    {"id": "2", "nutrientId": "iron", "amount": 5, "timestamp": "not a date"},
                    "garbage",
                    {"id": "3", "nutrientId": "zinc", "amount": "2", "timestamp": "2024-06-15T09:00:00Z"}
                ]),
            )
            .unwrap();

        let logs = read_logs(&store).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, "1");
        assert_eq!(logs[1].nutrient_id, "zinc");
        assert!((logs[1].amount - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_logs_non_array() {
        let store = MemoryStore::new();
        store.set(LOGGED_NUTRIENTS_KEY, &json!({"a": 1})).unwrap();
        assert!(read_logs(&store).unwrap().is_empty());
    }

    #[test]
    fn test_typed_roundtrip_and_malformed() {
        let store = MemoryStore::new();
        set_typed(&store, "n", &vec![1, 2, 3]).unwrap();
        let v: Option<Vec<i32>> = get_typed(&store, "n").unwrap();
        assert_eq!(v, Some(vec![1, 2, 3]));

        store.set("bad", &json!("not a list")).unwrap();
        assert!(get_typed::<Vec<i32>>(&store, "bad").is_err());
    }

    #[test]
    fn test_goal_key() {
        assert_eq!(goal_key("iron"), "iron-goal");
    }
}
