use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use super::{Snapshot, Store, StoreError, compare_values};

/// Process-local store used by tests, the demo pipeline and `--memory` runs.
///
/// Appended children get zero-padded sequence keys, so key order is
/// insertion order. Collections and whole records live in separate maps;
/// `get` on a collection path returns its children as one object.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_key: u64,
    collections: HashMap<String, BTreeMap<String, Value>>,
    records: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Number of children appended at `path`.
    pub fn len(&self, path: &str) -> usize {
        self.lock()
            .map(|inner| inner.collections.get(path).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if nothing was appended at `path`.
    pub fn is_empty(&self, path: &str) -> bool {
        self.len(path) == 0
    }
}

fn field<'a>(record: &'a Value, order_by: &str) -> &'a Value {
    record.get(order_by).unwrap_or(&Value::Null)
}

impl Store for MemoryStore {
    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError> {
        let mut inner = self.lock()?;
        let key = format!("-{:019}", inner.next_key);
        inner.next_key += 1;
        inner
            .collections
            .entry(path.to_string())
            .or_default()
            .insert(key.clone(), record.clone());
        Ok(key)
    }

    fn overwrite(&self, path: &str, record: &Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.collections.remove(path);
        inner.records.insert(path.to_string(), record.clone());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.lock()?;
        if let Some(children) = inner.collections.get(path) {
            let object: Map<String, Value> = children
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            return Ok(Some(Value::Object(object)));
        }
        Ok(inner.records.get(path).cloned())
    }

    fn query_range(
        &self,
        path: &str,
        order_by: &str,
        start: &Value,
    ) -> Result<Snapshot, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(path)
            .map(|children| {
                children
                    .iter()
                    .filter(|(_, v)| compare_values(field(v, order_by), start).is_ge())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn query_last(&self, path: &str, order_by: &str, n: usize) -> Result<Snapshot, StoreError> {
        let inner = self.lock()?;
        let Some(children) = inner.collections.get(path) else {
            return Ok(Snapshot::new());
        };

        let mut ordered: Vec<(&String, &Value)> = children.iter().collect();
        ordered.sort_by(|(ka, va), (kb, vb)| {
            compare_values(field(va, order_by), field(vb, order_by)).then_with(|| ka.cmp(kb))
        });
        let skip = ordered.len().saturating_sub(n);
        Ok(ordered
            .into_iter()
            .skip(skip)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
