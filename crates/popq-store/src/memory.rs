use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use tracing::trace;

use popq_model::{Element, Key};

use crate::{error::StoreError, list::ListStore};

/// In-memory list storage.
///
/// Mirrors host-store semantics: a key springs into existence on first
/// push and disappears once its list drains to empty, so an absent key and
/// an empty list are indistinguishable to callers.
#[derive(Clone)]
pub struct MemoryListStore {
    inner: Arc<RwLock<HashMap<Key, StoreValue>>>,
}

/// A stored value. Only lists participate in pop traffic; `Blob` exists so
/// type mismatches behave the way they do against a real multi-type store.
enum StoreValue {
    List(VecDeque<Element>),
    Blob(Vec<u8>),
}

impl MemoryListStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Set `key` to an opaque non-list value, replacing whatever is there.
    pub fn put_blob(&self, key: impl Into<Key>, bytes: Vec<u8>) {
        let mut inner = self.inner.write().unwrap();
        inner.insert(key.into(), StoreValue::Blob(bytes));
    }

    /// Read the opaque value at `key`. `None` if the key is absent or
    /// holds a list.
    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read().unwrap();
        match inner.get(key) {
            Some(StoreValue::Blob(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Remove `key` entirely, whatever its type.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.remove(key).is_some()
    }

    /// Number of live keys, of any type.
    pub fn key_count(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.len()
    }
}

impl Default for MemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let inner = self.inner.read().unwrap();
        match inner.get(key) {
            None => Ok(0),
            Some(StoreValue::List(list)) => Ok(list.len()),
            Some(StoreValue::Blob(_)) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn pop_tail(&self, key: &str, n: usize) -> Result<Vec<Element>, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let list = match inner.get_mut(key) {
            None => return Ok(Vec::new()),
            Some(StoreValue::List(list)) => list,
            Some(StoreValue::Blob(_)) => return Err(StoreError::wrong_type(key)),
        };

        let take = n.min(list.len());
        let mut popped = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(elem) = list.pop_back() {
                popped.push(elem);
            }
        }

        if list.is_empty() {
            inner.remove(key);
            trace!(key, "list drained, key removed");
        }
        Ok(popped)
    }

    async fn push_tail(&self, key: &str, values: Vec<Element>) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let list = match inner
            .entry(key.to_string())
            .or_insert_with(|| StoreValue::List(VecDeque::new()))
        {
            StoreValue::List(list) => list,
            StoreValue::Blob(_) => return Err(StoreError::wrong_type(key)),
        };

        list.extend(values);
        Ok(list.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elems(values: &[&str]) -> Vec<Element> {
        values.iter().map(|v| v.as_bytes().to_vec()).collect()
    }

    #[tokio::test]
    async fn absent_key_is_an_empty_list() {
        let store = MemoryListStore::new();
        assert_eq!(store.len("missing").await.unwrap(), 0);
        assert!(store.pop_tail("missing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_then_len() {
        let store = MemoryListStore::new();
        let len = store.push_tail("q", elems(&["a", "b"])).await.unwrap();
        assert_eq!(len, 2);
        assert_eq!(store.len("q").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn pop_tail_is_tail_first() {
        let store = MemoryListStore::new();
        store.push_tail("q", elems(&["0", "1", "2"])).await.unwrap();

        let popped = store.pop_tail("q", 2).await.unwrap();
        assert_eq!(popped, elems(&["2", "1"]));
        assert_eq!(store.len("q").await.unwrap(), 1);

        let rest = store.pop_tail("q", 2).await.unwrap();
        assert_eq!(rest, elems(&["0"]));
    }

    #[tokio::test]
    async fn drained_key_disappears() {
        let store = MemoryListStore::new();
        store.push_tail("q", elems(&["a"])).await.unwrap();
        assert_eq!(store.key_count(), 1);

        store.pop_tail("q", 10).await.unwrap();
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blob_key_rejects_list_operations() {
        let store = MemoryListStore::new();
        store.put_blob("cfg", b"not a list".to_vec());
        assert_eq!(store.blob("cfg"), Some(b"not a list".to_vec()));
        assert_eq!(store.blob("missing"), None);

        assert!(matches!(
            store.len("cfg").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.pop_tail("cfg", 1).await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.push_tail("cfg", elems(&["x"])).await,
            Err(StoreError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_any_type() {
        let store = MemoryListStore::new();
        store.push_tail("q", elems(&["a"])).await.unwrap();
        store.put_blob("cfg", vec![1]);

        assert!(store.delete("q"));
        assert!(store.delete("cfg"));
        assert!(!store.delete("q"));
    }
}
