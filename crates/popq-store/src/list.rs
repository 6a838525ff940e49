use async_trait::async_trait;

use popq_model::Element;

use crate::error::StoreError;

/// Contract the pop engine consumes from the host store's list value.
///
/// Implementations must make each call atomic with respect to the others
/// for the same key; the engine additionally serializes its own calls per
/// key, so "check length, then pop" never interleaves with a push.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Current length of the list at `key`. `0` if the key is absent.
    ///
    /// Fails with [`StoreError::WrongType`] if the key holds a non-list
    /// value.
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Remove and return up to `n` elements from the tail, tail-first.
    ///
    /// Returns an empty vector when the key is absent or the list is empty.
    async fn pop_tail(&self, key: &str, n: usize) -> Result<Vec<Element>, StoreError>;

    /// Append `values` to the tail, creating the list if the key is absent.
    ///
    /// Returns the new list length.
    async fn push_tail(&self, key: &str, values: Vec<Element>) -> Result<usize, StoreError>;
}
