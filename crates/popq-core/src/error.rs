use thiserror::Error;

use popq_store::StoreError;

#[derive(Debug, Error)]
pub enum PopError {
    /// Batch count below one. Rejected before any side effect.
    #[error("count can't be less than one: {0}")]
    InvalidCount(i64),

    /// Negative timeout. Rejected before any side effect.
    #[error("timeout can't be negative: {0}")]
    InvalidTimeout(i64),

    /// Store-level failure, including a wrong-typed key. Surfaces before a
    /// waiter is registered, never mid-wait.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The caller abandoned the wait.
    #[error("cancelled while waiting")]
    Canceled,

    /// Contract violation inside the wait machinery.
    #[error("internal error: {0}")]
    Internal(String),
}
