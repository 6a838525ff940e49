use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wrong type for key '{key}': holds a non-list value")]
    WrongType { key: String },
}

impl StoreError {
    pub fn wrong_type(key: impl Into<String>) -> Self {
        StoreError::WrongType { key: key.into() }
    }
}
