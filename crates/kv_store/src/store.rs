use serde_json::Value;

/// Custom error type for store operations
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be parsed or written as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty or would escape the store location
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Read/write contract for persisted application state.
///
/// Values are JSON documents keyed by short identifier strings. Writes
/// replace the whole document for a key; there is no multi-key consistency.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Read the document stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `value` under `key`, replacing any previous document.
    async fn put(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Delete the document under `key`. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Reject keys that are empty or could point outside the store.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("empty key".to_string()));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::InvalidKey(format!(
            "key '{}' contains characters outside [a-zA-Z0-9_-]",
            key
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key("notifications").is_ok());
        assert!(check_key("bell-list_v2").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("../escape").is_err());
        assert!(check_key("a/b").is_err());
    }
}
