use thiserror::Error;

/// Failures raised by a storage adapter. Business outcomes (not found,
/// conflicts detected by a scan) are never expressed here; the one exception
/// is `Conflict`, raised when the database itself rejects a write through an
/// exclusion constraint.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected by exclusion constraint: {0}")]
    Conflict(String),

    #[error("malformed storage payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
