use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error value carried in a response envelope from the host process.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("remote error {code}: {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
