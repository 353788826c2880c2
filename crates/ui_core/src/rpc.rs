//! Command client: correlated request/response round trips to the host
//! process, one opaque bridge call per invocation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::error::RemoteError;
use shared::protocol::{RpcRequest, RpcResponse, WinSize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Port to the host process: the single `rpc` call plus the two auxiliary
/// window/session calls.
#[async_trait]
pub trait HostBridge: Send + Sync {
    async fn rpc(&self, request: RpcRequest) -> Result<RpcResponse>;
    async fn win_size(&self) -> Result<WinSize>;
    async fn session_value(&self, key: &str) -> Result<Value>;
    async fn set_session_value(&self, key: &str, value: Value) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum InvokeError {
    /// The bridge call itself failed (host unavailable, malformed call).
    #[error("transport failure invoking '{method}': {source}")]
    Transport { method: String, source: anyhow::Error },
    /// Well-formed response carrying an error value.
    #[error("remote error invoking '{method}': {source}")]
    Remote { method: String, source: RemoteError },
    /// The response violates the envelope contract.
    #[error("malformed response envelope for '{method}': {reason}")]
    Envelope { method: String, reason: String },
}

pub struct CommandClient {
    bridge: Arc<dyn HostBridge>,
}

impl CommandClient {
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self { bridge }
    }

    /// One request/response round trip. Each call gets its own correlation id,
    /// so concurrent invocations resolve independently. Every failure is
    /// logged here once and returned to the caller; there is no retry.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value, InvokeError> {
        let id = Uuid::new_v4().to_string();
        let request = RpcRequest::new(id.clone(), method, params);

        let response = match self.bridge.rpc(request).await {
            Ok(response) => response,
            Err(source) => {
                error!(method, "rpc transport failure: {source:#}");
                return Err(InvokeError::Transport {
                    method: method.to_string(),
                    source,
                });
            }
        };

        if response.id != id {
            return Err(envelope_error(
                method,
                format!("correlation id mismatch: sent {id}, got {}", response.id),
            ));
        }

        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(remote)) => {
                error!(method, code = remote.code, "rpc remote error: {}", remote.message);
                Err(InvokeError::Remote {
                    method: method.to_string(),
                    source: remote,
                })
            }
            (Some(_), Some(_)) => Err(envelope_error(
                method,
                "both result and error present".to_string(),
            )),
            (None, None) => Err(envelope_error(
                method,
                "neither result nor error present".to_string(),
            )),
        }
    }

    pub async fn win_size(&self) -> Result<WinSize> {
        self.bridge.win_size().await
    }

    /// Session-scoped key/value used for lightweight UI state that survives a
    /// reload but not the process.
    pub async fn session_value(&self, key: &str) -> Result<Value> {
        self.bridge.session_value(key).await
    }

    pub async fn set_session_value(&self, key: &str, value: Value) -> Result<()> {
        self.bridge.set_session_value(key, value).await
    }
}

fn envelope_error(method: &str, reason: String) -> InvokeError {
    error!(method, "malformed rpc response: {reason}");
    InvokeError::Envelope {
        method: method.to_string(),
        reason,
    }
}
