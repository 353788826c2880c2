use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Command envelope submitted through the host bridge `rpc` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Response envelope. Exactly one of `result`/`error` is populated; the
/// command client rejects anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

/// One pub/sub event: channel (`hub`), topic, optional instance label, payload.
/// Also the wire shape of server-originated events relayed by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubEvent {
    pub hub: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub detail: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WinSize {
    pub width: f64,
    pub height: f64,
}

/// Pointer position in host-window coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Notifications pushed by the host process into the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum HostNotification {
    FileDrop {
        paths: Vec<PathBuf>,
        position: ScreenPoint,
    },
    HubRelay(HubEvent),
}
