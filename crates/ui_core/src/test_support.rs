//! Fakes shared across the crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared::protocol::{RpcRequest, RpcResponse, WinSize};

use crate::context::{AppContext, HostPorts};
use crate::host::ViewportMetrics;
use crate::overlay::position::{Point, Rect, Size};
use crate::overlay::{ElementId, OverlayContent, OverlaySurface};
use crate::route::FragmentHost;
use crate::rpc::HostBridge;
use crate::timer::{Scheduler, TimerHandle, TimerTask};

#[derive(Default)]
pub(crate) struct MemoryFragmentHost {
    fragment: Mutex<String>,
}

impl FragmentHost for MemoryFragmentHost {
    fn fragment(&self) -> String {
        self.fragment.lock().clone()
    }

    fn set_fragment(&self, fragment: &str) {
        *self.fragment.lock() = fragment.to_string();
    }
}

/// Bridge that answers every rpc with a null result, reports a fixed window
/// size, and keeps session values in memory.
#[derive(Default)]
pub(crate) struct StaticBridge {
    session: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl HostBridge for StaticBridge {
    async fn rpc(&self, request: RpcRequest) -> Result<RpcResponse> {
        Ok(RpcResponse {
            id: request.id,
            result: Some(Value::Null),
            error: None,
        })
    }

    async fn win_size(&self) -> Result<WinSize> {
        Ok(WinSize {
            width: 1200.0,
            height: 800.0,
        })
    }

    async fn session_value(&self, key: &str) -> Result<Value> {
        Ok(self.session.lock().get(key).cloned().unwrap_or(Value::Null))
    }

    async fn set_session_value(&self, key: &str, value: Value) -> Result<()> {
        self.session.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Surface that hands out element ids and swallows everything else.
#[derive(Default)]
pub(crate) struct NoopSurface {
    next_id: AtomicU64,
}

impl OverlaySurface for NoopSurface {
    fn attach(&self, _identity: &str, _content: &OverlayContent) -> Result<ElementId> {
        Ok(ElementId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn detach(&self, _element: ElementId) {}

    fn is_attached(&self, _element: ElementId) -> bool {
        true
    }

    fn contains(&self, ancestor: ElementId, descendant: ElementId) -> bool {
        ancestor == descendant
    }

    fn rect_of(&self, _element: ElementId) -> Option<Rect> {
        None
    }

    fn place(&self, _element: ElementId, _origin: Point) {}

    fn set_visible(&self, _element: ElementId, _visible: bool) {}

    fn action_of(&self, _target: ElementId) -> Option<String> {
        None
    }
}

/// Scheduler that drops every task; for tests that never pump timers.
pub(crate) struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn schedule(&self, _delay: Duration, _task: TimerTask) -> TimerHandle {
        TimerHandle(0)
    }

    fn cancel(&self, _handle: TimerHandle) {}
}

pub(crate) struct FixedViewport(pub(crate) Size);

impl ViewportMetrics for FixedViewport {
    fn viewport(&self) -> Size {
        self.0
    }
}

/// A full context over in-memory fakes.
pub(crate) fn test_context() -> AppContext {
    let (cx, _feed) = AppContext::new(HostPorts {
        bridge: Arc::new(StaticBridge::default()),
        fragment: Arc::new(MemoryFragmentHost::default()),
        surface: Arc::new(NoopSurface::default()),
        scheduler: Arc::new(NoopScheduler),
        viewport: Arc::new(FixedViewport(Size {
            width: 1200.0,
            height: 800.0,
        })),
    });
    cx
}
