//! Intake for host-originated notifications: file drops and relayed
//! server-side hub events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::json;
use shared::protocol::{HostNotification, ScreenPoint};
use tracing::debug;

use crate::hub::Hub;
use crate::overlay::position::{Point, Size};
use crate::rpc::CommandClient;

pub const WINDOW_HUB: &str = "Window";
pub const FILE_DROP_TOPIC: &str = "file-drop";

/// Drop notifications repeated inside this window are duplicate echoes of one
/// physical drop, not new drops.
const DROP_ECHO_WINDOW: Duration = Duration::from_millis(50);

/// Document viewport dimensions as the shell currently renders them.
pub trait ViewportMetrics: Send + Sync {
    fn viewport(&self) -> Size;
}

pub struct HostFeed {
    hub: Arc<Hub>,
    commands: Arc<CommandClient>,
    viewport: Arc<dyn ViewportMetrics>,
    last_drop: Mutex<Option<Instant>>,
}

impl HostFeed {
    pub fn new(
        hub: Arc<Hub>,
        commands: Arc<CommandClient>,
        viewport: Arc<dyn ViewportMetrics>,
    ) -> Self {
        Self {
            hub,
            commands,
            viewport,
            last_drop: Mutex::new(None),
        }
    }

    pub async fn handle(&self, notification: HostNotification) -> Result<()> {
        match notification {
            HostNotification::HubRelay(event) => {
                self.hub
                    .publish(&event.hub, &event.topic, event.label.as_deref(), event.detail);
                Ok(())
            }
            HostNotification::FileDrop { paths, position } => {
                self.handle_file_drop(paths, position).await
            }
        }
    }

    async fn handle_file_drop(&self, paths: Vec<PathBuf>, position: ScreenPoint) -> Result<()> {
        if self.is_drop_echo() {
            debug!("suppressing duplicate file-drop notification");
            return Ok(());
        }
        let Some(path) = paths.into_iter().next() else {
            return Ok(());
        };
        let point = self.document_point(position).await?;
        self.hub.publish(
            WINDOW_HUB,
            FILE_DROP_TOPIC,
            None,
            json!({
                "path": path,
                "x": point.x,
                "y": point.y,
            }),
        );
        Ok(())
    }

    fn is_drop_echo(&self) -> bool {
        let mut last = self.last_drop.lock();
        let now = Instant::now();
        let echo = matches!(*last, Some(previous) if now.duration_since(previous) < DROP_ECHO_WINDOW);
        *last = Some(now);
        echo
    }

    /// Host-window coordinates to document coordinates. The host window may
    /// be taller than the document viewport (title bar, attached tooling);
    /// that delta shifts y.
    async fn document_point(&self, position: ScreenPoint) -> Result<Point> {
        let win = self
            .commands
            .win_size()
            .await
            .context("file-drop translation needs the host window size")?;
        let view = self.viewport.viewport();
        Ok(Point {
            x: position.x,
            y: position.y + (win.height - view.height),
        })
    }
}
