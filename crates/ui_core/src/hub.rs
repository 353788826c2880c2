//! In-process publish/subscribe bus addressed by (channel, topic, label).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use shared::protocol::HubEvent;
use tracing::error;

/// Handle returned by [`Hub::subscribe`]; pass it back to [`Hub::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type HubCallback = dyn Fn(&HubEvent) -> anyhow::Result<()> + Send + Sync;

struct SubscriberEntry {
    id: SubscriptionId,
    topic: String,
    label: Option<String>,
    alive: AtomicBool,
    callback: Box<HubCallback>,
}

impl SubscriberEntry {
    fn matches(&self, event: &HubEvent) -> bool {
        if self.topic != event.topic {
            return false;
        }
        match &self.label {
            None => true,
            Some(label) => event.label.as_deref() == Some(label.as_str()),
        }
    }
}

/// Subscriber registry only; no event is retained after its dispatch returns.
#[derive(Default)]
pub struct Hub {
    channels: Mutex<HashMap<String, Vec<Arc<SubscriberEntry>>>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for (channel, topic). With a label, only publishes
    /// carrying that exact label are delivered; without one, every publish on
    /// the topic is.
    pub fn subscribe<F>(
        &self,
        channel: &str,
        topic: &str,
        label: Option<&str>,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&HubEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(SubscriberEntry {
            id,
            topic: topic.to_string(),
            label: label.map(str::to_string),
            alive: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(entry);
        id
    }

    /// Safe to call from inside a dispatching callback: the entry is
    /// tombstoned, so an in-flight fan-out that already snapshotted it
    /// skips it.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut channels = self.channels.lock();
        for entries in channels.values_mut() {
            if let Some(pos) = entries.iter().position(|entry| entry.id == id) {
                let entry = entries.remove(pos);
                entry.alive.store(false, Ordering::Release);
                return;
            }
        }
    }

    /// Synchronously invokes every matching subscriber in registration order
    /// before returning. A failing callback is logged and does not stop the
    /// fan-out; publish itself never fails.
    pub fn publish(&self, channel: &str, topic: &str, label: Option<&str>, detail: Value) {
        let event = HubEvent {
            hub: channel.to_string(),
            topic: topic.to_string(),
            label: label.map(str::to_string),
            detail,
        };

        // Snapshot under the lock, dispatch outside it, so callbacks are free
        // to subscribe, unsubscribe, or publish again.
        let snapshot: Vec<Arc<SubscriberEntry>> = {
            let channels = self.channels.lock();
            match channels.get(channel) {
                Some(entries) => entries
                    .iter()
                    .filter(|entry| entry.matches(&event))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        for entry in snapshot {
            if !entry.alive.load(Ordering::Acquire) {
                continue;
            }
            if let Err(err) = (entry.callback)(&event) {
                error!(hub = channel, topic, "subscriber callback failed: {err:#}");
            }
        }
    }
}
