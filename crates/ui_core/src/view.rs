//! View reconciliation contract: explicit lifecycle, hub subscriptions, and
//! identity-gated re-rendering. Concrete views live outside the core; this
//! module owns their wiring and teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;

use crate::context::AppContext;
use crate::hub::SubscriptionId;
use crate::overlay::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Created,
    Mounted,
    Unmounted,
}

/// One hub interest of a view.
#[derive(Debug, Clone)]
pub struct TopicSpec {
    pub hub: String,
    pub topic: String,
    pub label: Option<String>,
}

impl TopicSpec {
    pub fn new(hub: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            hub: hub.into(),
            topic: topic.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// View-specific logic: what to listen to, how to identify the rendered state
/// subset, and how to render it into the external document.
pub trait Reconciler: Send + Sync {
    fn interests(&self) -> Vec<TopicSpec>;
    /// Identity of the state subset this view renders. Re-rendering happens
    /// only when it changes, so redundant notifications stay cheap.
    fn identity(&self, cx: &AppContext) -> anyhow::Result<Value>;
    fn render(&self, cx: &AppContext) -> anyhow::Result<()>;
    /// Declarative UI-event bindings installed for the mounted lifetime.
    fn ui_bindings(&self) -> Vec<UiBinding> {
        Vec::new()
    }
}

struct ViewInner {
    cx: AppContext,
    reconciler: Arc<dyn Reconciler>,
    phase: Mutex<ViewPhase>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    ui_handles: Mutex<Vec<UiBindingId>>,
    last_identity: Mutex<Option<Value>>,
}

/// Owns one view's wiring. Lifecycle is `Created -> Mounted -> Unmounted`;
/// teardown runs exactly once, on the `Mounted -> Unmounted` transition.
pub struct ViewBinding {
    inner: Arc<ViewInner>,
}

impl ViewBinding {
    pub fn new(cx: AppContext, reconciler: Arc<dyn Reconciler>) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                cx,
                reconciler,
                phase: Mutex::new(ViewPhase::Created),
                subscriptions: Mutex::new(Vec::new()),
                ui_handles: Mutex::new(Vec::new()),
                last_identity: Mutex::new(None),
            }),
        }
    }

    pub fn phase(&self) -> ViewPhase {
        *self.inner.phase.lock()
    }

    /// Initial render, then hub subscriptions and UI-event bindings.
    pub fn mount(&self) -> anyhow::Result<()> {
        {
            let mut phase = self.inner.phase.lock();
            if *phase != ViewPhase::Created {
                anyhow::bail!("view cannot mount from {:?}", *phase);
            }
            *phase = ViewPhase::Mounted;
        }

        let cx = &self.inner.cx;
        self.inner.reconciler.render(cx)?;
        *self.inner.last_identity.lock() = Some(self.inner.reconciler.identity(cx)?);

        for spec in self.inner.reconciler.interests() {
            let weak: Weak<ViewInner> = Arc::downgrade(&self.inner);
            let id = cx.hub.subscribe(
                &spec.hub,
                &spec.topic,
                spec.label.as_deref(),
                move |_event| {
                    // A dropped or unmounted view must never be rendered into.
                    if let Some(inner) = weak.upgrade() {
                        ViewBinding { inner }.reconcile()?;
                    }
                    Ok(())
                },
            );
            self.inner.subscriptions.lock().push(id);
        }

        for binding in self.inner.reconciler.ui_bindings() {
            let handle = cx.ui_events.install(binding);
            self.inner.ui_handles.lock().push(handle);
        }
        Ok(())
    }

    /// Re-derives the view's identity; re-renders only when it changed.
    /// A notification after unmount is a no-op.
    pub fn reconcile(&self) -> anyhow::Result<()> {
        if *self.inner.phase.lock() != ViewPhase::Mounted {
            return Ok(());
        }
        let cx = &self.inner.cx;
        let next = self.inner.reconciler.identity(cx)?;
        {
            let mut last = self.inner.last_identity.lock();
            if last.as_ref() == Some(&next) {
                return Ok(());
            }
            *last = Some(next);
        }
        self.inner.reconciler.render(cx)
    }

    /// Unsubscribes everything the view registered. Idempotent: repeated or
    /// never-mounted unmounts do nothing beyond fixing the phase.
    pub fn unmount(&self) {
        {
            let mut phase = self.inner.phase.lock();
            let was_mounted = *phase == ViewPhase::Mounted;
            *phase = ViewPhase::Unmounted;
            if !was_mounted {
                return;
            }
        }
        for id in self.inner.subscriptions.lock().drain(..) {
            self.inner.cx.hub.unsubscribe(id);
        }
        for handle in self.inner.ui_handles.lock().drain(..) {
            self.inner.cx.ui_events.remove(handle);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEventKind {
    PointerUp,
    PointerDown,
    KeyUp,
    Input,
}

pub type UiHandler = dyn Fn(ElementId) -> anyhow::Result<()> + Send + Sync;

/// One declarative `(event, selector, handler)` binding, the explicit
/// replacement for annotation-driven event wiring.
#[derive(Clone)]
pub struct UiBinding {
    pub event: UiEventKind,
    pub selector: String,
    pub handler: Arc<UiHandler>,
}

impl UiBinding {
    pub fn new<F>(event: UiEventKind, selector: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ElementId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            event,
            selector: selector.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiBindingId(u64);

/// Registry the shell dispatches platform events through. Selector matching
/// stays in the document layer and is passed in per dispatch.
#[derive(Default)]
pub struct UiEventRegistry {
    next_id: AtomicU64,
    bindings: Mutex<Vec<(UiBindingId, UiBinding)>>,
}

impl UiEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, binding: UiBinding) -> UiBindingId {
        let id = UiBindingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.bindings.lock().push((id, binding));
        id
    }

    pub fn remove(&self, id: UiBindingId) {
        self.bindings.lock().retain(|(bound, _)| *bound != id);
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    /// `matches` answers whether a selector matches the event target.
    pub fn dispatch(
        &self,
        event: UiEventKind,
        target: ElementId,
        matches: &dyn Fn(&str, ElementId) -> bool,
    ) {
        let snapshot: Vec<UiBinding> = self
            .bindings
            .lock()
            .iter()
            .filter(|(_, binding)| binding.event == event)
            .map(|(_, binding)| binding.clone())
            .collect();
        for binding in snapshot {
            if matches(&binding.selector, target) {
                if let Err(err) = (binding.handler)(target) {
                    error!(selector = binding.selector.as_str(), "ui event handler failed: {err:#}");
                }
            }
        }
    }
}
