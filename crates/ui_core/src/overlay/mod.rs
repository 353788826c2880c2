//! Transient overlay surfaces (selector popups, dialogs). One live overlay
//! per identity string; dismissed by repeat toggle, outside pointer release,
//! Escape, trigger removal, or programmatic [`OverlayManager::dismiss`].

pub mod position;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{error, warn};

use crate::timer::{Scheduler, TimerHandle};
use self::position::{anchor_origin, Point, PositionPolicy, Rect};

/// Trailing recompute window after the leading-edge resize reposition.
const RESIZE_DEBOUNCE: Duration = Duration::from_millis(5);

/// Opaque handle to a rendered element owned by the shell's document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Document operations the manager needs; rendering itself stays external.
pub trait OverlaySurface: Send + Sync {
    /// Materializes `content` at the document root (never nested inside the
    /// trigger), initially hidden.
    fn attach(&self, identity: &str, content: &OverlayContent) -> anyhow::Result<ElementId>;
    fn detach(&self, element: ElementId);
    fn is_attached(&self, element: ElementId) -> bool;
    /// Whether `descendant` is `ancestor` or rendered inside it.
    fn contains(&self, ancestor: ElementId, descendant: ElementId) -> bool;
    fn rect_of(&self, element: ElementId) -> Option<Rect>;
    fn place(&self, element: ElementId, origin: Point);
    fn set_visible(&self, element: ElementId, visible: bool);
    /// Nearest `do-` action key at or above `target`.
    fn action_of(&self, target: ElementId) -> Option<String>;
}

#[derive(Debug, Clone)]
pub enum OverlayContent {
    /// Selector rows rendered as actionable items.
    Items(Vec<OverlayItem>),
    /// Opaque fragment (dialog header/body/footer and the like).
    Custom(Value),
}

#[derive(Debug, Clone)]
pub struct OverlayItem {
    pub key: String,
    pub label: String,
}

impl OverlayItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Invoked with the resolved `do-` action key and the element that carried it.
pub type ActionHandler = dyn Fn(&str, ElementId) + Send + Sync;

pub struct OverlayParams {
    pub identity: String,
    pub content: OverlayContent,
    pub trigger: Option<ElementId>,
    pub position: Option<PositionPolicy>,
    /// Elements whose pointer releases never count as "outside"; the trigger
    /// is always exempt.
    pub exempt: Vec<ElementId>,
    pub on_action: Option<Arc<ActionHandler>>,
}

impl OverlayParams {
    pub fn new(identity: impl Into<String>, content: OverlayContent) -> Self {
        Self {
            identity: identity.into(),
            content,
            trigger: None,
            position: None,
            exempt: Vec::new(),
            on_action: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Opened,
    Closed,
}

/// Document-level dismissal signal kinds an overlay can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissKind {
    KeyUp,
    PointerUp,
}

struct OverlayState {
    generation: u64,
    element: ElementId,
    trigger: Option<ElementId>,
    position: Option<PositionPolicy>,
    exempt: Vec<ElementId>,
    on_action: Option<Arc<ActionHandler>>,
    dismiss_bindings: Vec<DismissKind>,
    resize_timer: Option<TimerHandle>,
}

struct ManagerInner {
    surface: Arc<dyn OverlaySurface>,
    scheduler: Arc<dyn Scheduler>,
    overlays: Mutex<HashMap<String, OverlayState>>,
    next_generation: AtomicU64,
}

#[derive(Clone)]
pub struct OverlayManager {
    inner: Arc<ManagerInner>,
}

impl OverlayManager {
    pub fn new(surface: Arc<dyn OverlaySurface>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                surface,
                scheduler,
                overlays: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Toggle-by-identity: an existing overlay is closed, otherwise a new one
    /// opens. At most one live overlay per identity, enforced by this
    /// lookup-before-create.
    pub fn toggle(&self, params: OverlayParams) -> anyhow::Result<ToggleOutcome> {
        if self.dismiss(&params.identity) {
            return Ok(ToggleOutcome::Closed);
        }

        let element = self.inner.surface.attach(&params.identity, &params.content)?;
        let mut state = OverlayState {
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed),
            element,
            trigger: params.trigger,
            position: params.position,
            exempt: params.exempt,
            on_action: params.on_action,
            dismiss_bindings: Vec::new(),
            resize_timer: None,
        };
        push_dismiss_binding(&params.identity, &mut state, DismissKind::KeyUp);
        push_dismiss_binding(&params.identity, &mut state, DismissKind::PointerUp);

        // Anchored overlays stay hidden until first successful placement so
        // they never flash at the wrong location.
        let placed = match (params.trigger, params.position) {
            (Some(trigger), Some(policy)) => self.place_anchored(element, trigger, policy),
            _ => true,
        };
        if placed {
            self.inner.surface.set_visible(element, true);
        }

        self.inner.overlays.lock().insert(params.identity, state);
        Ok(ToggleOutcome::Opened)
    }

    /// Programmatic removal. Tears down the element, the owned resize timer,
    /// and every dismiss binding. Returns whether the identity was live.
    pub fn dismiss(&self, identity: &str) -> bool {
        let Some(state) = self.inner.overlays.lock().remove(identity) else {
            return false;
        };
        if let Some(timer) = state.resize_timer {
            self.inner.scheduler.cancel(timer);
        }
        self.inner.surface.detach(state.element);
        true
    }

    /// Registers an additional dismissal binding on a live overlay. A kind
    /// already bound is a configuration error: reported, first binding kept.
    pub fn bind_dismiss(&self, identity: &str, kind: DismissKind) -> bool {
        let mut overlays = self.inner.overlays.lock();
        let Some(state) = overlays.get_mut(identity) else {
            return false;
        };
        push_dismiss_binding(identity, state, kind)
    }

    pub fn is_open(&self, identity: &str) -> bool {
        self.inner.overlays.lock().contains_key(identity)
    }

    pub fn open_count(&self) -> usize {
        self.inner.overlays.lock().len()
    }

    /// Document-level key routing from the shell.
    pub fn on_key_up(&self, key: &str) {
        if key != "Escape" {
            return;
        }
        let doomed: Vec<String> = self
            .inner
            .overlays
            .lock()
            .iter()
            .filter(|(_, state)| state.dismiss_bindings.contains(&DismissKind::KeyUp))
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in doomed {
            self.dismiss(&identity);
        }
    }

    /// Document-level pointer-release routing from the shell. `target` is the
    /// innermost element under the pointer, if any.
    pub fn on_pointer_up(&self, target: Option<ElementId>) {
        struct Snapshot {
            identity: String,
            element: ElementId,
            trigger: Option<ElementId>,
            exempt: Vec<ElementId>,
            on_action: Option<Arc<ActionHandler>>,
            pointer_bound: bool,
        }

        // Handlers run and dismissals happen outside the registry lock;
        // either may re-enter the manager.
        let snapshot: Vec<Snapshot> = self
            .inner
            .overlays
            .lock()
            .iter()
            .map(|(identity, state)| Snapshot {
                identity: identity.clone(),
                element: state.element,
                trigger: state.trigger,
                exempt: state.exempt.clone(),
                on_action: state.on_action.clone(),
                pointer_bound: state.dismiss_bindings.contains(&DismissKind::PointerUp),
            })
            .collect();

        let surface = Arc::clone(&self.inner.surface);
        for entry in snapshot {
            let inside = target
                .map(|target| surface.contains(entry.element, target))
                .unwrap_or(false);

            if inside {
                // Release landed in the overlay: resolve an action row if one
                // is there, invoke, and the overlay is done.
                if let (Some(target), Some(handler)) = (target, entry.on_action.as_ref()) {
                    if let Some(action) = surface.action_of(target) {
                        handler(&action, target);
                        self.dismiss(&entry.identity);
                    }
                }
                continue;
            }

            if !entry.pointer_bound {
                continue;
            }
            let exempt_hit = target
                .map(|target| {
                    entry
                        .trigger
                        .map(|trigger| surface.contains(trigger, target))
                        .unwrap_or(false)
                        || entry
                            .exempt
                            .iter()
                            .any(|exempt| surface.contains(*exempt, target))
                })
                .unwrap_or(false);
            if !exempt_hit {
                self.dismiss(&entry.identity);
            }
        }
    }

    /// Window-resize routing: reposition anchored overlays on the leading
    /// edge, then once more after the debounce window goes quiet.
    pub fn on_window_resized(&self) {
        let anchored: Vec<(String, u64, bool)> = {
            let overlays = self.inner.overlays.lock();
            overlays
                .iter()
                .filter(|(_, state)| state.position.is_some() && state.trigger.is_some())
                .map(|(identity, state)| {
                    (
                        identity.clone(),
                        state.generation,
                        state.resize_timer.is_none(),
                    )
                })
                .collect()
        };
        for (identity, generation, leading) in anchored {
            if leading {
                self.reposition(&identity, generation);
            }
            self.schedule_trailing(&identity, generation);
        }
    }

    fn schedule_trailing(&self, identity: &str, generation: u64) {
        let replaced: Option<TimerHandle> = {
            let mut overlays = self.inner.overlays.lock();
            let Some(state) = overlays.get_mut(identity) else {
                return;
            };
            if state.generation != generation {
                return;
            }
            state.resize_timer.take()
        };
        if let Some(timer) = replaced {
            self.inner.scheduler.cancel(timer);
        }

        let weak = Arc::downgrade(&self.inner);
        let identity_owned = identity.to_string();
        let handle = self.inner.scheduler.schedule(
            RESIZE_DEBOUNCE,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let manager = OverlayManager { inner };
                {
                    let mut overlays = manager.inner.overlays.lock();
                    let Some(state) = overlays.get_mut(&identity_owned) else {
                        return;
                    };
                    // A different generation means this timer outlived its
                    // overlay; it must do nothing.
                    if state.generation != generation {
                        return;
                    }
                    state.resize_timer = None;
                }
                manager.reposition(&identity_owned, generation);
            }),
        );

        let mut overlays = self.inner.overlays.lock();
        match overlays.get_mut(identity) {
            Some(state) if state.generation == generation => {
                state.resize_timer = Some(handle);
            }
            _ => {
                // Overlay vanished between scheduling and registration.
                drop(overlays);
                self.inner.scheduler.cancel(handle);
            }
        }
    }

    fn reposition(&self, identity: &str, generation: u64) {
        let (element, trigger, policy) = {
            let overlays = self.inner.overlays.lock();
            let Some(state) = overlays.get(identity) else {
                return;
            };
            if state.generation != generation {
                return;
            }
            let (Some(trigger), Some(policy)) = (state.trigger, state.position) else {
                return;
            };
            (state.element, trigger, policy)
        };

        if !self.inner.surface.is_attached(trigger) {
            // Nothing left to anchor to.
            self.dismiss(identity);
            return;
        }
        if self.place_anchored(element, trigger, policy) {
            self.inner.surface.set_visible(element, true);
        }
    }

    fn place_anchored(&self, element: ElementId, trigger: ElementId, policy: PositionPolicy) -> bool {
        let surface = &self.inner.surface;
        let (Some(trigger_rect), Some(overlay_rect)) =
            (surface.rect_of(trigger), surface.rect_of(element))
        else {
            warn!(element = element.0, "anchor rects unavailable; overlay stays hidden");
            return false;
        };
        surface.place(element, anchor_origin(trigger_rect, overlay_rect.size(), policy));
        true
    }
}

fn push_dismiss_binding(identity: &str, state: &mut OverlayState, kind: DismissKind) -> bool {
    if state.dismiss_bindings.contains(&kind) {
        error!(identity, ?kind, "dismiss listener already bound; keeping the existing one");
        return false;
    }
    state.dismiss_bindings.push(kind);
    true
}

#[cfg(test)]
#[path = "../tests/overlay_tests.rs"]
mod tests;
