use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::*;
use crate::timer::{Scheduler, TimerHandle, TimerTask};
use super::position::Corner;

/// Document stand-in: flat element store with parent links for containment
/// and a `do-` action map resolved by walking up, like the real tree.
#[derive(Default)]
struct FakeSurface {
    next_id: AtomicU64,
    attached: Mutex<HashSet<ElementId>>,
    parents: Mutex<HashMap<ElementId, ElementId>>,
    rects: Mutex<HashMap<ElementId, Rect>>,
    actions: Mutex<HashMap<ElementId, String>>,
    placements: Mutex<Vec<(ElementId, Point)>>,
    visible: Mutex<HashMap<ElementId, bool>>,
    overlay_elements: Mutex<Vec<ElementId>>,
}

impl FakeSurface {
    fn new_element(&self) -> ElementId {
        let element = ElementId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1000);
        self.attached.lock().insert(element);
        element
    }

    fn child_of(&self, parent: ElementId) -> ElementId {
        let element = self.new_element();
        self.parents.lock().insert(element, parent);
        element
    }

    fn set_rect(&self, element: ElementId, rect: Rect) {
        self.rects.lock().insert(element, rect);
    }

    fn set_action(&self, element: ElementId, action: &str) {
        self.actions.lock().insert(element, action.to_string());
    }

    fn remove_element(&self, element: ElementId) {
        self.attached.lock().remove(&element);
    }

    fn live_overlay_count(&self) -> usize {
        let attached = self.attached.lock();
        self.overlay_elements
            .lock()
            .iter()
            .filter(|element| attached.contains(element))
            .count()
    }

    fn last_overlay_element(&self) -> ElementId {
        *self.overlay_elements.lock().last().expect("an overlay was attached")
    }

    fn last_placement(&self) -> Option<(ElementId, Point)> {
        self.placements.lock().last().copied()
    }

    fn placement_count(&self) -> usize {
        self.placements.lock().len()
    }

    fn is_visible(&self, element: ElementId) -> bool {
        *self.visible.lock().get(&element).unwrap_or(&false)
    }
}

impl OverlaySurface for FakeSurface {
    fn attach(&self, _identity: &str, _content: &OverlayContent) -> anyhow::Result<ElementId> {
        let element = self.new_element();
        self.rects
            .lock()
            .insert(element, Rect::new(0.0, 0.0, 200.0, 150.0));
        self.visible.lock().insert(element, false);
        self.overlay_elements.lock().push(element);
        Ok(element)
    }

    fn detach(&self, element: ElementId) {
        self.attached.lock().remove(&element);
    }

    fn is_attached(&self, element: ElementId) -> bool {
        self.attached.lock().contains(&element)
    }

    fn contains(&self, ancestor: ElementId, descendant: ElementId) -> bool {
        let parents = self.parents.lock();
        let mut current = Some(descendant);
        while let Some(element) = current {
            if element == ancestor {
                return true;
            }
            current = parents.get(&element).copied();
        }
        false
    }

    fn rect_of(&self, element: ElementId) -> Option<Rect> {
        self.rects.lock().get(&element).copied()
    }

    fn place(&self, element: ElementId, origin: Point) {
        self.placements.lock().push((element, origin));
    }

    fn set_visible(&self, element: ElementId, visible: bool) {
        self.visible.lock().insert(element, visible);
    }

    fn action_of(&self, target: ElementId) -> Option<String> {
        let parents = self.parents.lock();
        let actions = self.actions.lock();
        let mut current = Some(target);
        while let Some(element) = current {
            if let Some(action) = actions.get(&element) {
                return Some(action.clone());
            }
            current = parents.get(&element).copied();
        }
        None
    }
}

/// Scheduler pumped by hand from the test body.
struct ManualScheduler {
    next_id: AtomicU64,
    pending: Mutex<Vec<(TimerHandle, TimerTask)>>,
    honor_cancel: bool,
}

impl ManualScheduler {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
            honor_cancel: true,
        }
    }

    /// A scheduler whose cancellations are lost, to exercise the stale-timer
    /// generation guard.
    fn leaky() -> Self {
        Self {
            honor_cancel: false,
            ..Self::new()
        }
    }

    fn fire_all(&self) {
        let tasks: Vec<(TimerHandle, TimerTask)> = self.pending.lock().drain(..).collect();
        for (_, task) in tasks {
            task();
        }
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().push((handle, task));
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if !self.honor_cancel {
            return;
        }
        self.pending.lock().retain(|(pending, _)| *pending != handle);
    }
}

fn manager_with(scheduler: Arc<ManualScheduler>) -> (OverlayManager, Arc<FakeSurface>) {
    let surface = Arc::new(FakeSurface::default());
    (OverlayManager::new(surface.clone(), scheduler), surface)
}

fn manager() -> (OverlayManager, Arc<FakeSurface>, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let (manager, surface) = manager_with(scheduler.clone());
    (manager, surface, scheduler)
}

fn menu_content() -> OverlayContent {
    OverlayContent::Items(vec![
        OverlayItem::new("do-refresh-conv", "Refresh"),
        OverlayItem::new("do-clear-conv", "Clear Conversation"),
    ])
}

fn below_left() -> PositionPolicy {
    PositionPolicy::new(Corner::BottomLeft, Corner::TopLeft).with_gaps(8.0, 0.0)
}

#[test]
fn repeat_toggle_creates_then_removes() {
    let (manager, surface, _) = manager();

    let first = manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("open");
    assert_eq!(first, ToggleOutcome::Opened);
    assert_eq!(manager.open_count(), 1);

    let second = manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("close");
    assert_eq!(second, ToggleOutcome::Closed);
    assert_eq!(manager.open_count(), 0);
    assert_eq!(surface.live_overlay_count(), 0);
}

#[test]
fn distinct_identities_coexist() {
    let (manager, _, _) = manager();
    manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("open");
    manager
        .toggle(OverlayParams::new("agent-menu", menu_content()))
        .expect("open");
    assert_eq!(manager.open_count(), 2);
    assert!(manager.is_open("conv-menu"));
    assert!(manager.is_open("agent-menu"));
}

#[test]
fn escape_dismisses_regardless_of_target() {
    let (manager, surface, _) = manager();
    manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("open");
    manager
        .toggle(OverlayParams::new("agent-menu", menu_content()))
        .expect("open");

    manager.on_key_up("Enter");
    assert_eq!(manager.open_count(), 2);

    manager.on_key_up("Escape");
    assert_eq!(manager.open_count(), 0);
    assert_eq!(surface.live_overlay_count(), 0);
}

#[test]
fn outside_release_dismisses_unless_exempt() {
    let (manager, surface, _) = manager();
    let trigger = surface.new_element();
    let exempt = surface.new_element();
    let elsewhere = surface.new_element();

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.exempt = vec![exempt];
    manager.toggle(params).expect("open");

    // Releases on the exempt element and on the trigger leave it alone.
    manager.on_pointer_up(Some(exempt));
    assert!(manager.is_open("conv-menu"));
    manager.on_pointer_up(Some(trigger));
    assert!(manager.is_open("conv-menu"));

    // Anywhere else closes it.
    manager.on_pointer_up(Some(elsewhere));
    assert!(!manager.is_open("conv-menu"));
}

#[test]
fn release_inside_the_overlay_does_not_dismiss() {
    let (manager, surface, _) = manager();
    manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("open");
    let inside = surface.child_of(surface.last_overlay_element());

    manager.on_pointer_up(Some(inside));
    assert!(manager.is_open("conv-menu"));
}

#[test]
fn action_row_release_invokes_handler_then_dismisses() {
    let (manager, surface, _) = manager();
    let invoked: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    let log = Arc::clone(&invoked);
    params.on_action = Some(Arc::new(move |action: &str, _target| {
        log.lock().push(action.to_string());
    }));
    manager.toggle(params).expect("open");

    let row = surface.child_of(surface.last_overlay_element());
    surface.set_action(row, "do-refresh-conv");

    manager.on_pointer_up(Some(row));
    assert_eq!(*invoked.lock(), vec!["do-refresh-conv"]);
    assert!(!manager.is_open("conv-menu"));
}

#[test]
fn anchored_overlay_positions_against_its_trigger() {
    let (manager, surface, _) = manager();
    let trigger = surface.new_element();
    surface.set_rect(trigger, Rect::new(100.0, 40.0, 60.0, 20.0));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");

    let overlay = surface.last_overlay_element();
    assert_eq!(
        surface.last_placement(),
        Some((overlay, Point { x: 108.0, y: 60.0 }))
    );
    assert!(surface.is_visible(overlay));
}

#[test]
fn unmeasurable_trigger_keeps_the_overlay_hidden() {
    let (manager, surface, _) = manager();
    let trigger = surface.new_element(); // no rect registered

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");

    assert_eq!(surface.last_placement(), None);
    assert!(!surface.is_visible(surface.last_overlay_element()));
}

#[test]
fn resize_repositions_on_leading_edge_and_after_the_quiet_window() {
    let (manager, surface, scheduler) = manager();
    let trigger = surface.new_element();
    surface.set_rect(trigger, Rect::new(100.0, 40.0, 60.0, 20.0));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");
    let placed_on_open = surface.placement_count();

    surface.set_rect(trigger, Rect::new(140.0, 40.0, 60.0, 20.0));
    manager.on_window_resized();

    // Leading edge repositioned immediately, trailing pass still pending.
    assert_eq!(surface.placement_count(), placed_on_open + 1);
    assert_eq!(
        surface.last_placement().map(|(_, origin)| origin),
        Some(Point { x: 148.0, y: 60.0 })
    );
    assert_eq!(scheduler.pending_count(), 1);

    // A burst of further resize events only reschedules the trailing pass.
    manager.on_window_resized();
    manager.on_window_resized();
    assert_eq!(surface.placement_count(), placed_on_open + 1);
    assert_eq!(scheduler.pending_count(), 1);

    scheduler.fire_all();
    assert_eq!(surface.placement_count(), placed_on_open + 2);
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn teardown_cancels_the_pending_resize_timer() {
    let (manager, surface, scheduler) = manager();
    let trigger = surface.new_element();
    surface.set_rect(trigger, Rect::new(0.0, 0.0, 10.0, 10.0));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");

    manager.on_window_resized();
    assert_eq!(scheduler.pending_count(), 1);

    manager.dismiss("conv-menu");
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn stale_timer_that_escaped_cancellation_is_a_noop() {
    let scheduler = Arc::new(ManualScheduler::leaky());
    let (manager, surface) = manager_with(scheduler.clone());
    let trigger = surface.new_element();
    surface.set_rect(trigger, Rect::new(0.0, 0.0, 10.0, 10.0));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");
    manager.on_window_resized();

    // Close and reopen: the pending timer now belongs to a dead generation.
    manager.dismiss("conv-menu");
    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("reopen");

    let placements = surface.placement_count();
    scheduler.fire_all();
    assert_eq!(surface.placement_count(), placements);
    assert!(manager.is_open("conv-menu"));
}

#[test]
fn duplicate_dismiss_binding_is_rejected_but_the_first_keeps_working() {
    let (manager, surface, _) = manager();
    manager
        .toggle(OverlayParams::new("conv-menu", menu_content()))
        .expect("open");

    assert!(!manager.bind_dismiss("conv-menu", DismissKind::PointerUp));

    let elsewhere = surface.new_element();
    manager.on_pointer_up(Some(elsewhere));
    assert!(!manager.is_open("conv-menu"));
}

#[test]
fn trigger_removal_dismisses_on_the_next_reposition() {
    let (manager, surface, _) = manager();
    let trigger = surface.new_element();
    surface.set_rect(trigger, Rect::new(0.0, 0.0, 10.0, 10.0));

    let mut params = OverlayParams::new("conv-menu", menu_content());
    params.trigger = Some(trigger);
    params.position = Some(below_left());
    manager.toggle(params).expect("open");

    surface.remove_element(trigger);
    manager.on_window_resized();

    assert!(!manager.is_open("conv-menu"));
    assert_eq!(surface.live_overlay_count(), 0);
}
