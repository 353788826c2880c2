//! Process-wide composition root: one explicit context object handed to each
//! view instead of ambient singleton imports.

use std::sync::Arc;

use crate::host::{HostFeed, ViewportMetrics};
use crate::hub::Hub;
use crate::overlay::{OverlayManager, OverlaySurface};
use crate::route::{FragmentHost, RouteStore};
use crate::rpc::{CommandClient, HostBridge};
use crate::timer::Scheduler;
use crate::view::UiEventRegistry;

/// Shell-supplied ports the core is composed over.
pub struct HostPorts {
    pub bridge: Arc<dyn HostBridge>,
    pub fragment: Arc<dyn FragmentHost>,
    pub surface: Arc<dyn OverlaySurface>,
    pub scheduler: Arc<dyn Scheduler>,
    pub viewport: Arc<dyn ViewportMetrics>,
}

/// Everything a view needs, built once at startup. Cloning shares the same
/// single-instance components.
#[derive(Clone)]
pub struct AppContext {
    pub hub: Arc<Hub>,
    pub route: Arc<RouteStore>,
    pub commands: Arc<CommandClient>,
    pub overlays: OverlayManager,
    pub ui_events: Arc<UiEventRegistry>,
}

impl AppContext {
    /// Builds the core and the host feed the shell drives notifications into.
    pub fn new(ports: HostPorts) -> (AppContext, HostFeed) {
        let hub = Arc::new(Hub::new());
        let route = Arc::new(RouteStore::new(ports.fragment, Arc::clone(&hub)));
        let commands = Arc::new(CommandClient::new(ports.bridge));
        let overlays = OverlayManager::new(ports.surface, ports.scheduler);
        let ui_events = Arc::new(UiEventRegistry::new());
        let feed = HostFeed::new(Arc::clone(&hub), Arc::clone(&commands), ports.viewport);
        (
            AppContext {
                hub,
                route,
                commands,
                overlays,
                ui_events,
            },
            feed,
        )
    }
}
