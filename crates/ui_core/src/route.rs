//! Navigation state store. The visible address fragment is the single source
//! of truth: every read re-parses it, every write goes through [`RouteStore::update`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use shared::domain::{AgentId, MainSection, SpaceId};
use tracing::warn;
use url::Url;

use crate::hub::Hub;

pub const ROUTE_HUB: &str = "Route";
pub const ROUTE_CHANGE_TOPIC: &str = "change";

/// Access to the visible address fragment. Implementations return and accept
/// the fragment without the leading `#`.
pub trait FragmentHost: Send + Sync {
    fn fragment(&self) -> String;
    fn set_fragment(&self, fragment: &str);
}

/// Flat navigation state. Scoping ids are only meaningful under their owning
/// section: `space_id` under `spaces`, `agent_id` under `agents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteState {
    pub main_id: Option<MainSection>,
    pub space_id: Option<SpaceId>,
    pub agent_id: Option<AgentId>,
}

/// Partial-merge write against the current state. A scoping id in the patch
/// pulls `main_id` to its owning section unless the patch pins one itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutePatch {
    pub main_id: Option<MainSection>,
    pub space_id: Option<SpaceId>,
    pub agent_id: Option<AgentId>,
}

pub struct RouteStore {
    host: Arc<dyn FragmentHost>,
    hub: Arc<Hub>,
    // Fragment written by our own last update, pending its native echo.
    last_written: Mutex<Option<String>>,
}

impl RouteStore {
    pub fn new(host: Arc<dyn FragmentHost>, hub: Arc<Hub>) -> Self {
        Self {
            host,
            hub,
            last_written: Mutex::new(None),
        }
    }

    /// Parsed fresh from the current fragment on every call, never cached.
    pub fn current(&self) -> RouteState {
        parse_fragment(&self.host.fragment())
    }

    /// Merges the patch into the current state, re-serializes the fragment,
    /// and publishes exactly one `Route`/`change` event.
    pub fn update(&self, patch: RoutePatch) {
        let mut state = self.current();
        if let Some(main_id) = patch.main_id {
            state.main_id = Some(main_id);
        }
        if let Some(space_id) = patch.space_id {
            state.space_id = Some(space_id);
            if patch.main_id.is_none() {
                state.main_id = Some(MainSection::Spaces);
            }
        }
        if let Some(agent_id) = patch.agent_id {
            state.agent_id = Some(agent_id);
            if patch.main_id.is_none() {
                state.main_id = Some(MainSection::Agents);
            }
        }
        self.write_fragment(&serialize_fragment(&normalize(state)));
    }

    /// Intercepted `href` activation: only hash hrefs participate in routing.
    pub fn follow_href(&self, href: &str) {
        let Some(fragment) = href.strip_prefix('#') else {
            warn!(href, "ignoring non-hash href");
            return;
        };
        self.write_fragment(fragment);
    }

    /// Entry point for the platform's native navigation event. The echo of
    /// our own most recent write is swallowed so a store write publishes once;
    /// genuinely external changes (typed-in address) do publish.
    pub fn handle_native_fragment_change(&self) {
        let fragment = strip_hash(&self.host.fragment()).to_string();
        {
            let mut last_written = self.last_written.lock();
            if last_written.as_deref() == Some(fragment.as_str()) {
                *last_written = None;
                return;
            }
        }
        self.publish_change();
    }

    fn write_fragment(&self, fragment: &str) {
        self.host.set_fragment(fragment);
        *self.last_written.lock() = Some(fragment.to_string());
        self.publish_change();
    }

    fn publish_change(&self) {
        self.hub
            .publish(ROUTE_HUB, ROUTE_CHANGE_TOPIC, None, Value::Null);
    }
}

fn strip_hash(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

/// A fully serializable state: scoping ids outside their owning section are
/// dropped rather than carried around invisibly.
fn normalize(mut state: RouteState) -> RouteState {
    match state.main_id {
        Some(MainSection::Spaces) => state.agent_id = None,
        Some(MainSection::Agents) => state.space_id = None,
        Some(MainSection::Drives) | None => {
            state.space_id = None;
            state.agent_id = None;
        }
    }
    state
}

/// Parses `<section>` or `<section>?<key>=<id>` fragments, with or without a
/// leading `#`. Anything unrecognized or unparseable is the empty route.
pub fn parse_fragment(fragment: &str) -> RouteState {
    let fragment = strip_hash(fragment);
    if fragment.is_empty() {
        return RouteState::default();
    }

    // The fragment is path + query of a relative URL against a placeholder
    // base.
    let Ok(base) = Url::parse("http://placeholder/") else {
        return RouteState::default();
    };
    let Ok(url) = base.join(fragment) else {
        return RouteState::default();
    };

    let Some(main_id) = MainSection::parse(url.path().trim_matches('/')) else {
        return RouteState::default();
    };

    let mut state = RouteState {
        main_id: Some(main_id),
        ..Default::default()
    };
    match main_id {
        MainSection::Spaces => state.space_id = query_id(&url, "space_id").map(SpaceId),
        MainSection::Agents => state.agent_id = query_id(&url, "agent_id").map(AgentId),
        MainSection::Drives => {}
    }
    state
}

/// Reads a query parameter by key and parses it as a numeric id. A missing or
/// non-numeric value yields `None` rather than an error.
fn query_id(url: &Url, key: &str) -> Option<i64> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}

/// Inverse of [`parse_fragment`] for normalized states.
pub fn serialize_fragment(state: &RouteState) -> String {
    let Some(main_id) = state.main_id else {
        return String::new();
    };
    match main_id {
        MainSection::Spaces => match state.space_id {
            Some(SpaceId(id)) => format!("spaces?space_id={id}"),
            None => "spaces".to_string(),
        },
        MainSection::Agents => match state.agent_id {
            Some(AgentId(id)) => format!("agents?agent_id={id}"),
            None => "agents".to_string(),
        },
        MainSection::Drives => "drives".to_string(),
    }
}
