//! Client-side coordination core for the desktop app: navigation state,
//! pub/sub hub bus, host command channel, and transient overlay management.
//! Rendering, markup, and the business entities live outside this crate and
//! reach in through the port traits ([`rpc::HostBridge`],
//! [`route::FragmentHost`], [`overlay::OverlaySurface`], ...).

mod context;
pub mod host;
pub mod hub;
pub mod overlay;
pub mod route;
pub mod rpc;
pub mod timer;
pub mod view;

pub use context::{AppContext, HostPorts};

#[cfg(test)]
pub(crate) mod test_support;
