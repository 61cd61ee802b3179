use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tinyupnp_model::Store;

/// Default SERVER header advertised in responses and announcements
pub(crate) fn default_server_header() -> String {
    format!("{}/1.0 UPnP/1.0 tinyupnp/{}", std::env::consts::OS, env!("CARGO_PKG_VERSION"))
}

/// Settings for a [`DeviceRuntime`](crate::DeviceRuntime)
///
/// The bind address doubles as the LOCATION host, so on a multi-homed
/// machine it should name the interface control points can reach rather
/// than the wildcard address.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Address the shared HTTP server binds to
    pub bind: SocketAddr,
    /// SERVER header used across HTTP, eventing and discovery
    pub server: String,
    /// Announce the tree over multicast and answer searches
    pub discovery: bool,
    /// Spacing of the periodic `Loop` hook on every service
    pub loop_interval: Duration,
    /// Backing store bound to every service for persistent variables
    pub store: Option<Arc<dyn Store>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            server: default_server_header(),
            discovery: true,
            loop_interval: Duration::from_millis(100),
            store: None,
        }
    }
}

impl RuntimeConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn without_discovery(mut self) -> Self {
        self.discovery = false;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }
}
