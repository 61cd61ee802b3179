//! The runtime that keeps a composed device tree on the air
//!
//! One HTTP poll thread per server, one timer thread for `Loop` hooks,
//! the eventing worker and the discovery advertiser. `start` brings them
//! up in that order; `stop` tears them down in reverse so the byebye
//! burst goes out while the description is still reachable.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use tinyupnp_control::{ControlHandler, Eventing};
use tinyupnp_http::{HttpServer, ServerConfig};
use tinyupnp_model::{Device, Hook, Service};
use tinyupnp_ssdp::{Advertiser, AdvertiserConfig, SsdpEntry};

use crate::config::RuntimeConfig;
use crate::error::Result;

/// Header names the control and eventing layers read from requests
const TRACKED_HEADERS: &[&str] = &["soapaction", "nt", "callback", "sid", "timeout"];

/// Sleep between HTTP poll iterations
const POLL_PAUSE: Duration = Duration::from_millis(2);

/// Everything needed to run one device tree
///
/// Construction binds sockets and renders documents; nothing is served
/// until [`start`](DeviceRuntime::start). Dropping a running runtime
/// stops it.
pub struct DeviceRuntime {
    device: Arc<Device>,
    services: Vec<Arc<Service>>,
    eventing: Arc<Eventing>,
    handler: ControlHandler,
    servers: Vec<HttpServer>,
    config: RuntimeConfig,
    base_url: String,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    advertiser: Option<Advertiser>,
    running: bool,
}

impl DeviceRuntime {
    /// Bind the HTTP servers and wire the tree up
    ///
    /// Fires the `Init` hook on every service, binds the configured
    /// store, and registers every control service with eventing.
    pub fn new(device: Device, config: RuntimeConfig) -> Result<Self> {
        let device = Arc::new(device);
        let services: Vec<Arc<Service>> = device
            .walk()
            .iter()
            .flat_map(|d| d.services().iter().cloned())
            .collect();

        for service in &services {
            if let Some(store) = &config.store {
                service.bind_store(store.clone())?;
            }
            service.lifecycle(Hook::Init)?;
        }

        let mut servers = vec![HttpServer::bind(config.bind, server_config())?];
        let port = servers[0].local_addr()?.port();
        let base_url = format!("http://{}:{}", config.bind.ip(), port);

        let eventing = Eventing::new(config.server.clone())?;
        let handler = ControlHandler::new(&device, &base_url, &config.server, eventing.clone())?;
        servers[0].add_handler(Box::new(handler.clone()));

        // Devices pinned to their own port get a second server sharing
        // the routing table.
        for node in device.walk() {
            if let Some(extra_port) = node.http_port() {
                if extra_port != port {
                    let addr = SocketAddr::new(config.bind.ip(), extra_port);
                    let mut server = HttpServer::bind(addr, server_config())?;
                    server.add_handler(Box::new(handler.clone()));
                    servers.push(server);
                }
            }
        }

        Ok(Self {
            device,
            services,
            eventing,
            handler,
            servers,
            config,
            base_url,
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            advertiser: None,
            running: false,
        })
    }

    /// Absolute URL of the root description document
    pub fn description_url(&self) -> String {
        format!("{}{}", self.base_url, self.handler.description_path())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Bring the stack up: `Start` hooks, HTTP, the loop timer, discovery
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.stop.store(false, Ordering::Relaxed);

        for service in &self.services {
            service.lifecycle(Hook::Start)?;
        }

        for server in self.servers.drain(..) {
            let flag = Arc::clone(&self.stop);
            self.threads.push(
                thread::Builder::new()
                    .name("upnp-http".into())
                    .spawn(move || poll_loop(server, flag))?,
            );
        }

        let flag = Arc::clone(&self.stop);
        let services = self.services.clone();
        let interval = self.config.loop_interval;
        self.threads.push(
            thread::Builder::new()
                .name("upnp-loop".into())
                .spawn(move || loop_ticks(services, interval, flag))?,
        );

        if self.config.discovery {
            let location = self.description_url();
            let entries = discovery_entries(&self.device, &location);
            let config = AdvertiserConfig::new(self.config.server.clone(), entries);
            self.advertiser = Some(Advertiser::start(config)?);
        }

        self.running = true;
        info!(url = %self.description_url(), "device runtime started");
        Ok(())
    }

    /// Tear the stack down: byebye, eventing worker, HTTP, `Stop` hooks
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        if let Some(mut advertiser) = self.advertiser.take() {
            advertiser.stop();
        }

        self.eventing.shutdown();

        self.stop.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("runtime thread panicked");
            }
        }

        for service in &self.services {
            if let Err(err) = service.lifecycle(Hook::Stop) {
                warn!(%err, service = service.name(), "stop hook failed");
            }
        }

        self.running = false;
        info!("device runtime stopped");
    }
}

impl Drop for DeviceRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn server_config() -> ServerConfig {
    ServerConfig {
        tracked_headers: TRACKED_HEADERS.iter().map(|h| h.to_string()).collect(),
        ..ServerConfig::default()
    }
}

fn poll_loop(mut server: HttpServer, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        if let Err(err) = server.poll() {
            warn!(%err, "http poll failed");
        }
        thread::sleep(POLL_PAUSE);
    }
}

fn loop_ticks(services: Vec<Arc<Service>>, interval: Duration, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        for service in &services {
            if let Err(err) = service.lifecycle(Hook::Loop) {
                warn!(%err, service = service.name(), "loop hook failed");
            }
        }
        thread::sleep(interval);
    }
}

/// Flatten a device tree into its discovery announcements
///
/// The root contributes `upnp:rootdevice`; every discoverable node
/// contributes its bare UUID and device type plus one entry per control
/// service type. All entries point at the root description.
pub(crate) fn discovery_entries(root: &Device, location: &str) -> Vec<SsdpEntry> {
    let mut entries = Vec::new();
    if root.is_discoverable() {
        entries.push(SsdpEntry::for_type(&root.udn(), "upnp:rootdevice", location));
    }
    for device in root.walk() {
        if !device.is_discoverable() {
            continue;
        }
        entries.push(SsdpEntry::for_uuid(&device.udn(), location));
        entries.push(SsdpEntry::for_type(&device.udn(), device.device_type(), location));
        for service in device.upnp_services() {
            if let Some(service_type) = service.service_type() {
                entries.push(SsdpEntry::for_type(&device.udn(), service_type, location));
            }
        }
    }
    entries
}
