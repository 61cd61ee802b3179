//! Subscription management for the eventing protocol
//!
//! Each registered service gets a fixed table of subscription slots. A
//! SUBSCRIBE without a SID opens a subscription (or silently renews an
//! existing one from the same callback); with a SID it renews. Slot
//! sequence numbers advance at enqueue time, so a subscriber sees gaps
//! rather than stale numbering when deliveries fail.

use std::collections::HashMap;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use url::Url;
use uuid::Uuid;

use tinyupnp_http::{http_date, Request, Response};
use tinyupnp_model::{ChangeSink, Service};

use crate::error::{ControlError, Result};
use crate::events::{run_worker, PendingEvent, WorkerMsg, EVENT_QUEUE_DEPTH};

/// Subscription slots per service
pub const SUBSCRIPTION_SLOTS: usize = 5;

/// Minimum granted subscription lifetime in seconds
pub const SUBSCRIPTION_TIMEOUT_FLOOR: u64 = 1800;

struct Slot {
    sid: String,
    host: String,
    port: u16,
    path: String,
    expires: SystemTime,
    seq: u32,
}

impl Slot {
    /// Current sequence number, advancing the counter; wraps to 1, never
    /// back to the initial-event 0.
    fn next_seq(&mut self) -> u32 {
        let seq = self.seq;
        self.seq = if self.seq == u32::MAX { 1 } else { self.seq + 1 };
        seq
    }
}

struct ServiceSubs {
    service: Arc<Service>,
    slots: Vec<Option<Slot>>,
}

/// Subscription tables plus the shared notify queue
pub struct Eventing {
    tables: Mutex<HashMap<String, ServiceSubs>>,
    tx: SyncSender<WorkerMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    server_header: String,
}

impl Eventing {
    /// Spawn the delivery worker and return the shared handle
    pub fn new(server_header: impl Into<String>) -> Result<Arc<Self>> {
        let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("upnp-notify".to_string())
            .spawn(move || run_worker(rx))?;
        Ok(Arc::new(Self {
            tables: Mutex::new(HashMap::new()),
            tx,
            worker: Mutex::new(Some(worker)),
            server_header: server_header.into(),
        }))
    }

    /// Give a service a subscription table and hook its change sink up
    pub fn register(self: &Arc<Self>, key: &str, service: Arc<Service>) -> Result<()> {
        {
            let mut tables = self.tables.lock().map_err(|_| ControlError::LockPoisoned)?;
            tables.insert(
                key.to_string(),
                ServiceSubs {
                    service: service.clone(),
                    slots: (0..SUBSCRIPTION_SLOTS).map(|_| None).collect(),
                },
            );
        }
        // Services hold the sink; a weak handle avoids an ownership cycle
        // between the tables and the services they reference.
        let sink: Arc<dyn ChangeSink> = Arc::new(SinkHandle(Arc::downgrade(self)));
        service.bind_sink(key, sink)?;
        Ok(())
    }

    /// Handle a SUBSCRIBE request against a service's event URL
    pub fn subscribe(&self, key: &str, request: &Request, now: SystemTime) -> Response {
        let Ok(mut tables) = self.tables.lock() else {
            return Response::new(500);
        };
        let Some(subs) = tables.get_mut(key) else {
            return Response::not_found();
        };

        let nt = request.header("nt");
        let sid = request.header("sid");
        let callback = request.header("callback");

        // A SID alongside NT or CALLBACK is contradictory.
        if sid.is_some() && (nt.is_some() || callback.is_some()) {
            return Response::new(400);
        }

        let timeout = granted_timeout(request.header("timeout"));
        let lifetime = Duration::from_secs(timeout);

        if let Some(sid) = sid {
            let sid = sid.trim().trim_start_matches("uuid:");
            for slot in subs.slots.iter_mut().flatten() {
                if slot.sid == sid && slot.expires > now {
                    slot.expires = now + lifetime;
                    return self.granted(&slot.sid, timeout);
                }
            }
            return Response::new(412);
        }

        let Some(callback) = callback else {
            return Response::new(400);
        };
        if nt != Some("upnp:event") {
            return Response::new(412);
        }
        let Ok((host, port, path)) = parse_callback(callback) else {
            return Response::new(412);
        };

        // Same callback with time left: renew in place, no initial event.
        for slot in subs.slots.iter_mut().flatten() {
            if slot.expires > now && slot.host == host && slot.port == port && slot.path == path {
                slot.expires = now + lifetime;
                return self.granted(&slot.sid.clone(), timeout);
            }
        }

        let Some(free) = subs
            .slots
            .iter_mut()
            .find(|s| s.as_ref().map_or(true, |slot| slot.expires <= now))
        else {
            tracing::warn!("subscription table full for {}", key);
            return Response::new(500);
        };

        let sid = Uuid::new_v4().to_string();
        let mut slot = Slot { sid: sid.clone(), host, port, path, expires: now + lifetime, seq: 0 };
        let initial = PendingEvent {
            service: subs.service.clone(),
            variable: None,
            host: slot.host.clone(),
            port: slot.port,
            path: slot.path.clone(),
            sid: sid.clone(),
            seq: slot.next_seq(),
        };
        *free = Some(slot);
        tracing::info!("subscription {} opened for {}", sid, key);
        self.enqueue(initial);
        self.granted(&sid, timeout)
    }

    /// Handle an UNSUBSCRIBE request against a service's event URL
    pub fn unsubscribe(&self, key: &str, request: &Request, _now: SystemTime) -> Response {
        let Ok(mut tables) = self.tables.lock() else {
            return Response::new(500);
        };
        let Some(subs) = tables.get_mut(key) else {
            return Response::not_found();
        };

        if request.header("nt").is_some() || request.header("callback").is_some() {
            return Response::new(400);
        }
        let Some(sid) = request.header("sid") else {
            return Response::new(412);
        };
        let sid = sid.trim().trim_start_matches("uuid:");

        for slot in subs.slots.iter_mut() {
            if slot.as_ref().map_or(false, |s| s.sid == sid) {
                *slot = None;
                tracing::info!("subscription {} closed for {}", sid, key);
                return self.plain_ok();
            }
        }
        Response::new(412)
    }

    /// Count of unexpired subscriptions for a service
    pub fn active_subscriptions(&self, key: &str, now: SystemTime) -> usize {
        self.tables
            .lock()
            .map(|tables| {
                tables.get(key).map_or(0, |subs| {
                    subs.slots
                        .iter()
                        .flatten()
                        .filter(|slot| slot.expires > now)
                        .count()
                })
            })
            .unwrap_or(0)
    }

    /// Stop the delivery worker; further changes are dropped
    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerMsg::Shutdown);
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }

    fn enqueue(&self, event: PendingEvent) {
        match self.tx.try_send(WorkerMsg::Notify(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("event queue full, dropping notification");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("notify worker gone, dropping notification");
            }
        }
    }

    fn granted(&self, sid: &str, timeout: u64) -> Response {
        self.plain_ok()
            .with_header("SID", format!("uuid:{}", sid))
            .with_header("TIMEOUT", format!("Second-{}", timeout))
    }

    fn plain_ok(&self) -> Response {
        Response::new(200)
            .with_header("SERVER", self.server_header.clone())
            .with_header("DATE", http_date(SystemTime::now()))
    }
}

struct SinkHandle(Weak<Eventing>);

impl ChangeSink for SinkHandle {
    fn variable_changed(&self, service_key: &str, variable: &str) {
        if let Some(eventing) = self.0.upgrade() {
            eventing.variable_changed(service_key, variable);
        }
    }
}

impl ChangeSink for Eventing {
    fn variable_changed(&self, service_key: &str, variable: &str) {
        let Ok(mut tables) = self.tables.lock() else {
            return;
        };
        let Some(subs) = tables.get_mut(service_key) else {
            return;
        };
        let now = SystemTime::now();
        let service = subs.service.clone();
        let mut events = Vec::new();
        for slot in subs.slots.iter_mut().flatten() {
            if slot.expires <= now {
                continue;
            }
            events.push(PendingEvent {
                service: service.clone(),
                variable: Some(variable.to_string()),
                host: slot.host.clone(),
                port: slot.port,
                path: slot.path.clone(),
                sid: slot.sid.clone(),
                seq: slot.next_seq(),
            });
        }
        drop(tables);
        for event in events {
            self.enqueue(event);
        }
    }
}

impl Drop for Eventing {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerMsg::Shutdown);
    }
}

/// Clamp a `TIMEOUT: Second-n` header to the granted lifetime
fn granted_timeout(header: Option<&str>) -> u64 {
    let requested = header
        .and_then(|value| {
            let value = value.trim();
            if value.len() >= 7 && value[..7].eq_ignore_ascii_case("second-") {
                value[7..].parse::<u64>().ok()
            } else {
                None
            }
        })
        .unwrap_or(SUBSCRIPTION_TIMEOUT_FLOOR);
    requested.max(SUBSCRIPTION_TIMEOUT_FLOOR)
}

/// Pull host, port and path out of a `CALLBACK: <http://...>` header
fn parse_callback(header: &str) -> Result<(String, u16, String)> {
    let inner = header
        .find('<')
        .and_then(|start| header[start + 1..].find('>').map(|end| &header[start + 1..start + 1 + end]))
        .ok_or_else(|| ControlError::InvalidCallback(header.to_string()))?;
    let url = Url::parse(inner).map_err(|_| ControlError::InvalidCallback(header.to_string()))?;
    if url.scheme() != "http" {
        return Err(ControlError::InvalidCallback(header.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ControlError::InvalidCallback(header.to_string()))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(80);
    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    Ok((host, port, path))
}
