//! URL routing for one device tree
//!
//! The URL space is derived from device UUIDs and service names:
//!
//! ```text
//! /upnp/<uuid>/device.xml
//! /upnp/<uuid>/<service>/scpd.xml
//! /upnp/<uuid>/<service>/control
//! /upnp/<uuid>/<service>/event
//! ```
//!
//! Description documents are rendered once at construction; the tree
//! cannot change afterwards.

use std::sync::Arc;
use std::time::SystemTime;

use tinyupnp_http::{http_date, Handler, Method, Request, Response};
use tinyupnp_model::{Device, Service};

use crate::description::{device_document, scpd_document};
use crate::error::Result;
use crate::gena::Eventing;
use crate::soap;

/// Description path for a device
pub fn device_path(uuid_compact: &str) -> String {
    format!("/upnp/{}/device.xml", uuid_compact)
}

/// (scpd, control, event) paths for a service
pub fn service_paths(uuid_compact: &str, service: &str) -> (String, String, String) {
    (
        format!("/upnp/{}/{}/scpd.xml", uuid_compact, service),
        format!("/upnp/{}/{}/control", uuid_compact, service),
        format!("/upnp/{}/{}/event", uuid_compact, service),
    )
}

struct ServiceRoute {
    scpd_path: String,
    control_path: String,
    event_path: String,
    scpd: String,
    key: String,
    service_type: String,
    service: Arc<Service>,
}

struct Inner {
    description_path: String,
    description: String,
    routes: Vec<ServiceRoute>,
    eventing: Arc<Eventing>,
    server_header: String,
}

/// HTTP handler covering description, control and eventing for one tree
///
/// Clones share the same routing table, so the handler can be installed
/// on more than one [`HttpServer`](tinyupnp_http::HttpServer).
#[derive(Clone)]
pub struct ControlHandler {
    inner: Arc<Inner>,
}

impl ControlHandler {
    /// Build the routing table and register every control service
    pub fn new(
        root: &Device,
        base_url: &str,
        server_header: impl Into<String>,
        eventing: Arc<Eventing>,
    ) -> Result<Self> {
        let mut routes = Vec::new();
        for device in root.walk() {
            let uuid = device.uuid_compact();
            for service in device.upnp_services() {
                let (scpd_path, control_path, event_path) = service_paths(&uuid, service.name());
                let key = format!("{}/{}", uuid, service.name());
                eventing.register(&key, service.clone())?;
                routes.push(ServiceRoute {
                    scpd_path,
                    control_path,
                    event_path,
                    scpd: scpd_document(service),
                    key,
                    service_type: service.service_type().unwrap_or_default().to_string(),
                    service: service.clone(),
                });
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                description_path: device_path(&root.uuid_compact()),
                description: device_document(root, base_url),
                routes,
                eventing,
                server_header: server_header.into(),
            }),
        })
    }

    /// Path of the root device description, for LOCATION headers
    pub fn description_path(&self) -> &str {
        &self.inner.description_path
    }

    fn document(&self, body: &str) -> Response {
        Response::xml(200, body)
            .with_header("SERVER", self.inner.server_header.clone())
            .with_header("DATE", http_date(SystemTime::now()))
            .with_header("CONTENT-LANGUAGE", "en")
    }
}

impl Handler for ControlHandler {
    fn accepts(&self, method: Method, path: &str) -> bool {
        if method == Method::Get && path == self.inner.description_path {
            return true;
        }
        self.inner.routes.iter().any(|route| match method {
            Method::Get => path == route.scpd_path,
            Method::Post => path == route.control_path,
            Method::Subscribe | Method::Unsubscribe => path == route.event_path,
            _ => false,
        })
    }

    fn handle(&self, request: &Request) -> Option<Response> {
        let path = request.path();
        if request.method() == Method::Get && path == self.inner.description_path {
            return Some(self.document(&self.inner.description));
        }

        for route in &self.inner.routes {
            match request.method() {
                Method::Get if path == route.scpd_path => {
                    return Some(self.document(&route.scpd));
                }
                Method::Post if path == route.control_path => {
                    return Some(soap::dispatch(&route.service, &route.service_type, request));
                }
                Method::Subscribe if path == route.event_path => {
                    return Some(self.inner.eventing.subscribe(
                        &route.key,
                        request,
                        SystemTime::now(),
                    ));
                }
                Method::Unsubscribe if path == route.event_path => {
                    return Some(self.inner.eventing.unsubscribe(
                        &route.key,
                        request,
                        SystemTime::now(),
                    ));
                }
                _ => {}
            }
        }
        None
    }
}
