//! Device tree nodes
//!
//! A device carries identity metadata, services and embedded child
//! devices. Composition consumes values, so a service or child can only
//! ever sit in one place in the tree; `add_service` hands back an `Arc`
//! for later runtime access.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ModelError, Result};
use crate::service::Service;

/// One node of the device tree
#[derive(Debug)]
pub struct Device {
    device_type: String,
    uuid: String,
    friendly_name: String,
    manufacturer: String,
    manufacturer_url: Option<String>,
    model_description: Option<String>,
    model_name: String,
    model_number: Option<String>,
    model_url: Option<String>,
    serial_number: Option<String>,
    upc: Option<String>,
    presentation_url: Option<String>,
    discoverable: bool,
    http_port: Option<u16>,
    services: Vec<Arc<Service>>,
    devices: Vec<Device>,
}

impl Device {
    /// Create a device with a fresh random UUID
    pub fn new(
        device_type: impl Into<String>,
        friendly_name: impl Into<String>,
        manufacturer: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            device_type: device_type.into(),
            uuid: Uuid::new_v4().to_string(),
            friendly_name: friendly_name.into(),
            manufacturer: manufacturer.into(),
            manufacturer_url: None,
            model_description: None,
            model_name: model_name.into(),
            model_number: None,
            model_url: None,
            serial_number: None,
            upc: None,
            presentation_url: None,
            discoverable: true,
            http_port: None,
            services: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Use a fixed UUID so USN and LOCATION stay stable across restarts
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn with_manufacturer_url(mut self, url: impl Into<String>) -> Self {
        self.manufacturer_url = Some(url.into());
        self
    }

    pub fn with_model_description(mut self, text: impl Into<String>) -> Self {
        self.model_description = Some(text.into());
        self
    }

    pub fn with_model_number(mut self, number: impl Into<String>) -> Self {
        self.model_number = Some(number.into());
        self
    }

    pub fn with_model_url(mut self, url: impl Into<String>) -> Self {
        self.model_url = Some(url.into());
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_upc(mut self, upc: impl Into<String>) -> Self {
        self.upc = Some(upc.into());
        self
    }

    pub fn with_presentation_url(mut self, url: impl Into<String>) -> Self {
        self.presentation_url = Some(url.into());
        self
    }

    /// Hide the device from discovery announcements and search replies
    pub fn hidden(mut self) -> Self {
        self.discoverable = false;
        self
    }

    /// Serve this device from its own HTTP port instead of the shared one
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// UUID with dashes stripped, as used in URL paths
    pub fn uuid_compact(&self) -> String {
        self.uuid.replace('-', "")
    }

    /// Unique device name, `uuid:` prefixed
    pub fn udn(&self) -> String {
        format!("uuid:{}", self.uuid)
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn manufacturer_url(&self) -> Option<&str> {
        self.manufacturer_url.as_deref()
    }

    pub fn model_description(&self) -> Option<&str> {
        self.model_description.as_deref()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_number(&self) -> Option<&str> {
        self.model_number.as_deref()
    }

    pub fn model_url(&self) -> Option<&str> {
        self.model_url.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn upc(&self) -> Option<&str> {
        self.upc.as_deref()
    }

    pub fn presentation_url(&self) -> Option<&str> {
        self.presentation_url.as_deref()
    }

    pub fn is_discoverable(&self) -> bool {
        self.discoverable
    }

    pub fn http_port(&self) -> Option<u16> {
        self.http_port
    }

    /// Attach a service, returning the shared handle for runtime access
    pub fn add_service(&mut self, service: Service) -> Result<Arc<Service>> {
        if self.services.iter().any(|s| s.name() == service.name()) {
            return Err(ModelError::DuplicateService(service.name().to_string()));
        }
        let service = Arc::new(service);
        self.services.push(service.clone());
        Ok(service)
    }

    /// Attach an embedded device, returning a handle for further composition
    pub fn add_device(&mut self, device: Device) -> Result<&mut Device> {
        if self.devices.iter().any(|d| d.uuid == device.uuid) {
            return Err(ModelError::DuplicateDevice(device.uuid));
        }
        let idx = self.devices.len();
        self.devices.push(device);
        Ok(&mut self.devices[idx])
    }

    /// Services in attachment order
    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    /// Control services (Upnp mode) in attachment order
    pub fn upnp_services(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.iter().filter(|s| s.service_type().is_some())
    }

    /// Embedded devices in attachment order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// This device and every descendant, depth first
    pub fn walk(&self) -> Vec<&Device> {
        let mut out = vec![self];
        for child in &self.devices {
            out.extend(child.walk());
        }
        out
    }
}
