//! Device-side UPnP in plain threads
//!
//! Compose a [`Device`] tree out of [`Service`]s, hand it to a
//! [`DeviceRuntime`] and start it: the runtime serves description,
//! control and eventing over HTTP and announces the tree over multicast
//! discovery until stopped.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tinyupnp::{
//!     Action, Device, DeviceRuntime, RuntimeConfig, Service, VarKind, Variable,
//! };
//!
//! fn main() -> tinyupnp::Result<()> {
//!     let mut light = Device::new(
//!         "urn:schemas-upnp-org:device:BinaryLight:1",
//!         "Hall Light",
//!         "Tiny Devices",
//!         "TL-100",
//!     );
//!
//!     let mut power = Service::upnp(
//!         "SwitchPower",
//!         "urn:schemas-upnp-org:service:SwitchPower:1",
//!         "urn:upnp-org:serviceId:SwitchPower",
//!     );
//!     power.add_variable(Variable::new("Target", VarKind::boolean(), "0"))?;
//!     power.add_variable(Variable::new("Status", VarKind::boolean(), "0").evented())?;
//!     power.add_action(Action::new("SetTarget").with_input("newTargetValue", "Target")?)?;
//!     let power = light.add_service(power)?;
//!
//!     let mut runtime = DeviceRuntime::new(light, RuntimeConfig::default())?;
//!     runtime.start()?;
//!     // ... drive `power` from the application ...
//!     runtime.stop();
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod runtime;

pub use config::RuntimeConfig;
pub use error::{Result, SdkError};
pub use runtime::DeviceRuntime;

pub use tinyupnp_control::{ControlHandler, Eventing};
pub use tinyupnp_http::{HttpServer, Request, Response, ServerConfig};
pub use tinyupnp_model::{
    Action, ChangeSink, Device, Direction, FaultCode, Hook, MemoryStore, ModelError, Service,
    ServiceContext, ServiceMode, Store, VarKind, Variable,
};
pub use tinyupnp_ssdp::{Advertiser, AdvertiserConfig, SsdpEntry};
