//! Control-point surface of a tinyupnp device
//!
//! Three protocols hang off the HTTP server: description (the device and
//! service XML documents), control (SOAP-style action calls) and eventing
//! (subscriptions with NOTIFY callbacks). [`ControlHandler`] routes the
//! URL space for one device tree; [`Eventing`] owns the subscription
//! tables and the single delivery worker.

mod description;
mod error;
mod events;
mod gena;
mod handler;
mod soap;
mod xml;

pub use description::{device_document, scpd_document};
pub use error::{ControlError, Result};
pub use events::EVENT_QUEUE_DEPTH;
pub use gena::{Eventing, SUBSCRIPTION_SLOTS, SUBSCRIPTION_TIMEOUT_FLOOR};
pub use handler::{device_path, service_paths, ControlHandler};
pub use xml::{escape, unescape};
