//! Capability data model for tinyupnp
//!
//! A device is a tree of [`Device`] nodes, each carrying identity metadata,
//! embedded child devices and a list of [`Service`]s. A service owns an
//! ordered list of activities, where an activity is either a state
//! [`Variable`] or an [`Action`] binding variables as arguments.
//!
//! Composition happens on owned values before the tree is started; once a
//! service is attached to a device it is handed back as an `Arc` and only
//! its runtime state (variable values, hooks) can change, behind the
//! service's own lock. Protocol concerns (description XML, SOAP, eventing,
//! discovery) live in the sibling crates and only consume this model.

mod action;
mod device;
mod error;
mod fault;
mod service;
mod store;
mod variable;

pub use action::{Action, Argument, Direction, MAX_ACTION_ARGS};
pub use device::Device;
pub use error::{ModelError, Result, StoreError};
pub use fault::FaultCode;
pub use service::{Activity, ChangeSink, Hook, HookFn, Service, ServiceContext, ServiceMode};
pub use store::{MemoryStore, Store};
pub use variable::{Variable, VarKind};
