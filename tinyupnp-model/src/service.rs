//! Services: ordered activities plus locked runtime state
//!
//! A service owns its variables and actions in attachment order and guards
//! all mutable state behind one mutex. Hook callbacks run inside that
//! critical section and receive a [`ServiceContext`] giving direct access
//! to sibling variables, so a hook never has to take the lock again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::action::{Action, Direction};
use crate::error::{ModelError, Result};
use crate::fault::FaultCode;
use crate::store::Store;
use crate::variable::Variable;

/// Operating mode of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceMode {
    /// Internal configuration; every variable is forced persistent
    Config,
    /// Application-private service, not exposed to control points
    Custom,
    /// Control service advertised over discovery and description
    Upnp {
        /// Service type URN, e.g. `urn:schemas-upnp-org:service:SwitchPower:1`
        service_type: String,
        /// Service id URN, e.g. `urn:upnp-org:serviceId:SwitchPower`
        service_id: String,
    },
}

/// Moments at which a service hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Init,
    Start,
    Loop,
    Stop,
    PreAction,
    PostAction,
    PreChange,
    PostChange,
}

/// Hook callback signature
///
/// The second argument names the activity involved, `None` for lifecycle
/// hooks. Returning an `Err` from `PreAction` or `PreChange` vetoes the
/// operation with that fault; errors from other hooks are logged.
pub type HookFn =
    Box<dyn FnMut(Hook, Option<&str>, &mut ServiceContext<'_>) -> std::result::Result<(), FaultCode> + Send>;

/// Receiver for accepted changes to evented variables
///
/// Installed by the eventing layer; invoked inside the service critical
/// section, so implementations must not call back into the service.
pub trait ChangeSink: Send + Sync {
    fn variable_changed(&self, service_key: &str, variable: &str);
}

/// Either kind of activity a service can carry
#[derive(Debug, Clone)]
pub enum Activity {
    Variable(Variable),
    Action(Action),
}

impl Activity {
    pub fn name(&self) -> &str {
        match self {
            Activity::Variable(v) => v.name(),
            Activity::Action(a) => a.name(),
        }
    }
}

struct VarSlot {
    value: String,
    loaded: bool,
}

struct ServiceState {
    values: HashMap<String, VarSlot>,
    hook: Option<HookFn>,
    store: Option<Arc<dyn Store>>,
    sink: Option<(String, Arc<dyn ChangeSink>)>,
}

/// A named group of variables and actions with a single critical section
pub struct Service {
    name: String,
    mode: ServiceMode,
    activities: Vec<Activity>,
    state: Mutex<ServiceState>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("name", &self.name).field("mode", &self.mode).finish()
    }
}

impl Service {
    /// Configuration service; attached variables become persistent
    pub fn config(name: impl Into<String>) -> Self {
        Self::with_mode(name, ServiceMode::Config)
    }

    /// Application-private service
    pub fn custom(name: impl Into<String>) -> Self {
        Self::with_mode(name, ServiceMode::Custom)
    }

    /// Control service exposed over description, control and eventing
    pub fn upnp(
        name: impl Into<String>,
        service_type: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self::with_mode(
            name,
            ServiceMode::Upnp { service_type: service_type.into(), service_id: service_id.into() },
        )
    }

    fn with_mode(name: impl Into<String>, mode: ServiceMode) -> Self {
        Self {
            name: name.into(),
            mode,
            activities: Vec::new(),
            state: Mutex::new(ServiceState {
                values: HashMap::new(),
                hook: None,
                store: None,
                sink: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> &ServiceMode {
        &self.mode
    }

    /// Service type URN for control services
    pub fn service_type(&self) -> Option<&str> {
        match &self.mode {
            ServiceMode::Upnp { service_type, .. } => Some(service_type),
            _ => None,
        }
    }

    /// Service id URN for control services
    pub fn service_id(&self) -> Option<&str> {
        match &self.mode {
            ServiceMode::Upnp { service_id, .. } => Some(service_id),
            _ => None,
        }
    }

    /// Attach a variable; fails on a name already used by any activity
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<()> {
        if self.activities.iter().any(|a| a.name() == variable.name()) {
            return Err(ModelError::DuplicateActivity(variable.name().to_string()));
        }
        if self.mode == ServiceMode::Config {
            variable.force_persist();
        }
        let state = self.state.get_mut().map_err(|_| ModelError::LockPoisoned)?;
        state.values.insert(
            variable.name().to_string(),
            VarSlot { value: variable.default_value().to_string(), loaded: false },
        );
        self.activities.push(Activity::Variable(variable));
        Ok(())
    }

    /// Attach an action; every bound variable must already be attached
    pub fn add_action(&mut self, action: Action) -> Result<()> {
        if self.activities.iter().any(|a| a.name() == action.name()) {
            return Err(ModelError::DuplicateActivity(action.name().to_string()));
        }
        for arg in action.args() {
            if self.find_variable(arg.variable()).is_none() {
                return Err(ModelError::UnboundVariable {
                    action: action.name().to_string(),
                    variable: arg.variable().to_string(),
                });
            }
        }
        self.activities.push(Activity::Action(action));
        Ok(())
    }

    /// Activities in attachment order
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// Variables in attachment order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.activities.iter().filter_map(|a| match a {
            Activity::Variable(v) => Some(v),
            _ => None,
        })
    }

    /// Actions in attachment order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.activities.iter().filter_map(|a| match a {
            Activity::Action(act) => Some(act),
            _ => None,
        })
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables().find(|v| v.name() == name)
    }

    pub fn find_action(&self, name: &str) -> Option<&Action> {
        self.actions().find(|a| a.name() == name)
    }

    /// Install the hook callback, replacing any previous one
    pub fn on_hook(&self, hook: HookFn) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        state.hook = Some(hook);
        Ok(())
    }

    /// Bind the persistent store used by this service's variables
    pub fn bind_store(&self, store: Arc<dyn Store>) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        state.store = Some(store);
        Ok(())
    }

    /// Bind the change sink; `key` is echoed on every notification
    pub fn bind_sink(&self, key: impl Into<String>, sink: Arc<dyn ChangeSink>) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        state.sink = Some((key.into(), sink));
        Ok(())
    }

    /// Current value of a variable, loading persisted state on first read
    pub fn read(&self, name: &str) -> Result<String> {
        let variable = self
            .find_variable(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))?;
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        Ok(read_slot(&self.name, variable, &mut state))
    }

    /// Write a variable through the full pipeline
    ///
    /// Runs pre-change hook, canonicalizes and sets the value, runs the
    /// post-change hook, persists, and notifies the change sink when an
    /// evented variable actually changed. Returns whether the value changed.
    pub fn write(&self, name: &str, raw: &str) -> Result<bool> {
        let variable = self
            .find_variable(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))?;
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        write_slot(self, variable, raw, &mut state)
    }

    /// Snapshot of all evented variables, for initial event bodies
    pub fn evented_values(&self) -> Result<Vec<(String, String)>> {
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        let mut out = Vec::new();
        for variable in self.variables().filter(|v| v.is_evented()) {
            let value = read_slot(&self.name, variable, &mut state);
            out.push((variable.name().to_string(), value));
        }
        Ok(out)
    }

    /// Run an action: inputs are (variable name, canonical value) pairs
    ///
    /// The caller validates inputs first; this method commits them. Under
    /// one lock acquisition it fires `PreAction`, writes every input through
    /// the change pipeline, fires `PostAction`, then collects the output
    /// arguments as (external name, value) pairs in declaration order.
    pub fn execute_action(
        &self,
        name: &str,
        inputs: &[(String, String)],
    ) -> Result<Vec<(String, String)>> {
        let action = self
            .find_action(name)
            .ok_or_else(|| ModelError::UnknownAction(name.to_string()))?;
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;

        if let Err(fault) = self.fire_hook(Hook::PreAction, Some(name), &mut state) {
            return Err(ModelError::Rejected(fault));
        }

        for (variable_name, value) in inputs {
            let variable = self
                .find_variable(variable_name)
                .ok_or_else(|| ModelError::UnknownVariable(variable_name.clone()))?;
            write_slot(self, variable, value, &mut state)?;
        }

        if let Err(fault) = self.fire_hook(Hook::PostAction, Some(name), &mut state) {
            tracing::warn!("post-action hook on '{}' reported {}", name, fault);
        }

        let mut outputs = Vec::new();
        for arg in action.args().iter().filter(|a| a.direction() == Direction::Out) {
            let variable = self
                .find_variable(arg.variable())
                .ok_or_else(|| ModelError::UnknownVariable(arg.variable().to_string()))?;
            let value = read_slot(&self.name, variable, &mut state);
            outputs.push((arg.external().to_string(), value));
        }
        Ok(outputs)
    }

    /// Fire a lifecycle hook (`Init`, `Start`, `Loop`, `Stop`)
    pub fn lifecycle(&self, hook: Hook) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| ModelError::LockPoisoned)?;
        if let Err(fault) = self.fire_hook(hook, None, &mut state) {
            tracing::warn!("{:?} hook on service '{}' reported {}", hook, self.name, fault);
        }
        Ok(())
    }

    /// Invoke the hook with the state already locked, guarding against
    /// re-entry by taking the callback out of the slot for the duration.
    fn fire_hook(
        &self,
        hook: Hook,
        activity: Option<&str>,
        state: &mut ServiceState,
    ) -> std::result::Result<(), FaultCode> {
        let Some(mut callback) = state.hook.take() else {
            return Ok(());
        };
        let result = {
            let mut ctx = ServiceContext { service: self, state };
            callback(hook, activity, &mut ctx)
        };
        state.hook = Some(callback);
        result
    }
}

/// Access to sibling variables from inside a hook callback
///
/// Operates on the already-locked service state. `set` runs
/// canonicalization, persistence and change notification but not the
/// change hooks, so a hook mutating a sibling cannot recurse.
pub struct ServiceContext<'a> {
    service: &'a Service,
    state: &'a mut ServiceState,
}

impl ServiceContext<'_> {
    pub fn get(&mut self, name: &str) -> Option<String> {
        let variable = self.service.find_variable(name)?;
        Some(read_slot(&self.service.name, variable, self.state))
    }

    pub fn set(&mut self, name: &str, raw: &str) -> Result<bool> {
        let variable = self
            .service
            .find_variable(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))?;
        set_slot(self.service, variable, raw, self.state)
    }

    pub fn service_name(&self) -> &str {
        &self.service.name
    }
}

fn read_slot(scope: &str, variable: &Variable, state: &mut ServiceState) -> String {
    let slot = state
        .values
        .entry(variable.name().to_string())
        .or_insert_with(|| VarSlot { value: variable.default_value().to_string(), loaded: false });
    if !slot.loaded {
        slot.loaded = true;
        if variable.is_persistent() {
            if let Some(store) = &state.store {
                match store.load(scope, variable.name()) {
                    Ok(Some(value)) => slot.value = value,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!("load of '{}::{}' failed: {}", scope, variable.name(), err)
                    }
                }
            }
        }
    }
    slot.value.clone()
}

/// Full write pipeline: pre-change hook, set, post-change hook.
fn write_slot(
    service: &Service,
    variable: &Variable,
    raw: &str,
    state: &mut ServiceState,
) -> Result<bool> {
    if let Err(fault) = service.fire_hook(Hook::PreChange, Some(variable.name()), state) {
        return Err(ModelError::Rejected(fault));
    }
    let changed = set_slot(service, variable, raw, state)?;
    if let Err(fault) = service.fire_hook(Hook::PostChange, Some(variable.name()), state) {
        tracing::warn!("post-change hook on '{}' reported {}", variable.name(), fault);
    }
    Ok(changed)
}

/// Set a value: canonicalize, detect change, persist, notify.
fn set_slot(
    service: &Service,
    variable: &Variable,
    raw: &str,
    state: &mut ServiceState,
) -> Result<bool> {
    let canonical = variable.canonicalize(raw).map_err(|fault| ModelError::InvalidValue {
        variable: variable.name().to_string(),
        fault,
    })?;

    let slot = state
        .values
        .entry(variable.name().to_string())
        .or_insert_with(|| VarSlot { value: variable.default_value().to_string(), loaded: false });
    let changed = slot.value != canonical;
    slot.value = canonical.clone();
    slot.loaded = true;

    if variable.is_persistent() {
        if let Some(store) = &state.store {
            // Persistence failures keep the in-memory value authoritative.
            if let Err(err) = store.save(&service.name, variable.name(), &canonical) {
                tracing::warn!("persist of '{}::{}' failed: {}", service.name, variable.name(), err);
            }
        }
    }

    if changed && variable.is_evented() {
        if let Some((key, sink)) = &state.sink {
            sink.variable_changed(key, variable.name());
        }
    }
    Ok(changed)
}
