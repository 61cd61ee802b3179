//! Actions and their argument bindings
//!
//! An action is a named operation with up to [`MAX_ACTION_ARGS`] argument
//! slots. Each slot binds one of the owning service's variables under an
//! external argument name, in one direction. At most one slot may be the
//! return value and it must come first, matching how the control layer
//! echoes it back ahead of the other outputs.

use crate::error::{ModelError, Result};

/// Maximum number of argument slots per action
pub const MAX_ACTION_ARGS: usize = 6;

/// Direction of an action argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// One argument slot of an [`Action`]
#[derive(Debug, Clone)]
pub struct Argument {
    variable: String,
    external: String,
    direction: Direction,
    retval: bool,
}

impl Argument {
    /// Name of the bound service variable
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Argument name used on the wire
    pub fn external(&self) -> &str {
        &self.external
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_retval(&self) -> bool {
        self.retval
    }
}

/// A named operation over a service's variables
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    args: Vec<Argument>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), args: Vec::new() }
    }

    /// Bind an input argument, consumed in declaration order by dispatch
    pub fn with_input(self, external: impl Into<String>, variable: impl Into<String>) -> Result<Self> {
        self.bind(external.into(), variable.into(), Direction::In, false)
    }

    /// Bind an output argument, echoed in declaration order
    pub fn with_output(self, external: impl Into<String>, variable: impl Into<String>) -> Result<Self> {
        self.bind(external.into(), variable.into(), Direction::Out, false)
    }

    /// Bind the return value; must be the first argument added
    pub fn with_retval(self, external: impl Into<String>, variable: impl Into<String>) -> Result<Self> {
        if !self.args.is_empty() {
            return Err(ModelError::RetvalNotFirst(self.name));
        }
        self.bind(external.into(), variable.into(), Direction::Out, true)
    }

    fn bind(mut self, external: String, variable: String, direction: Direction, retval: bool) -> Result<Self> {
        if self.args.len() >= MAX_ACTION_ARGS {
            return Err(ModelError::TooManyArguments(self.name));
        }
        if self.args.iter().any(|a| a.variable == variable) {
            return Err(ModelError::DuplicateBinding { action: self.name, variable });
        }
        self.args.push(Argument { variable, external, direction, retval });
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All argument slots in declaration order
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Input slots in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Argument> {
        self.args.iter().filter(|a| a.direction == Direction::In)
    }

    /// Output slots (return value included) in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &Argument> {
        self.args.iter().filter(|a| a.direction == Direction::Out)
    }
}
