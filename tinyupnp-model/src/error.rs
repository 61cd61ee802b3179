use thiserror::Error;

use crate::fault::FaultCode;

/// Errors raised while composing or operating on the capability tree
#[derive(Debug, Error)]
pub enum ModelError {
    /// A service with the same name is already attached to the device
    #[error("service '{0}' already exists on this device")]
    DuplicateService(String),

    /// An embedded device with the same UUID is already attached
    #[error("embedded device with uuid '{0}' already exists")]
    DuplicateDevice(String),

    /// An activity with the same name is already attached to the service
    #[error("activity '{0}' already exists on this service")]
    DuplicateActivity(String),

    /// An action argument binds a variable that is already bound
    #[error("action '{action}' already binds variable '{variable}'")]
    DuplicateBinding { action: String, variable: String },

    /// The action has used all of its argument slots
    #[error("action '{0}' has no free argument slot")]
    TooManyArguments(String),

    /// Return values must occupy the first argument slot
    #[error("return value must be the first argument of '{0}'")]
    RetvalNotFirst(String),

    /// An action argument references a variable the service does not have
    #[error("action '{action}' binds unknown variable '{variable}'")]
    UnboundVariable { action: String, variable: String },

    /// Lookup of a variable by name failed
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Lookup of an action by name failed
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// A value failed validation on the write path
    #[error("invalid value for '{variable}': {fault}")]
    InvalidValue { variable: String, fault: FaultCode },

    /// A hook callback rejected the operation
    #[error("rejected by service hook: {0}")]
    Rejected(FaultCode),

    /// The persistent store reported a failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A service lock was poisoned by a panicking holder
    #[error("service state lock poisoned")]
    LockPoisoned,
}

impl From<ModelError> for FaultCode {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidValue { fault, .. } | ModelError::Rejected(fault) => fault,
            _ => FaultCode::ActionFailed,
        }
    }
}

/// Type alias for results that can return a [`ModelError`]
pub type Result<T> = std::result::Result<T, ModelError>;

/// Failure reported by a persistent [`Store`](crate::Store) backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::DuplicateActivity("Status".to_string());
        assert_eq!(format!("{}", err), "activity 'Status' already exists on this service");

        let err = ModelError::InvalidValue {
            variable: "Target".to_string(),
            fault: FaultCode::OutOfRange,
        };
        let text = format!("{}", err);
        assert!(text.contains("Target"));
        assert!(text.contains("601"));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ModelError = StoreError::Backend("nvs closed".to_string()).into();
        assert!(matches!(err, ModelError::Store(_)));
    }
}
