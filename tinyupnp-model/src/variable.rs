//! Typed state variables
//!
//! Every variable carries its value on the wire as a string; the
//! [`VarKind`] decides how that string is validated and canonicalized.
//! Validation never mutates anything, so the control layer can vet a whole
//! argument list before committing a single write.

use crate::fault::FaultCode;

/// Value domain of a [`Variable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// Accepts `1`/`true`/`on` and `0`/`false`/`off`, canonical `1`/`0`
    Boolean,
    /// Free text, optionally bounded in byte length
    Text { max_len: Option<usize> },
    /// Unsigned integer with an inclusive range and step grid
    Unsigned {
        upnp_type: &'static str,
        min: u64,
        max: u64,
        step: u64,
    },
    /// Signed integer with an inclusive range and step grid
    Signed {
        upnp_type: &'static str,
        min: i64,
        max: i64,
        step: i64,
    },
}

impl VarKind {
    pub fn boolean() -> Self {
        VarKind::Boolean
    }

    pub fn text() -> Self {
        VarKind::Text { max_len: None }
    }

    pub fn string(max_len: usize) -> Self {
        VarKind::Text { max_len: Some(max_len) }
    }

    pub fn ui1(min: u8, max: u8, step: u8) -> Self {
        VarKind::Unsigned { upnp_type: "ui1", min: min as u64, max: max as u64, step: step as u64 }
    }

    pub fn ui2(min: u16, max: u16, step: u16) -> Self {
        VarKind::Unsigned { upnp_type: "ui2", min: min as u64, max: max as u64, step: step as u64 }
    }

    pub fn ui4(min: u32, max: u32, step: u32) -> Self {
        VarKind::Unsigned { upnp_type: "ui4", min: min as u64, max: max as u64, step: step as u64 }
    }

    pub fn i1(min: i8, max: i8, step: i8) -> Self {
        VarKind::Signed { upnp_type: "i1", min: min as i64, max: max as i64, step: step as i64 }
    }

    pub fn i2(min: i16, max: i16, step: i16) -> Self {
        VarKind::Signed { upnp_type: "i2", min: min as i64, max: max as i64, step: step as i64 }
    }

    pub fn i4(min: i32, max: i32, step: i32) -> Self {
        VarKind::Signed { upnp_type: "i4", min: min as i64, max: max as i64, step: step as i64 }
    }

    /// Data type name used in service description documents
    pub fn upnp_type(&self) -> &'static str {
        match self {
            VarKind::Boolean => "boolean",
            VarKind::Text { .. } => "string",
            VarKind::Unsigned { upnp_type, .. } => upnp_type,
            VarKind::Signed { upnp_type, .. } => upnp_type,
        }
    }

    /// Range bounds and step as strings, for numeric kinds only
    pub fn range(&self) -> Option<(String, String, String)> {
        match self {
            VarKind::Unsigned { min, max, step, .. } => {
                Some((min.to_string(), max.to_string(), step.to_string()))
            }
            VarKind::Signed { min, max, step, .. } => {
                Some((min.to_string(), max.to_string(), step.to_string()))
            }
            _ => None,
        }
    }
}

/// A named state variable attached to a service
///
/// `evented` variables feed the eventing layer on every accepted change;
/// `persist` variables are loaded once from the [`Store`](crate::Store) on
/// first read and written back after every change.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    kind: VarKind,
    default: String,
    evented: bool,
    persist: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VarKind, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default.into(),
            evented: false,
            persist: false,
        }
    }

    /// Mark the variable as evented, feeding change notifications
    pub fn evented(mut self) -> Self {
        self.evented = true;
        self
    }

    /// Mark the variable as persistent across restarts
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &VarKind {
        &self.kind
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub fn is_evented(&self) -> bool {
        self.evented
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    pub(crate) fn force_persist(&mut self) {
        self.persist = true;
    }

    /// Validate `raw` against the variable's kind without touching state
    ///
    /// Returns the canonical form of the value on success, or the fault the
    /// control layer should report. Out-of-range numerics fault here even
    /// though the write path would clamp them; validation is what stands
    /// between a caller's argument list and any mutation.
    pub fn validate(&self, raw: &str) -> Result<String, FaultCode> {
        match &self.kind {
            VarKind::Boolean => canonical_bool(raw).ok_or(FaultCode::InvalidValue),
            VarKind::Text { max_len } => {
                if let Some(max) = max_len {
                    if raw.len() > *max {
                        return Err(FaultCode::StringTooLong);
                    }
                }
                Ok(raw.to_string())
            }
            VarKind::Unsigned { min, max, step, .. } => {
                let value: u64 = raw.trim().parse().map_err(|_| FaultCode::InvalidValue)?;
                if value < *min || value > *max {
                    return Err(FaultCode::OutOfRange);
                }
                if *step > 1 && (value - *min) % *step != 0 {
                    return Err(FaultCode::InvalidValue);
                }
                Ok(value.to_string())
            }
            VarKind::Signed { min, max, step, .. } => {
                let value: i64 = raw.trim().parse().map_err(|_| FaultCode::InvalidValue)?;
                if value < *min || value > *max {
                    return Err(FaultCode::OutOfRange);
                }
                if *step > 1 && (value - *min) % *step != 0 {
                    return Err(FaultCode::InvalidValue);
                }
                Ok(value.to_string())
            }
        }
    }

    /// Canonicalize `raw` for a direct write, clamping numerics into range
    pub(crate) fn canonicalize(&self, raw: &str) -> Result<String, FaultCode> {
        match &self.kind {
            VarKind::Unsigned { min, max, .. } => {
                let value: u64 = raw.trim().parse().map_err(|_| FaultCode::InvalidValue)?;
                Ok(value.clamp(*min, *max).to_string())
            }
            VarKind::Signed { min, max, .. } => {
                let value: i64 = raw.trim().parse().map_err(|_| FaultCode::InvalidValue)?;
                Ok(value.clamp(*min, *max).to_string())
            }
            _ => self.validate(raw),
        }
    }
}

fn canonical_bool(raw: &str) -> Option<String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some("1".to_string()),
        "0" | "false" | "off" => Some("0".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_accepts_aliases() {
        let var = Variable::new("Status", VarKind::boolean(), "0");
        for raw in ["1", "true", "TRUE", "on", "On"] {
            assert_eq!(var.validate(raw).unwrap(), "1", "raw = {}", raw);
        }
        for raw in ["0", "false", "False", "off", "OFF"] {
            assert_eq!(var.validate(raw).unwrap(), "0", "raw = {}", raw);
        }
        assert_eq!(var.validate("yes"), Err(FaultCode::InvalidValue));
        assert_eq!(var.validate(""), Err(FaultCode::InvalidValue));
    }

    #[test]
    fn test_string_length_limit() {
        let var = Variable::new("Name", VarKind::string(5), "");
        assert_eq!(var.validate("abcde").unwrap(), "abcde");
        assert_eq!(var.validate("abcdef"), Err(FaultCode::StringTooLong));

        let unbounded = Variable::new("Name", VarKind::text(), "");
        assert!(unbounded.validate(&"x".repeat(10_000)).is_ok());
    }

    #[test]
    fn test_numeric_range_and_step() {
        let var = Variable::new("Level", VarKind::ui1(0, 100, 5), "0");
        assert_eq!(var.validate("55").unwrap(), "55");
        assert_eq!(var.validate("101"), Err(FaultCode::OutOfRange));
        assert_eq!(var.validate("57"), Err(FaultCode::InvalidValue));
        assert_eq!(var.validate("abc"), Err(FaultCode::InvalidValue));
    }

    #[test]
    fn test_signed_range() {
        let var = Variable::new("Offset", VarKind::i2(-100, 100, 1), "0");
        assert_eq!(var.validate("-100").unwrap(), "-100");
        assert_eq!(var.validate("-101"), Err(FaultCode::OutOfRange));
        assert_eq!(var.validate("100").unwrap(), "100");
    }

    #[test]
    fn test_validation_is_pure() {
        let var = Variable::new("Level", VarKind::ui1(0, 100, 1), "7");
        let _ = var.validate("55");
        let _ = var.validate("bad");
        assert_eq!(var.default_value(), "7");
    }

    #[test]
    fn test_write_path_clamps_numerics() {
        let var = Variable::new("Level", VarKind::ui1(10, 90, 1), "10");
        assert_eq!(var.canonicalize("5").unwrap(), "10");
        assert_eq!(var.canonicalize("100").unwrap(), "90");
        assert_eq!(var.canonicalize("50").unwrap(), "50");
        assert_eq!(var.canonicalize("junk"), Err(FaultCode::InvalidValue));
    }

    #[test]
    fn test_upnp_types() {
        assert_eq!(VarKind::boolean().upnp_type(), "boolean");
        assert_eq!(VarKind::text().upnp_type(), "string");
        assert_eq!(VarKind::ui4(0, 10, 1).upnp_type(), "ui4");
        assert_eq!(VarKind::i1(-5, 5, 1).upnp_type(), "i1");
    }

    #[test]
    fn test_range_strings() {
        let (min, max, step) = VarKind::ui2(0, 500, 10).range().unwrap();
        assert_eq!((min.as_str(), max.as_str(), step.as_str()), ("0", "500", "10"));
        assert!(VarKind::boolean().range().is_none());
    }
}
