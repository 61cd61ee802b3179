use std::fmt;

/// Control-protocol fault codes carried by action and validation failures
///
/// Codes 600-605 are produced by variable validation; 401/402/501 by the
/// action dispatch layer. Every fault maps onto an HTTP 500 response with a
/// fault envelope naming the numeric code and description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// No action by that name on this service (401)
    InvalidAction,
    /// Argument missing, out of order or failing validation (402)
    InvalidArgs,
    /// The action handler refused the invocation (501)
    ActionFailed,
    /// Value does not parse or sits off the step grid (600)
    InvalidValue,
    /// Numeric value outside the declared range (601)
    OutOfRange,
    /// Optional action not implemented (602)
    NotImplemented,
    /// A resource limit was hit while servicing the request (603)
    OutOfMemory,
    /// The device needs human intervention before retrying (604)
    HumanIntervention,
    /// String value exceeds the declared maximum length (605)
    StringTooLong,
}

impl FaultCode {
    /// Numeric fault code for the wire
    pub fn code(self) -> u16 {
        match self {
            FaultCode::InvalidAction => 401,
            FaultCode::InvalidArgs => 402,
            FaultCode::ActionFailed => 501,
            FaultCode::InvalidValue => 600,
            FaultCode::OutOfRange => 601,
            FaultCode::NotImplemented => 602,
            FaultCode::OutOfMemory => 603,
            FaultCode::HumanIntervention => 604,
            FaultCode::StringTooLong => 605,
        }
    }

    /// Human readable description for the fault envelope
    pub fn description(self) -> &'static str {
        match self {
            FaultCode::InvalidAction => "Invalid Action",
            FaultCode::InvalidArgs => "Invalid Args",
            FaultCode::ActionFailed => "Action Failed",
            FaultCode::InvalidValue => "Argument Value Invalid",
            FaultCode::OutOfRange => "Argument Value Out of Range",
            FaultCode::NotImplemented => "Optional Action Not Implemented",
            FaultCode::OutOfMemory => "Out of Memory",
            FaultCode::HumanIntervention => "Human Intervention Required",
            FaultCode::StringTooLong => "String Argument Too Long",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_upnp_table() {
        assert_eq!(FaultCode::InvalidAction.code(), 401);
        assert_eq!(FaultCode::InvalidArgs.code(), 402);
        assert_eq!(FaultCode::ActionFailed.code(), 501);
        assert_eq!(FaultCode::InvalidValue.code(), 600);
        assert_eq!(FaultCode::OutOfRange.code(), 601);
        assert_eq!(FaultCode::NotImplemented.code(), 602);
        assert_eq!(FaultCode::OutOfMemory.code(), 603);
        assert_eq!(FaultCode::HumanIntervention.code(), 604);
        assert_eq!(FaultCode::StringTooLong.code(), 605);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FaultCode::InvalidArgs), "402 (Invalid Args)");
    }
}
