/// One advertised notification target
///
/// A discoverable device contributes three entries (`upnp:rootdevice`
/// for the root only, its bare UUID, and its device type) plus one per
/// control service type. The USN couples the owning device's UUID with
/// the notification type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpEntry {
    /// Notification type, e.g. `urn:schemas-upnp-org:device:BinaryLight:1`
    pub nt: String,
    /// Unique service name, e.g. `uuid:...::upnp:rootdevice`
    pub usn: String,
    /// Absolute URL of the device description document
    pub location: String,
}

impl SsdpEntry {
    pub fn new(nt: impl Into<String>, usn: impl Into<String>, location: impl Into<String>) -> Self {
        Self { nt: nt.into(), usn: usn.into(), location: location.into() }
    }

    /// Entry for a bare device UUID, where NT and USN coincide
    pub fn for_uuid(udn: &str, location: impl Into<String>) -> Self {
        Self { nt: udn.to_string(), usn: udn.to_string(), location: location.into() }
    }

    /// Entry for a typed notification scoped under a device UUID
    pub fn for_type(udn: &str, nt: impl Into<String>, location: impl Into<String>) -> Self {
        let nt = nt.into();
        Self { usn: format!("{}::{}", udn, nt), nt, location: location.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_entry() {
        let entry = SsdpEntry::for_uuid("uuid:abc", "http://10.0.0.5/d.xml");
        assert_eq!(entry.nt, "uuid:abc");
        assert_eq!(entry.usn, "uuid:abc");
    }

    #[test]
    fn test_typed_entry() {
        let entry = SsdpEntry::for_type("uuid:abc", "upnp:rootdevice", "http://10.0.0.5/d.xml");
        assert_eq!(entry.nt, "upnp:rootdevice");
        assert_eq!(entry.usn, "uuid:abc::upnp:rootdevice");
    }
}
