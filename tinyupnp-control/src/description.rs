//! Description documents: the device tree and per-service scpd XML
//!
//! Rendered once when the tree is frozen; the documents cannot change
//! afterwards, so handlers serve cached strings.

use tinyupnp_model::{Device, Direction, Service};

use crate::handler::service_paths;
use crate::xml::element;

/// Render the root device description document
///
/// `base_url` is the `http://ip:port` the device is reachable on and
/// becomes the `URLBase`; all embedded URLs are paths below it.
pub fn device_document(root: &Device, base_url: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\r\n");
    out.push_str("<root xmlns=\"urn:schemas-upnp-org:device-1-0\">\r\n");
    out.push_str("<specVersion><major>1</major><minor>0</minor></specVersion>\r\n");
    out.push_str(&element("URLBase", &format!("{}/", base_url)));
    out.push_str("\r\n");
    device_node(root, &mut out);
    out.push_str("</root>\r\n");
    out
}

fn device_node(device: &Device, out: &mut String) {
    out.push_str("<device>\r\n");
    push_line(out, "deviceType", device.device_type());
    push_line(out, "friendlyName", device.friendly_name());
    push_line(out, "manufacturer", device.manufacturer());
    if let Some(url) = device.manufacturer_url() {
        push_line(out, "manufacturerURL", url);
    }
    if let Some(text) = device.model_description() {
        push_line(out, "modelDescription", text);
    }
    push_line(out, "modelName", device.model_name());
    if let Some(number) = device.model_number() {
        push_line(out, "modelNumber", number);
    }
    if let Some(url) = device.model_url() {
        push_line(out, "modelURL", url);
    }
    if let Some(serial) = device.serial_number() {
        push_line(out, "serialNumber", serial);
    }
    push_line(out, "UDN", &device.udn());
    if let Some(upc) = device.upc() {
        push_line(out, "UPC", upc);
    }

    let uuid = device.uuid_compact();
    let mut services = device.upnp_services().peekable();
    if services.peek().is_some() {
        out.push_str("<serviceList>\r\n");
        for service in services {
            let (scpd, control, event) = service_paths(&uuid, service.name());
            out.push_str("<service>\r\n");
            push_line(out, "serviceType", service.service_type().unwrap_or_default());
            push_line(out, "serviceId", service.service_id().unwrap_or_default());
            push_line(out, "SCPDURL", &scpd);
            push_line(out, "controlURL", &control);
            push_line(out, "eventSubURL", &event);
            out.push_str("</service>\r\n");
        }
        out.push_str("</serviceList>\r\n");
    }

    if !device.devices().is_empty() {
        out.push_str("<deviceList>\r\n");
        for child in device.devices() {
            device_node(child, out);
        }
        out.push_str("</deviceList>\r\n");
    }

    if let Some(url) = device.presentation_url() {
        push_line(out, "presentationURL", url);
    }
    out.push_str("</device>\r\n");
}

/// Render a service's scpd document
pub fn scpd_document(service: &Service) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\r\n");
    out.push_str("<scpd xmlns=\"urn:schemas-upnp-org:service-1-0\">\r\n");
    out.push_str("<specVersion><major>1</major><minor>0</minor></specVersion>\r\n");

    let mut actions = service.actions().peekable();
    if actions.peek().is_some() {
        out.push_str("<actionList>\r\n");
        for action in actions {
            out.push_str("<action>\r\n");
            push_line(&mut out, "name", action.name());
            if !action.args().is_empty() {
                out.push_str("<argumentList>\r\n");
                for arg in action.args() {
                    out.push_str("<argument>\r\n");
                    push_line(&mut out, "name", arg.external());
                    let direction = match arg.direction() {
                        Direction::In => "in",
                        Direction::Out => "out",
                    };
                    push_line(&mut out, "direction", direction);
                    if arg.is_retval() {
                        out.push_str("<retval/>\r\n");
                    }
                    push_line(&mut out, "relatedStateVariable", arg.variable());
                    out.push_str("</argument>\r\n");
                }
                out.push_str("</argumentList>\r\n");
            }
            out.push_str("</action>\r\n");
        }
        out.push_str("</actionList>\r\n");
    }

    out.push_str("<serviceStateTable>\r\n");
    for variable in service.variables() {
        let send_events = if variable.is_evented() { "yes" } else { "no" };
        out.push_str(&format!("<stateVariable sendEvents=\"{}\">\r\n", send_events));
        push_line(&mut out, "name", variable.name());
        push_line(&mut out, "dataType", variable.kind().upnp_type());
        if !variable.default_value().is_empty() {
            push_line(&mut out, "defaultValue", variable.default_value());
        }
        if let Some((min, max, step)) = variable.kind().range() {
            out.push_str("<allowedValueRange>\r\n");
            push_line(&mut out, "minimum", &min);
            push_line(&mut out, "maximum", &max);
            push_line(&mut out, "step", &step);
            out.push_str("</allowedValueRange>\r\n");
        }
        out.push_str("</stateVariable>\r\n");
    }
    out.push_str("</serviceStateTable>\r\n");
    out.push_str("</scpd>\r\n");
    out
}

fn push_line(out: &mut String, tag: &str, content: &str) {
    out.push_str(&element(tag, content));
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyupnp_model::{Action, Variable, VarKind};

    fn tree() -> Device {
        let mut root = Device::new(
            "urn:schemas-upnp-org:device:BinaryLight:1",
            "Hall Light & Co",
            "Tiny Devices",
            "TL-100",
        )
        .with_uuid("3f1a2b44-9c01-4d6e-a1fe-0242ac120002")
        .with_presentation_url("/index.html");

        let mut service = Service::upnp(
            "SwitchPower",
            "urn:schemas-upnp-org:service:SwitchPower:1",
            "urn:upnp-org:serviceId:SwitchPower",
        );
        service
            .add_variable(Variable::new("Status", VarKind::boolean(), "0").evented())
            .unwrap();
        service
            .add_variable(Variable::new("Level", VarKind::ui1(0, 100, 5), "20"))
            .unwrap();
        service
            .add_action(
                Action::new("GetStatus").with_retval("ResultStatus", "Status").unwrap(),
            )
            .unwrap();
        root.add_service(service).unwrap();
        root
    }

    #[test]
    fn test_device_document_shape() {
        let doc = device_document(&tree(), "http://10.0.0.5:8080");
        assert!(doc.starts_with("<?xml version=\"1.0\"?>"));
        assert!(doc.contains("<URLBase>http://10.0.0.5:8080/</URLBase>"));
        assert!(doc.contains("<friendlyName>Hall Light &amp; Co</friendlyName>"));
        assert!(doc.contains("<UDN>uuid:3f1a2b44-9c01-4d6e-a1fe-0242ac120002</UDN>"));
        assert!(doc.contains(
            "<SCPDURL>/upnp/3f1a2b449c014d6ea1fe0242ac120002/SwitchPower/scpd.xml</SCPDURL>"
        ));
        assert!(doc.contains(
            "<controlURL>/upnp/3f1a2b449c014d6ea1fe0242ac120002/SwitchPower/control</controlURL>"
        ));
        assert!(doc.contains("<presentationURL>/index.html</presentationURL>"));
        // No children, no deviceList element at all.
        assert!(!doc.contains("<deviceList>"));
    }

    #[test]
    fn test_embedded_devices_nest() {
        let mut root = tree();
        root.add_device(
            Device::new("urn:schemas-upnp-org:device:DimmableLight:1", "Dim", "T", "D-1")
                .with_uuid("00000000-0000-0000-0000-000000000001"),
        )
        .unwrap();
        let doc = device_document(&root, "http://10.0.0.5:8080");
        assert!(doc.contains("<deviceList>"));
        assert!(doc.contains("<UDN>uuid:00000000-0000-0000-0000-000000000001</UDN>"));
    }

    #[test]
    fn test_scpd_document_shape() {
        let binding = tree();
        let service = binding.services().first().unwrap();
        let doc = scpd_document(service);

        assert!(doc.contains("<name>GetStatus</name>"));
        assert!(doc.contains("<retval/>"));
        assert!(doc.contains("<relatedStateVariable>Status</relatedStateVariable>"));
        assert!(doc.contains("<stateVariable sendEvents=\"yes\">"));
        assert!(doc.contains("<stateVariable sendEvents=\"no\">"));
        assert!(doc.contains("<dataType>boolean</dataType>"));
        assert!(doc.contains("<defaultValue>20</defaultValue>"));
        assert!(doc.contains("<allowedValueRange>"));
        assert!(doc.contains("<minimum>0</minimum>"));
        assert!(doc.contains("<maximum>100</maximum>"));
        assert!(doc.contains("<step>5</step>"));
    }

    #[test]
    fn test_scpd_without_actions_omits_action_list() {
        let mut service = Service::upnp(
            "Empty",
            "urn:schemas-upnp-org:service:Empty:1",
            "urn:upnp-org:serviceId:Empty",
        );
        service
            .add_variable(Variable::new("X", VarKind::boolean(), "0"))
            .unwrap();
        let doc = scpd_document(&service);
        assert!(!doc.contains("<actionList>"));
        assert!(doc.contains("<serviceStateTable>"));
    }
}
