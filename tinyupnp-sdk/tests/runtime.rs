//! End-to-end exercises of a running device over real loopback sockets

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tinyupnp::{
    Action, Device, DeviceRuntime, Hook, RuntimeConfig, Service, VarKind, Variable,
};

const UUID: &str = "aaaabbbb-cccc-4ddd-8eee-ffff00001111";
const UUID_COMPACT: &str = "aaaabbbbcccc4ddd8eeeffff00001111";

/// A BinaryLight whose Status follows Target through a change hook
fn light() -> (Device, std::sync::Arc<Service>) {
    let mut device = Device::new(
        "urn:schemas-upnp-org:device:BinaryLight:1",
        "Hall Light",
        "Tiny Devices",
        "TL-100",
    )
    .with_uuid(UUID);

    let mut power = Service::upnp(
        "SwitchPower",
        "urn:schemas-upnp-org:service:SwitchPower:1",
        "urn:upnp-org:serviceId:SwitchPower",
    );
    power
        .add_variable(Variable::new("Target", VarKind::boolean(), "0"))
        .unwrap();
    power
        .add_variable(Variable::new("Status", VarKind::boolean(), "0").evented())
        .unwrap();
    power
        .add_action(Action::new("SetTarget").with_input("newTargetValue", "Target").unwrap())
        .unwrap();
    power
        .add_action(Action::new("GetStatus").with_retval("ResultStatus", "Status").unwrap())
        .unwrap();
    power
        .on_hook(Box::new(|hook, activity, ctx| {
            if hook == Hook::PostChange && activity == Some("Target") {
                let target = ctx.get("Target").unwrap_or_default();
                ctx.set("Status", &target)?;
            }
            Ok(())
        }))
        .unwrap();

    let power = device.add_service(power).unwrap();
    (device, power)
}

fn start_runtime() -> (DeviceRuntime, SocketAddr, std::sync::Arc<Service>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let (device, power) = light();
    let config = RuntimeConfig::default()
        .with_bind("127.0.0.1:0".parse().unwrap())
        .without_discovery();
    let mut runtime = DeviceRuntime::new(device, config).unwrap();
    runtime.start().unwrap();

    let addr: SocketAddr = runtime
        .base_url()
        .strip_prefix("http://")
        .unwrap()
        .parse()
        .unwrap();
    (runtime, addr, power)
}

/// Send raw request text and read the full response
fn exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(request.as_bytes()).unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).unwrap();
    out
}

fn header_value<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response.lines().skip(1).take_while(|l| !l.is_empty()).find_map(|line| {
        let (n, v) = line.split_once(':')?;
        if n.trim().eq_ignore_ascii_case(name) {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Accept NOTIFY callbacks, answering 200 and forwarding the raw text
fn notify_listener() -> (SocketAddr, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let mut buf = Vec::new();
            let mut tmp = [0u8; 1024];
            while !request_complete(&buf) {
                match stream.read(&mut tmp) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&tmp[..n]),
                }
            }
            let _ = stream.write_all(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
            if tx.send(String::from_utf8_lossy(&buf).to_string()).is_err() {
                break;
            }
        }
    });
    (addr, rx)
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let length: usize = text
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    buf.len() >= split + 4 + length
}

#[test]
fn test_description_round_trip() {
    let (mut runtime, addr, _power) = start_runtime();

    let response = exchange(
        addr,
        &format!(
            "GET /upnp/{}/device.xml HTTP/1.1\r\nHost: x\r\n\r\n",
            UUID_COMPACT
        ),
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("<friendlyName>Hall Light</friendlyName>"));
    assert!(response.contains("urn:schemas-upnp-org:service:SwitchPower:1"));
    assert!(response.contains(&format!("/upnp/{}/SwitchPower/control", UUID_COMPACT)));

    let response = exchange(
        addr,
        &format!(
            "GET /upnp/{}/SwitchPower/scpd.xml HTTP/1.1\r\nHost: x\r\n\r\n",
            UUID_COMPACT
        ),
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("<name>SetTarget</name>"));

    runtime.stop();
}

#[test]
fn test_unknown_path_is_404() {
    let (mut runtime, addr, _power) = start_runtime();
    let response = exchange(addr, "GET /nothing/here HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    runtime.stop();
}

#[test]
fn test_soap_action_round_trip() {
    let (mut runtime, addr, power) = start_runtime();

    let body = "<?xml version=\"1.0\"?>\
                <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
                <s:Body><u:SetTarget xmlns:u=\"urn:schemas-upnp-org:service:SwitchPower:1\">\
                <newTargetValue>1</newTargetValue>\
                </u:SetTarget></s:Body></s:Envelope>";
    let request = format!(
        "POST /upnp/{}/SwitchPower/control HTTP/1.1\r\n\
         Host: x\r\n\
         Content-Type: text/xml; charset=\"utf-8\"\r\n\
         SOAPACTION: \"urn:schemas-upnp-org:service:SwitchPower:1#SetTarget\"\r\n\
         Content-Length: {}\r\n\r\n{}",
        UUID_COMPACT,
        body.len(),
        body,
    );
    let response = exchange(addr, &request);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("<u:SetTargetResponse"));

    // The change hook mirrored Target into Status.
    assert_eq!(power.read("Status").unwrap(), "1");

    let body = "<s:Envelope><s:Body><u:GetStatus/></s:Body></s:Envelope>";
    let request = format!(
        "POST /upnp/{}/SwitchPower/control HTTP/1.1\r\n\
         Host: x\r\n\
         Content-Type: text/xml\r\n\
         SOAPACTION: \"urn:schemas-upnp-org:service:SwitchPower:1#GetStatus\"\r\n\
         Content-Length: {}\r\n\r\n{}",
        UUID_COMPACT,
        body.len(),
        body,
    );
    let response = exchange(addr, &request);
    assert!(response.contains("<ResultStatus>1</ResultStatus>"), "{response}");

    runtime.stop();
}

#[test]
fn test_soap_fault_for_unknown_action() {
    let (mut runtime, addr, _power) = start_runtime();

    let body = "<s:Envelope><s:Body><u:Blink/></s:Body></s:Envelope>";
    let request = format!(
        "POST /upnp/{}/SwitchPower/control HTTP/1.1\r\n\
         Host: x\r\n\
         Content-Type: text/xml\r\n\
         SOAPACTION: \"urn:schemas-upnp-org:service:SwitchPower:1#Blink\"\r\n\
         Content-Length: {}\r\n\r\n{}",
        UUID_COMPACT,
        body.len(),
        body,
    );
    let response = exchange(addr, &request);
    assert!(response.starts_with("HTTP/1.1 500"), "{response}");
    assert!(response.contains("<errorCode>401</errorCode>"));
    assert!(response.contains("<errorDescription>Invalid Action</errorDescription>"));

    runtime.stop();
}

#[test]
fn test_eventing_initial_and_change_notifications() {
    let (mut runtime, addr, power) = start_runtime();
    let (callback_addr, notifications) = notify_listener();

    let request = format!(
        "SUBSCRIBE /upnp/{}/SwitchPower/event HTTP/1.1\r\n\
         Host: x\r\n\
         NT: upnp:event\r\n\
         CALLBACK: <http://{}/cb>\r\n\
         TIMEOUT: Second-1800\r\n\r\n",
        UUID_COMPACT, callback_addr,
    );
    let response = exchange(addr, &request);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    let sid = header_value(&response, "sid").unwrap().to_string();
    assert!(sid.starts_with("uuid:"));
    assert_eq!(header_value(&response, "timeout"), Some("Second-1800"));

    // Initial notification carries the full evented state at sequence 0.
    let initial = notifications.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(initial.starts_with("NOTIFY /cb HTTP/1.0\r\n"), "{initial}");
    assert_eq!(header_value(&initial, "seq"), Some("0"));
    assert_eq!(header_value(&initial, "sid"), Some(sid.as_str()));
    assert!(initial.contains("<Status>0</Status>"));

    power.write("Status", "1").unwrap();
    let change = notifications.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(header_value(&change, "seq"), Some("1"));
    assert!(change.contains("<Status>1</Status>"));

    // Unsubscribing stops delivery.
    let request = format!(
        "UNSUBSCRIBE /upnp/{}/SwitchPower/event HTTP/1.1\r\n\
         Host: x\r\n\
         SID: {}\r\n\r\n",
        UUID_COMPACT, sid,
    );
    let response = exchange(addr, &request);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");

    power.write("Status", "0").unwrap();
    assert!(notifications.recv_timeout(Duration::from_millis(500)).is_err());

    runtime.stop();
}

#[test]
fn test_subscribe_without_callback_is_rejected() {
    let (mut runtime, addr, _power) = start_runtime();
    let request = format!(
        "SUBSCRIBE /upnp/{}/SwitchPower/event HTTP/1.1\r\n\
         Host: x\r\n\
         NT: upnp:event\r\n\r\n",
        UUID_COMPACT,
    );
    let response = exchange(addr, &request);
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    runtime.stop();
}
