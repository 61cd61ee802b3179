//! The notify queue and its single delivery worker
//!
//! Accepted changes become [`PendingEvent`]s on a bounded queue; one
//! background thread drains it, rendering the propertyset body and
//! pushing a `NOTIFY` to the subscriber over a plain TCP connection.
//! Delivery is fire and forget: a dead subscriber costs one log line,
//! never a retry, and a full queue drops the event rather than stalling
//! the writer.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use tinyupnp_model::Service;

use crate::xml::escape;

/// Depth of the pending notification queue
pub const EVENT_QUEUE_DEPTH: usize = 32;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// One queued notification, fully addressed at enqueue time
pub(crate) struct PendingEvent {
    pub service: Arc<Service>,
    /// `None` renders every evented variable (initial notification)
    pub variable: Option<String>,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub sid: String,
    pub seq: u32,
}

pub(crate) enum WorkerMsg {
    Notify(PendingEvent),
    Shutdown,
}

pub(crate) fn run_worker(rx: Receiver<WorkerMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::Shutdown => break,
            WorkerMsg::Notify(event) => deliver(&event),
        }
    }
    tracing::debug!("notify worker stopped");
}

fn deliver(event: &PendingEvent) {
    let pairs = match &event.variable {
        Some(name) => match event.service.read(name) {
            Ok(value) => vec![(name.clone(), value)],
            Err(err) => {
                tracing::warn!("cannot render event for '{}': {}", name, err);
                return;
            }
        },
        None => match event.service.evented_values() {
            Ok(pairs) => pairs,
            Err(err) => {
                tracing::warn!("cannot render initial event: {}", err);
                return;
            }
        },
    };

    let body = propertyset(&pairs);
    let request = format!(
        "NOTIFY {} HTTP/1.0\r\n\
         HOST: {}:{}\r\n\
         CONTENT-TYPE: text/xml; charset=\"utf-8\"\r\n\
         NT: upnp:event\r\n\
         NTS: upnp:propchange\r\n\
         SID: uuid:{}\r\n\
         SEQ: {}\r\n\
         CONTENT-LENGTH: {}\r\n\r\n{}",
        event.path, event.host, event.port, event.sid, event.seq, body.len(), body,
    );

    let mut stream = match TcpStream::connect((event.host.as_str(), event.port)) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!("notify to {}:{} failed: {}", event.host, event.port, err);
            return;
        }
    };
    let _ = stream.set_write_timeout(Some(DELIVERY_TIMEOUT));
    let _ = stream.set_read_timeout(Some(DELIVERY_TIMEOUT));
    if let Err(err) = stream.write_all(request.as_bytes()) {
        tracing::warn!("notify to {}:{} failed: {}", event.host, event.port, err);
        return;
    }
    // Read whatever status the subscriber answers with, then move on.
    let mut scratch = [0u8; 256];
    let _ = stream.read(&mut scratch);
    tracing::debug!("notified {}:{}{} seq {}", event.host, event.port, event.path, event.seq);
}

/// Render the event body for a set of variable values
pub(crate) fn propertyset(pairs: &[(String, String)]) -> String {
    let mut body = String::from("<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\">");
    for (name, value) in pairs {
        body.push_str(&format!(
            "<e:property><{}>{}</{}></e:property>",
            name,
            escape(value),
            name
        ));
    }
    body.push_str("</e:propertyset>");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propertyset_single_variable() {
        let body = propertyset(&[("Status".to_string(), "1".to_string())]);
        assert_eq!(
            body,
            "<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\">\
             <e:property><Status>1</Status></e:property></e:propertyset>"
        );
    }

    #[test]
    fn test_propertyset_escapes_values() {
        let body = propertyset(&[("Name".to_string(), "a<b".to_string())]);
        assert!(body.contains("<Name>a&lt;b</Name>"));
    }

    #[test]
    fn test_propertyset_many() {
        let body = propertyset(&[
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ]);
        assert!(body.contains("<A>1</A>"));
        assert!(body.contains("<B>2</B>"));
    }
}
