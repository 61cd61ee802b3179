//! Action invocation over POSTed SOAP envelopes
//!
//! The envelope is scanned, not parsed: each declared input argument is
//! consumed from the body strictly in declaration order with a tolerant
//! tag scanner. Callers that reorder arguments draw an Invalid Args
//! fault, matching how the installed base of control points behaves.
//! Every argument is validated before anything is written, so a faulting
//! call never mutates state.

use tinyupnp_http::{Request, Response};
use tinyupnp_model::{FaultCode, ModelError, Service};

use crate::xml::{escape, unescape};

/// Handle a POST to a service's control URL
pub fn dispatch(service: &Service, service_type: &str, request: &Request) -> Response {
    let content_type = request.header("content-type").unwrap_or("");
    if !content_type.trim_start().to_ascii_lowercase().starts_with("text/xml") {
        return Response::new(415);
    }

    let Some(header) = request.header("soapaction") else {
        return Response::new(400);
    };
    let Some(action_name) = action_of(header) else {
        return Response::new(400);
    };

    let Some(action) = service.find_action(&action_name) else {
        return fault(FaultCode::InvalidAction);
    };

    let body = request.body_str();
    let mut pos = 0usize;
    let mut inputs = Vec::new();
    for arg in action.inputs() {
        let Some(raw) = scan_tag(&body, &mut pos, arg.external()) else {
            return fault(FaultCode::InvalidArgs);
        };
        let Some(variable) = service.find_variable(arg.variable()) else {
            return fault(FaultCode::InvalidArgs);
        };
        match variable.validate(&unescape(&raw)) {
            Ok(canonical) => inputs.push((arg.variable().to_string(), canonical)),
            Err(code) => return fault(code),
        }
    }

    match service.execute_action(&action_name, &inputs) {
        Ok(outputs) => {
            let mut args = String::new();
            for (name, value) in &outputs {
                args.push_str(&format!("<{}>{}</{}>\r\n", name, escape(value), name));
            }
            let envelope = format!(
                "<?xml version=\"1.0\"?>\r\n\
                 <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
                 s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\r\n\
                 <s:Body>\r\n\
                 <u:{name}Response xmlns:u=\"{urn}\">\r\n\
                 {args}</u:{name}Response>\r\n\
                 </s:Body>\r\n\
                 </s:Envelope>\r\n",
                name = action_name,
                urn = service_type,
                args = args,
            );
            Response::xml(200, envelope)
        }
        Err(ModelError::Rejected(code)) => fault(code),
        Err(err) => {
            tracing::warn!("action '{}' failed: {}", action_name, err);
            fault(FaultCode::ActionFailed)
        }
    }
}

/// Build the HTTP 500 fault response for a code
pub fn fault(code: FaultCode) -> Response {
    let envelope = format!(
        "<?xml version=\"1.0\"?>\r\n\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
         s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\r\n\
         <s:Body>\r\n\
         <s:Fault>\r\n\
         <faultcode>s:Client</faultcode>\r\n\
         <faultstring>UPnPError</faultstring>\r\n\
         <detail>\r\n\
         <UPnPError xmlns=\"urn:schemas-upnp-org:control-1-0\">\r\n\
         <errorCode>{}</errorCode>\r\n\
         <errorDescription>{}</errorDescription>\r\n\
         </UPnPError>\r\n\
         </detail>\r\n\
         </s:Fault>\r\n\
         </s:Body>\r\n\
         </s:Envelope>\r\n",
        code.code(),
        code.description(),
    );
    Response::xml(500, envelope)
}

/// Action name from a `SOAPACTION: "urn:...#Name"` header value
fn action_of(header: &str) -> Option<String> {
    let trimmed = header.trim().trim_matches('"');
    let (_, name) = trimmed.split_once('#')?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Find `<name ...>value</name>` (or an empty `<name/>`) at or after `*pos`
///
/// Advances `*pos` past the consumed element on success. Namespace
/// prefixes and surrounding structure are ignored; only the local order
/// of argument elements matters.
fn scan_tag(body: &str, pos: &mut usize, name: &str) -> Option<String> {
    let open = format!("<{}", name);
    let mut search = *pos;
    loop {
        let at = body[search..].find(&open)? + search;
        let after = at + open.len();
        // Guard against matching a longer tag name's prefix.
        match body[after..].chars().next()? {
            '>' | '/' | ' ' | '\t' | '\r' | '\n' => {}
            _ => {
                search = after;
                continue;
            }
        }
        let close_at = body[after..].find('>')? + after;
        if body[..close_at].ends_with('/') {
            *pos = close_at + 1;
            return Some(String::new());
        }
        let end_tag = format!("</{}>", name);
        let end_at = body[close_at + 1..].find(&end_tag)? + close_at + 1;
        *pos = end_at + end_tag.len();
        return Some(body[close_at + 1..end_at].to_string());
    }
}
