//! Parsed requests and the wire-text decoding behind them

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{HttpError, Result};
use crate::method::Method;

/// One parsed HTTP request
///
/// Headers are only retained when their names were registered with the
/// server's tracking list; lookups are case insensitive. Arguments merge
/// the query string with any decoded form body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    minor_version: u8,
    peer: SocketAddr,
    headers: Vec<(String, String)>,
    args: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            minor_version: 1,
            peer: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            headers: Vec::new(),
            args: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_minor_version(mut self, minor: u8) -> Self {
        self.minor_version = minor;
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = peer;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Minor HTTP version; chunked responses need at least 1
    pub fn minor_version(&self) -> u8 {
        self.minor_version
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// First tracked header with this name, case insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First argument with this name
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn args(&self) -> &[(String, String)] {
        &self.args
    }

    /// Raw body bytes for requests that were neither form nor multipart
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub(crate) fn push_arg(&mut self, name: String, value: String) {
        self.args.push((name, value));
    }

    pub(crate) fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }
}

/// Decode `%XX` escapes and `+` spaces
pub fn url_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        // Malformed escape passes through untouched.
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: Option<&u8>) -> Option<u8> {
    match byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Append `name=value&...` pairs onto the request's argument list
pub(crate) fn parse_form_args(request: &mut Request, text: &str) {
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((name, value)) => request.push_arg(url_decode(name), url_decode(value)),
            None => request.push_arg(url_decode(pair), String::new()),
        }
    }
}

/// Everything known once the header block is complete
#[derive(Debug)]
pub(crate) struct Head {
    pub request: Request,
    pub content_length: usize,
    pub content_type: String,
}

/// Parse the request line and header block
///
/// `tracked` lists the header names retained on the request; Authorization
/// and Content-Type are always kept. Header name matching is case
/// insensitive and values are trimmed.
pub(crate) fn parse_head(head: &str, tracked: &[String], peer: SocketAddr) -> Result<Head> {
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| HttpError::BadRequest("empty request".to_string()))?;

    let mut parts = request_line.split(' ');
    let method: Method = parts
        .next()
        .ok_or_else(|| HttpError::BadRequest("missing method".to_string()))?
        .parse()?;
    let target = parts
        .next()
        .ok_or_else(|| HttpError::BadRequest("missing request target".to_string()))?;
    let version = parts
        .next()
        .ok_or_else(|| HttpError::BadRequest("missing version".to_string()))?;
    if parts.next().is_some() {
        return Err(HttpError::BadRequest("malformed request line".to_string()));
    }

    let minor_version = match version {
        "HTTP/1.1" => 1,
        "HTTP/1.0" => 0,
        other => {
            return Err(HttpError::BadRequest(format!("unsupported version '{}'", other)));
        }
    };

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };

    let mut request = Request::new(method, url_decode(path))
        .with_minor_version(minor_version)
        .with_peer(peer);
    if let Some(query) = query {
        parse_form_args(&mut request, query);
    }

    let mut content_length = 0usize;
    let mut content_type = String::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpError::BadRequest(format!("malformed header '{}'", line)));
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| HttpError::BadRequest(format!("bad content-length '{}'", value)))?;
        }
        if name.eq_ignore_ascii_case("content-type") {
            content_type = value.to_string();
        }

        let keep = name.eq_ignore_ascii_case("authorization")
            || name.eq_ignore_ascii_case("content-type")
            || tracked.iter().any(|t| t.eq_ignore_ascii_case(name));
        if keep {
            request.headers.push((name.to_string(), value.to_string()));
        }
    }

    Ok(Head { request, content_length, content_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.50:49152".parse().unwrap()
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("a%20b%2Fc"), "a b/c");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("plain"), "plain");
    }

    #[test]
    fn test_parse_request_line_and_query() {
        let head = parse_head("GET /upnp/status?name=lamp&on=1 HTTP/1.1\r\n\r\n", &[], peer()).unwrap();
        let req = head.request;
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/upnp/status");
        assert_eq!(req.arg("name"), Some("lamp"));
        assert_eq!(req.arg("on"), Some("1"));
        assert_eq!(req.minor_version(), 1);
    }

    #[test]
    fn test_http_10_version() {
        let head = parse_head("GET / HTTP/1.0\r\n\r\n", &[], peer()).unwrap();
        assert_eq!(head.request.minor_version(), 0);
    }

    #[test]
    fn test_header_tracking_allow_list() {
        let tracked = vec!["SOAPACTION".to_string()];
        let raw = "POST /control HTTP/1.1\r\n\
                   Host: 10.0.0.2\r\n\
                   soapaction: \"urn:x#Do\"\r\n\
                   Authorization: Basic abc\r\n\
                   Content-Type: text/xml\r\n\
                   X-Custom: dropped\r\n\r\n";
        let head = parse_head(raw, &tracked, peer()).unwrap();
        let req = head.request;

        // Tracked, regardless of case on the wire.
        assert_eq!(req.header("SoapAction"), Some("\"urn:x#Do\""));
        // Authorization and Content-Type always kept.
        assert_eq!(req.header("authorization"), Some("Basic abc"));
        assert_eq!(req.header("content-type"), Some("text/xml"));
        // Untracked headers are dropped.
        assert_eq!(req.header("host"), None);
        assert_eq!(req.header("x-custom"), None);
    }

    #[test]
    fn test_content_length_and_type_extracted() {
        let raw = "POST /c HTTP/1.1\r\nContent-Length: 42\r\nContent-Type: text/xml; charset=\"utf-8\"\r\n\r\n";
        let head = parse_head(raw, &[], peer()).unwrap();
        assert_eq!(head.content_length, 42);
        assert_eq!(head.content_type, "text/xml; charset=\"utf-8\"");
    }

    #[test]
    fn test_malformed_requests_rejected() {
        assert!(parse_head("GET\r\n\r\n", &[], peer()).is_err());
        assert!(parse_head("GET / HTTP/2.0\r\n\r\n", &[], peer()).is_err());
        assert!(parse_head("GET / HTTP/1.1 extra\r\n\r\n", &[], peer()).is_err());
        assert!(parse_head("GET / HTTP/1.1\r\nno-colon-here\r\n\r\n", &[], peer()).is_err());
    }

    #[test]
    fn test_unknown_method_is_distinct_error() {
        let err = parse_head("BREW /pot HTTP/1.1\r\n\r\n", &[], peer()).unwrap_err();
        assert!(matches!(err, HttpError::UnsupportedMethod(_)));
    }

    #[test]
    fn test_form_args_merge_with_query() {
        let head = parse_head("POST /c?a=1 HTTP/1.1\r\n\r\n", &[], peer()).unwrap();
        let mut req = head.request;
        parse_form_args(&mut req, "b=two+words&c=%31");
        assert_eq!(req.arg("a"), Some("1"));
        assert_eq!(req.arg("b"), Some("two words"));
        assert_eq!(req.arg("c"), Some("1"));
    }
}
