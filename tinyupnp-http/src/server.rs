//! The poll-driven connection state machine
//!
//! One connection is serviced at a time: the listener stays non-blocking
//! and [`HttpServer::poll`] advances whatever phase the current
//! connection is in. A request that fails to arrive within the data wait
//! is dropped without a response; after a response is sent the socket
//! lingers briefly so the peer sees an orderly close.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::{HttpError, Result};
use crate::handler::{Handler, UploadEvent};
use crate::multipart;
use crate::request::{parse_form_args, parse_head, Head};
use crate::response::Response;

/// Tunables for a [`HttpServer`]
pub struct ServerConfig {
    /// Header names to retain on parsed requests
    pub tracked_headers: Vec<String>,
    /// How long a request may take to arrive completely
    pub data_wait: Duration,
    /// Write timeout while sending a response
    pub send_wait: Duration,
    /// How long to linger for the peer's close after responding
    pub close_wait: Duration,
    /// Upper bound on buffered request bytes
    pub max_request: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tracked_headers: Vec::new(),
            data_wait: Duration::from_millis(1000),
            send_wait: Duration::from_millis(5000),
            close_wait: Duration::from_millis(2000),
            max_request: 64 * 1024,
        }
    }
}

struct HeadInfo {
    head: Head,
    body_start: usize,
    handler: Option<usize>,
}

enum Conn {
    Idle,
    Receiving {
        stream: TcpStream,
        peer: SocketAddr,
        buf: Vec<u8>,
        deadline: Instant,
        head: Option<HeadInfo>,
    },
    Draining {
        stream: TcpStream,
        deadline: Instant,
    },
}

/// Single-connection HTTP server over a non-blocking listener
pub struct HttpServer {
    listener: TcpListener,
    handlers: Vec<Box<dyn Handler>>,
    not_found: Option<Box<dyn Handler>>,
    config: ServerConfig,
    conn: Conn,
}

impl HttpServer {
    pub fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener, handlers: Vec::new(), not_found: None, config, conn: Conn::Idle })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Append a handler; earlier registrations win ties
    pub fn add_handler(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// Handler consulted when nothing in the chain produced a response
    pub fn set_not_found(&mut self, handler: Box<dyn Handler>) {
        self.not_found = Some(handler);
    }

    /// Advance the connection state machine one step
    ///
    /// Cheap when nothing is pending; call it in a loop with a short
    /// sleep. Errors are connection-local and never fatal to the server.
    pub fn poll(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.conn, Conn::Idle);
        self.conn = match state {
            Conn::Idle => self.try_accept()?,
            Conn::Receiving { stream, peer, buf, deadline, head } => {
                self.advance_receive(stream, peer, buf, deadline, head)
            }
            Conn::Draining { stream, deadline } => advance_drain(stream, deadline),
        };
        Ok(())
    }

    fn try_accept(&mut self) -> Result<Conn> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                tracing::debug!("connection from {}", peer);
                Ok(Conn::Receiving {
                    stream,
                    peer,
                    buf: Vec::new(),
                    deadline: Instant::now() + self.config.data_wait,
                    head: None,
                })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Conn::Idle),
            Err(e) => Err(e.into()),
        }
    }

    fn advance_receive(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        mut buf: Vec<u8>,
        deadline: Instant,
        mut head: Option<HeadInfo>,
    ) -> Conn {
        let mut tmp = [0u8; 2048];
        let mut closed = false;
        loop {
            match stream.read(&mut tmp) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::debug!("read error from {}: {}", peer, e);
                    return Conn::Idle;
                }
            }
        }

        if buf.len() > self.config.max_request {
            tracing::warn!("request from {} exceeds {} bytes", peer, self.config.max_request);
            return self.respond(stream, Response::text(413, "text/plain", "Too Large"), 1);
        }

        if head.is_none() {
            if let Some(end) = find(&buf, b"\r\n\r\n") {
                let text = String::from_utf8_lossy(&buf[..end + 4]).into_owned();
                match parse_head(&text, &self.config.tracked_headers, peer) {
                    Ok(parsed) => {
                        let handler = self
                            .handlers
                            .iter()
                            .position(|h| h.accepts(parsed.request.method(), parsed.request.path()));
                        head = Some(HeadInfo { head: parsed, body_start: end + 4, handler });
                    }
                    Err(HttpError::UnsupportedMethod(method)) => {
                        tracing::debug!("unsupported method '{}' from {}", method, peer);
                        return self.respond(stream, Response::new(501), 1);
                    }
                    Err(e) => {
                        // Unparseable head: drop with no response.
                        tracing::debug!("bad request from {}: {}", peer, e);
                        return Conn::Idle;
                    }
                }
            }
        }

        let ready = match &head {
            Some(info) => {
                let wanted = if info.head.request.method().has_body() {
                    info.body_start + info.head.content_length
                } else {
                    info.body_start
                };
                buf.len() >= wanted
            }
            None => false,
        };
        if ready {
            if let Some(info) = head.take() {
                return self.dispatch(stream, info, &buf);
            }
        }

        if closed || Instant::now() >= deadline {
            if let Some(info) = &head {
                // A half-received upload gets told it will never finish.
                if let (Some(idx), Some(_)) =
                    (info.handler, multipart::boundary_of(&info.head.content_type))
                {
                    self.handlers[idx].upload(&info.head.request, UploadEvent::Aborted);
                }
            }
            tracing::debug!("dropping incomplete request from {}", peer);
            return Conn::Idle;
        }

        Conn::Receiving { stream, peer, buf, deadline, head }
    }

    fn dispatch(&mut self, stream: TcpStream, info: HeadInfo, buf: &[u8]) -> Conn {
        let HeadInfo { head, body_start, handler } = info;
        let Head { mut request, content_length, content_type } = head;

        if request.method().has_body() && content_length > 0 {
            let body = &buf[body_start..body_start + content_length];
            if content_type
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
            {
                parse_form_args(&mut request, &String::from_utf8_lossy(body));
            } else if let Some(boundary) = multipart::boundary_of(&content_type) {
                if let Some(idx) = handler {
                    multipart::process(body, &boundary, &mut request, self.handlers[idx].as_ref());
                }
            } else {
                request.set_body(body.to_vec());
            }
        }

        let response = handler
            .and_then(|idx| self.handlers[idx].handle(&request))
            .or_else(|| self.not_found.as_ref().and_then(|h| h.handle(&request)))
            .unwrap_or_else(Response::not_found);

        tracing::debug!(
            "{} {} -> {} for {}",
            request.method(),
            request.path(),
            response.status(),
            request.peer()
        );
        self.respond(stream, response, request.minor_version())
    }

    fn respond(&self, mut stream: TcpStream, response: Response, minor: u8) -> Conn {
        if stream.set_nonblocking(false).is_err() {
            return Conn::Idle;
        }
        let _ = stream.set_write_timeout(Some(self.config.send_wait));
        if let Err(e) = response.write_to(&mut stream, minor) {
            tracing::debug!("send failed: {}", e);
            return Conn::Idle;
        }
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Write);
        if stream.set_nonblocking(true).is_err() {
            return Conn::Idle;
        }
        Conn::Draining { stream, deadline: Instant::now() + self.config.close_wait }
    }
}

fn advance_drain(mut stream: TcpStream, deadline: Instant) -> Conn {
    let mut tmp = [0u8; 1024];
    loop {
        match stream.read(&mut tmp) {
            Ok(0) => return Conn::Idle,
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return Conn::Idle,
        }
    }
    if Instant::now() >= deadline {
        return Conn::Idle;
    }
    Conn::Draining { stream, deadline }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::request::Request;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct Echo;

    impl Handler for Echo {
        fn accepts(&self, method: Method, path: &str) -> bool {
            method == Method::Get && path == "/echo"
        }

        fn handle(&self, request: &Request) -> Option<Response> {
            let name = request.arg("name").unwrap_or("nobody").to_string();
            Some(Response::text(200, "text/plain", format!("hello {}", name)))
        }
    }

    fn spawn(mut server: HttpServer) -> (SocketAddr, Arc<AtomicBool>, thread::JoinHandle<()>) {
        let addr = server.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                let _ = server.poll();
                thread::sleep(Duration::from_millis(2));
            }
        });
        (addr, stop, handle)
    }

    fn roundtrip(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_request_response_cycle() {
        let mut server = HttpServer::bind("127.0.0.1:0", ServerConfig::default()).unwrap();
        server.add_handler(Box::new(Echo));
        let (addr, stop, handle) = spawn(server);

        let reply = roundtrip(addr, "GET /echo?name=world HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("hello world"));

        // The connection is fully closed; a second request gets its own.
        let reply = roundtrip(addr, "GET /echo HTTP/1.1\r\n\r\n");
        assert!(reply.ends_with("hello nobody"));

        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_unmatched_path_is_404() {
        let mut server = HttpServer::bind("127.0.0.1:0", ServerConfig::default()).unwrap();
        server.add_handler(Box::new(Echo));
        let (addr, stop, handle) = spawn(server);

        let reply = roundtrip(addr, "GET /missing HTTP/1.1\r\n\r\n");
        assert!(reply.starts_with("HTTP/1.1 404 Not Found\r\n"));

        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_unknown_method_is_501() {
        let mut server = HttpServer::bind("127.0.0.1:0", ServerConfig::default()).unwrap();
        let (addr, stop, handle) = spawn(server);

        let reply = roundtrip(addr, "BREW /pot HTTP/1.1\r\n\r\n");
        assert!(reply.starts_with("HTTP/1.1 501 Not Implemented\r\n"));

        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_form_body_becomes_args() {
        struct Form;
        impl Handler for Form {
            fn accepts(&self, method: Method, path: &str) -> bool {
                method == Method::Post && path == "/form"
            }
            fn handle(&self, request: &Request) -> Option<Response> {
                Some(Response::text(
                    200,
                    "text/plain",
                    request.arg("mode").unwrap_or("?").to_string(),
                ))
            }
        }

        let mut server = HttpServer::bind("127.0.0.1:0", ServerConfig::default()).unwrap();
        server.add_handler(Box::new(Form));
        let (addr, stop, handle) = spawn(server);

        let body = "mode=turbo";
        let reply = roundtrip(
            addr,
            &format!(
                "POST /form HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
        );
        assert!(reply.ends_with("turbo"));

        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
