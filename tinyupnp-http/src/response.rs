//! Responses and the three content-length strategies
//!
//! A body is either counted bytes, empty, or a chunk sequence of unknown
//! total length. Unknown length turns into `Transfer-Encoding: chunked`
//! when the client speaks HTTP/1.1; a 1.0 client gets the raw bytes and
//! learns the length from the connection closing.

use std::io::{self, Write};

use crate::status::reason;

/// Response body variants
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Pieces of a body whose total length is not known up front
    Chunks(Vec<Vec<u8>>),
}

/// One HTTP response under construction
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Body::Empty }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Text body with an explicit content type
    pub fn text(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", content_type)
            .with_bytes(body.into().into_bytes())
    }

    /// `text/xml` body, the control protocol's staple
    pub fn xml(status: u16, body: impl Into<String>) -> Self {
        Self::text(status, "text/xml; charset=\"utf-8\"", body)
    }

    pub fn not_found() -> Self {
        Self::text(404, "text/plain", "Not Found")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.body = Body::Bytes(bytes);
        self
    }

    /// Body of unknown total length, sent chunked to HTTP/1.1 clients
    pub fn with_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.body = Body::Chunks(chunks);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Serialize onto the wire for a client speaking HTTP/1.`minor`
    pub fn write_to<W: Write>(&self, w: &mut W, minor: u8) -> io::Result<()> {
        write!(w, "HTTP/1.{} {} {}\r\n", minor, self.status, reason(self.status))?;

        for (name, value) in &self.headers {
            write!(w, "{}: {}\r\n", name, value)?;
        }

        let preset_length = self.header("content-length").is_some();
        let chunked = match &self.body {
            Body::Bytes(bytes) => {
                if !preset_length {
                    write!(w, "Content-Length: {}\r\n", bytes.len())?;
                }
                false
            }
            Body::Empty => {
                if !preset_length {
                    w.write_all(b"Content-Length: 0\r\n")?;
                }
                false
            }
            Body::Chunks(_) => {
                if minor >= 1 {
                    w.write_all(b"Transfer-Encoding: chunked\r\n")?;
                    w.write_all(b"Accept-Ranges: none\r\n")?;
                    true
                } else {
                    false
                }
            }
        };

        if self.header("connection").is_none() {
            w.write_all(b"Connection: close\r\n")?;
        }
        w.write_all(b"\r\n")?;

        match &self.body {
            Body::Empty => {}
            Body::Bytes(bytes) => w.write_all(bytes)?,
            Body::Chunks(chunks) => {
                if chunked {
                    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
                        write!(w, "{:X}\r\n", chunk.len())?;
                        w.write_all(chunk)?;
                        w.write_all(b"\r\n")?;
                    }
                    w.write_all(b"0\r\n\r\n")?;
                } else {
                    // 1.0 client: length delimited by connection close.
                    for chunk in chunks {
                        w.write_all(chunk)?;
                    }
                }
            }
        }
        Ok(())
    }
}
