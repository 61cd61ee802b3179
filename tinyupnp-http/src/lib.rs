//! Minimal single-connection HTTP/1.x server
//!
//! Serves one client at a time from a non-blocking listener, driven by
//! repeated [`HttpServer::poll`] calls. Requests flow through a
//! first-match chain of [`Handler`]s; bodies are decoded as form
//! arguments, streamed multipart uploads or raw bytes. Small enough to
//! sit next to a device's control endpoints without a framework.

mod auth;
mod date;
mod error;
mod handler;
mod method;
mod multipart;
mod request;
mod response;
mod server;
mod status;

pub use auth::{check_basic, require_basic};
pub use date::http_date;
pub use error::{HttpError, Result};
pub use handler::{Handler, UploadEvent};
pub use method::Method;
pub use request::{url_decode, Request};
pub use response::{Body, Response};
pub use server::{HttpServer, ServerConfig};
pub use status::reason;

/// Chunk size for streamed multipart uploads
pub const UPLOAD_CHUNK: usize = 2048;
