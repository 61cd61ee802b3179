use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Progress of a streamed multipart file upload
#[derive(Debug)]
pub enum UploadEvent<'a> {
    /// A file part began
    Start { field: &'a str, filename: &'a str },
    /// The next slice of file data, at most [`UPLOAD_CHUNK`](crate::UPLOAD_CHUNK) bytes
    Write { data: &'a [u8] },
    /// The file part completed
    End { total: usize },
    /// The connection died mid-upload
    Aborted,
}

/// A request endpoint in the server's first-match chain
///
/// `accepts` is consulted in registration order as soon as the header
/// block is parsed; the winning handler receives any upload stream and
/// then the `handle` call. Returning `None` falls through to the server's
/// not-found response.
pub trait Handler: Send + Sync {
    fn accepts(&self, method: Method, path: &str) -> bool;

    fn handle(&self, request: &Request) -> Option<Response>;

    fn upload(&self, _request: &Request, _event: UploadEvent<'_>) {}
}
