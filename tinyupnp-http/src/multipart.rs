//! Multipart form bodies with streamed file parts
//!
//! Field parts land on the request's argument list; file parts are pushed
//! to the matched handler's upload callback in fixed-size chunks so a
//! device never holds a whole firmware image in one buffer beyond the
//! received body itself.

use crate::handler::{Handler, UploadEvent};
use crate::request::Request;
use crate::UPLOAD_CHUNK;

/// Pull `boundary=...` out of a multipart content type
pub(crate) fn boundary_of(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    if !lower.starts_with("multipart/") {
        return None;
    }
    for param in content_type.split(';').skip(1) {
        let param = param.trim();
        if let Some(value) = param
            .strip_prefix("boundary=")
            .or_else(|| param.strip_prefix("BOUNDARY="))
        {
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

/// Walk a complete multipart body
///
/// Field parts become request arguments; file parts stream through the
/// handler's upload callback. Malformed framing is tolerated by skipping
/// whatever cannot be framed rather than failing the request.
pub(crate) fn process(body: &[u8], boundary: &str, request: &mut Request, handler: &dyn Handler) {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut pos = match find(body, &delimiter, 0) {
        Some(at) => at + delimiter.len(),
        None => return,
    };

    loop {
        // After a delimiter: "--" closes the body, CRLF opens a part.
        if body[pos..].starts_with(b"--") {
            return;
        }
        let part_start = match body[pos..].starts_with(b"\r\n") {
            true => pos + 2,
            false => return,
        };
        let part_end = match find(body, &delimiter, part_start) {
            Some(at) => at,
            None => return,
        };
        handle_part(&body[part_start..part_end], request, handler);
        pos = part_end + delimiter.len();
    }
}

fn handle_part(part: &[u8], request: &mut Request, handler: &dyn Handler) {
    let Some(header_end) = find(part, b"\r\n\r\n", 0) else {
        return;
    };
    let headers = String::from_utf8_lossy(&part[..header_end]);
    // Part data runs to the CRLF owned by the next delimiter.
    let data = part[header_end + 4..].strip_suffix(b"\r\n").unwrap_or(&part[header_end + 4..]);

    let mut field = String::new();
    let mut filename: Option<String> = None;
    for line in headers.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        for param in value.split(';') {
            let param = param.trim();
            if let Some(v) = param.strip_prefix("name=") {
                field = v.trim_matches('"').to_string();
            } else if let Some(v) = param.strip_prefix("filename=") {
                filename = Some(v.trim_matches('"').to_string());
            }
        }
    }

    match filename {
        Some(filename) => {
            handler.upload(request, UploadEvent::Start { field: &field, filename: &filename });
            for chunk in data.chunks(UPLOAD_CHUNK) {
                handler.upload(request, UploadEvent::Write { data: chunk });
            }
            handler.upload(request, UploadEvent::End { total: data.len() });
        }
        None => {
            request.push_arg(field, String::from_utf8_lossy(data).into_owned());
        }
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|at| at + from)
}
