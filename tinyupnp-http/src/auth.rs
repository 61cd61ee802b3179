//! Basic access authentication

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::request::Request;
use crate::response::Response;

/// Check a request's `Authorization` header against fixed credentials
pub fn check_basic(request: &Request, user: &str, pass: &str) -> bool {
    let expected = format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)));
    request.header("authorization").map_or(false, |h| h == expected)
}

/// 401 response asking the client to authenticate
pub fn require_basic(realm: &str) -> Response {
    Response::text(401, "text/plain", "Unauthorized")
        .with_header("WWW-Authenticate", format!("Basic realm=\"{}\"", realm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[test]
    fn test_valid_credentials() {
        // "admin:secret" in base64.
        let request = Request::new(Method::Get, "/")
            .with_header("Authorization", "Basic YWRtaW46c2VjcmV0");
        assert!(check_basic(&request, "admin", "secret"));
    }

    #[test]
    fn test_invalid_credentials() {
        let request = Request::new(Method::Get, "/")
            .with_header("Authorization", "Basic YWRtaW46d3Jvbmc=");
        assert!(!check_basic(&request, "admin", "secret"));
    }

    #[test]
    fn test_missing_header() {
        let request = Request::new(Method::Get, "/");
        assert!(!check_basic(&request, "admin", "secret"));
    }

    #[test]
    fn test_challenge_response() {
        let response = require_basic("device");
        assert_eq!(response.status(), 401);
        assert_eq!(response.header("www-authenticate"), Some("Basic realm=\"device\""));
    }
}
