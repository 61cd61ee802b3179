use std::fmt;
use std::str::FromStr;

use crate::error::HttpError;

/// Request methods understood by the server
///
/// SUBSCRIBE and UNSUBSCRIBE carry the eventing protocol; anything not
/// listed here draws a 501 before the request is read further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Subscribe,
    Unsubscribe,
}

impl Method {
    /// Whether a request body is read and decoded for this method
    pub fn has_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch | Method::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
        }
    }
}

impl FromStr for Method {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "SUBSCRIBE" => Ok(Method::Subscribe),
            "UNSUBSCRIBE" => Ok(Method::Unsubscribe),
            other => Err(HttpError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for text in ["GET", "POST", "SUBSCRIBE", "UNSUBSCRIBE", "DELETE"] {
            let method: Method = text.parse().unwrap();
            assert_eq!(method.as_str(), text);
        }
    }

    #[test]
    fn test_unknown_method() {
        assert!("BREW".parse::<Method>().is_err());
        // Methods are case sensitive on the wire.
        assert!("get".parse::<Method>().is_err());
    }

    #[test]
    fn test_body_methods() {
        assert!(Method::Post.has_body());
        assert!(Method::Delete.has_body());
        assert!(!Method::Get.has_body());
        assert!(!Method::Subscribe.has_body());
    }
}
