use http::Method;
use serde::{Deserialize, Serialize};

/// Summary of a proxied request, parsed from its request line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: String,

    /// Request target including query string
    /// Example: "/api/v1/users?limit=10"
    pub path: String,
}

impl RequestInfo {
    /// Create a new request summary
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Parse `METHOD PATH VERSION`. Returns `None` for lines with fewer
    /// than three fields or an unparsable method.
    pub fn from_request_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let method = parts.next()?;
        let path = parts.next()?;
        parts.next()?;

        let method = Method::from_bytes(method.as_bytes()).ok()?;
        Some(Self::new(method.as_str(), path))
    }
}
