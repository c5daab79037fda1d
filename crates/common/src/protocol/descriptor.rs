use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, TunnelError};

/// Tunnel metadata returned by the broker's registration endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelDescriptor {
    /// Identifier assigned by the broker (usually the subdomain)
    pub id: String,

    /// Public URL that forwards into this tunnel
    /// Example: "https://abc123.localtunnel.me"
    pub url: String,

    /// Broker port that accepts the pooled data connections
    pub port: u16,

    /// Number of data connections the broker will accept.
    /// Zero or negative means the broker did not advertise a limit.
    #[serde(default, rename = "max_conn_count")]
    pub max_connections: i64,
}

/// Resolved address of the broker's data port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// `host:port` form used for dialing and in error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TunnelDescriptor {
    /// Create a descriptor with the given public URL and broker port
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        port: u16,
        max_connections: i64,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            port,
            max_connections,
        }
    }

    /// Number of pool slots to open, falling back to `default` when the
    /// advertised value is zero or negative
    pub fn pool_size(&self, default: usize) -> usize {
        if self.max_connections <= 0 {
            default
        } else {
            self.max_connections as usize
        }
    }

    /// Resolve the broker data endpoint: host of the public URL, port from the descriptor
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        let url = Url::parse(&self.url)
            .map_err(|e| TunnelError::InvalidEndpoint(format!("{}: {}", self.url, e)))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.trim_start_matches('[').trim_end_matches(']'),
            _ => {
                return Err(TunnelError::InvalidEndpoint(format!(
                    "could not determine host from URL: {}",
                    self.url
                )));
            }
        };

        if self.port == 0 {
            return Err(TunnelError::InvalidEndpoint(format!(
                "broker advertised port 0 for {}",
                self.url
            )));
        }

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: self.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserialization() {
        let json = r#"{
            "id": "abc123",
            "url": "https://abc123.localtunnel.me",
            "port": 12345,
            "max_conn_count": 5
        }"#;

        let descriptor: TunnelDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.id, "abc123");
        assert_eq!(descriptor.url, "https://abc123.localtunnel.me");
        assert_eq!(descriptor.port, 12345);
        assert_eq!(descriptor.max_connections, 5);
    }

    #[test]
    fn test_descriptor_missing_max_conn_count() {
        let json = r#"{"id": "x", "url": "https://x.localtunnel.me", "port": 1}"#;
        let descriptor: TunnelDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.max_connections, 0);
        assert_eq!(descriptor.pool_size(10), 10);
    }

    #[test]
    fn test_descriptor_missing_url_is_rejected() {
        let json = r#"{"id": "x", "port": 1}"#;
        assert!(serde_json::from_str::<TunnelDescriptor>(json).is_err());
    }

    #[test]
    fn test_pool_size() {
        let descriptor = TunnelDescriptor::new("id", "https://a.example.com", 1, 3);
        assert_eq!(descriptor.pool_size(10), 3);

        let descriptor = TunnelDescriptor::new("id", "https://a.example.com", 1, 0);
        assert_eq!(descriptor.pool_size(10), 10);

        let descriptor = TunnelDescriptor::new("id", "https://a.example.com", 1, -4);
        assert_eq!(descriptor.pool_size(10), 10);
    }

    #[test]
    fn test_endpoint_resolution() {
        let descriptor = TunnelDescriptor::new("id", "https://abc.localtunnel.me", 9999, 2);
        let endpoint = descriptor.endpoint().unwrap();
        assert_eq!(endpoint.host, "abc.localtunnel.me");
        assert_eq!(endpoint.port, 9999);
        assert_eq!(endpoint.address(), "abc.localtunnel.me:9999");

        // The port in the public URL is ignored in favour of the advertised one
        let descriptor = TunnelDescriptor::new("id", "http://127.0.0.1:8080/path", 4000, 2);
        assert_eq!(descriptor.endpoint().unwrap().address(), "127.0.0.1:4000");
    }

    #[test]
    fn test_endpoint_invalid_url() {
        let descriptor = TunnelDescriptor::new("id", "not a url", 9999, 2);
        assert!(matches!(
            descriptor.endpoint(),
            Err(TunnelError::InvalidEndpoint(_))
        ));

        let descriptor = TunnelDescriptor::new("id", "mailto:someone@example.com", 9999, 2);
        assert!(matches!(
            descriptor.endpoint(),
            Err(TunnelError::InvalidEndpoint(_))
        ));

        let descriptor = TunnelDescriptor::new("id", "https://abc.localtunnel.me", 0, 2);
        assert!(matches!(
            descriptor.endpoint(),
            Err(TunnelError::InvalidEndpoint(_))
        ));
    }
}
