//! Input validation for tunnel options
//!
//! Rejects option values the broker or the local dialer cannot use before
//! any network traffic happens.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::TunnelError;

/// Subdomain rule enforced by localtunnel-compatible brokers: 4-63 lowercase
/// alphanumerics, or 6-65 characters with hyphens allowed between
/// alphanumeric ends
static SUBDOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9][a-z0-9\-]{4,63}[a-z0-9]|[a-z0-9]{4,63})$").unwrap()
});

/// Maximum length for a local host name
pub const MAX_HOST_LENGTH: usize = 253;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "Invalid subdomain: {0} (use 4-63 lowercase letters or digits, or 6-65 characters with inner hyphens)"
    )]
    InvalidSubdomain(String),

    #[error("Invalid broker host: {0}")]
    InvalidBrokerHost(String),

    #[error("Invalid local host: {0}")]
    InvalidLocalHost(String),

    #[error("Port must be between 1 and 65535")]
    InvalidPort,
}

impl From<ValidationError> for TunnelError {
    fn from(err: ValidationError) -> Self {
        TunnelError::InvalidConfig(err.to_string())
    }
}

/// Validate a requested subdomain
///
/// # Examples
///
/// ```
/// use lt_tunnel_common::validation::validate_subdomain;
///
/// assert!(validate_subdomain("myapp").is_ok());
/// assert!(validate_subdomain("My_App").is_err());
/// assert!(validate_subdomain("abc").is_err()); // too short
/// ```
pub fn validate_subdomain(subdomain: &str) -> Result<(), ValidationError> {
    if !SUBDOMAIN_REGEX.is_match(subdomain) {
        return Err(ValidationError::InvalidSubdomain(
            subdomain.chars().take(70).collect::<String>(), // Limit error message
        ));
    }
    Ok(())
}

/// Validate the broker base URL (must be http or https with a host)
pub fn validate_broker_host(host: &str) -> Result<Url, ValidationError> {
    let url =
        Url::parse(host).map_err(|e| ValidationError::InvalidBrokerHost(format!("{host}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidBrokerHost(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::InvalidBrokerHost(format!(
            "missing host in {host}"
        )));
    }

    Ok(url)
}

/// Validate the local host name (a bare host or IP, no scheme or port)
pub fn validate_local_host(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() || host.len() > MAX_HOST_LENGTH {
        return Err(ValidationError::InvalidLocalHost(
            host.chars().take(50).collect::<String>(),
        ));
    }

    if host.contains("://") || host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ValidationError::InvalidLocalHost(
            host.chars().take(50).collect::<String>(),
        ));
    }

    Ok(())
}

/// Validate a local port
pub fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::InvalidPort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subdomain_valid() {
        assert!(validate_subdomain("myapp").is_ok());
        assert!(validate_subdomain("abcd").is_ok());
        assert!(validate_subdomain("my-cool-app").is_ok());
        assert!(validate_subdomain("0123456789").is_ok());
    }

    #[test]
    fn test_validate_subdomain_invalid() {
        assert!(validate_subdomain("abc").is_err()); // too short
        assert!(validate_subdomain("MyApp").is_err()); // uppercase
        assert!(validate_subdomain("-myapp").is_err()); // leading hyphen
        assert!(validate_subdomain("myapp-").is_err()); // trailing hyphen
        assert!(validate_subdomain("my_app").is_err()); // underscore
        assert!(validate_subdomain("a".repeat(70).as_str()).is_err()); // too long
        assert!(validate_subdomain("").is_err());
    }

    #[test]
    fn test_hyphenated_subdomain_length() {
        // Hyphenated names need four inner characters between the ends
        assert!(validate_subdomain("ab-cd").is_err());
        assert!(validate_subdomain("abc-de").is_ok());

        let longest = format!("a{}a", "-".repeat(63));
        assert_eq!(longest.len(), 65);
        assert!(validate_subdomain(&longest).is_ok());
        assert!(validate_subdomain(&format!("a{}a", "-".repeat(64))).is_err());
    }

    #[test]
    fn test_validate_broker_host() {
        assert!(validate_broker_host("https://localtunnel.me").is_ok());
        assert!(validate_broker_host("http://127.0.0.1:3000").is_ok());

        assert!(validate_broker_host("localtunnel.me").is_err()); // no scheme
        assert!(validate_broker_host("ftp://localtunnel.me").is_err());
        assert!(validate_broker_host("").is_err());
    }

    #[test]
    fn test_validate_local_host() {
        assert!(validate_local_host("localhost").is_ok());
        assert!(validate_local_host("127.0.0.1").is_ok());
        assert!(validate_local_host("::1").is_ok());

        assert!(validate_local_host("").is_err());
        assert!(validate_local_host("http://localhost").is_err());
        assert!(validate_local_host("local host").is_err());
        assert!(validate_local_host(&"a".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port(8080).is_ok());
        assert!(validate_port(65535).is_ok());
        assert!(matches!(validate_port(0), Err(ValidationError::InvalidPort)));
    }

    #[test]
    fn test_into_tunnel_error() {
        let err: TunnelError = ValidationError::InvalidPort.into();
        assert!(matches!(err, TunnelError::InvalidConfig(_)));
    }
}
