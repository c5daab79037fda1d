use thiserror::Error;

/// Error types for the tunnel client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunnelError {
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Invalid tunnel endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to connect to {addr}: {reason}")]
    DialFailed { addr: String, reason: String },

    #[error("Proxy I/O error: {0}")]
    ProxyIo(String),

    #[error("Malformed stream: no request line before end of stream")]
    MalformedStream,

    #[error("Timed out waiting for data")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Tunnel session is closed")]
    SessionClosed,

    #[error("Tunnel session was already opened")]
    AlreadyOpened,
}

impl TunnelError {
    /// Build a dial failure for the given address
    pub fn dial_failed(addr: impl Into<String>, reason: impl ToString) -> Self {
        TunnelError::DialFailed {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors stop the session; everything else is isolated to one slot
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TunnelError::RegistrationFailed(_) | TunnelError::InvalidEndpoint(_)
        )
    }
}

impl From<std::io::Error> for TunnelError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TunnelError::Timeout,
            _ => TunnelError::ProxyIo(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TunnelError {
    fn from(err: serde_json::Error) -> Self {
        TunnelError::RegistrationFailed(format!("failed to decode response: {}", err))
    }
}

/// Type alias for Results using TunnelError
pub type Result<T> = std::result::Result<T, TunnelError>;
