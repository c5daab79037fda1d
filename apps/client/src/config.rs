use std::time::Duration;

use lt_tunnel_common::{
    Result,
    constants::{
        DEFAULT_BROKER_HOST, DEFAULT_LOCAL_HOST, DEFAULT_MAX_CONNECTIONS, DIAL_TIMEOUT_SECS,
        EVENT_CHANNEL_CAPACITY, HEALTH_CHECK_INTERVAL_SECS, IDLE_TIMEOUT_SECS,
        REGISTRATION_TIMEOUT_SECS,
    },
    validation::{validate_broker_host, validate_local_host, validate_port, validate_subdomain},
};

/// Options for one tunnel session
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    /// Broker base URL (e.g., "https://localtunnel.me")
    pub host: String,

    /// Requested subdomain; the broker picks one when `None`
    pub subdomain: Option<String>,

    /// Host of the local server
    pub local_host: String,

    /// Port of the local server
    pub local_port: u16,

    /// Connect to the local server over TLS (certificate not verified)
    pub local_https: bool,

    /// Timeouts and pool sizing
    pub pool: PoolConfig,
}

/// Timeouts and sizing for the connection pool.
///
/// Built once per session; the defaults mirror what localtunnel brokers expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Bound on dialing the broker or the local server (10s)
    pub dial_timeout: Duration,

    /// Bound on a broker socket read staying idle during an exchange (60s)
    pub idle_timeout: Duration,

    /// Interval of the health sweep that re-dials dead slots (30s)
    pub health_check_interval: Duration,

    /// Pool size when the broker advertises none (10)
    pub default_max_connections: usize,

    /// Timeout of the registration request (10s)
    pub registration_timeout: Duration,

    /// Capacity of the event channel (128)
    pub event_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
            health_check_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS),
            default_max_connections: DEFAULT_MAX_CONNECTIONS,
            registration_timeout: Duration::from_secs(REGISTRATION_TIMEOUT_SECS),
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// The local server every pooled connection forwards to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl LocalTarget {
    /// `host:port`, also used as the rewritten `Host` header value
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl TunnelOptions {
    /// Options for forwarding to `localhost:<local_port>` through the default broker
    pub fn new(local_port: u16) -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            subdomain: None,
            local_host: DEFAULT_LOCAL_HOST.to_string(),
            local_port,
            local_https: false,
            pool: PoolConfig::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_local_host(mut self, local_host: impl Into<String>) -> Self {
        self.local_host = local_host.into();
        self
    }

    pub fn with_local_https(mut self, local_https: bool) -> Self {
        self.local_https = local_https;
        self
    }

    /// Check every option before any network traffic
    pub fn validate(&self) -> Result<()> {
        validate_port(self.local_port)?;
        validate_broker_host(&self.host)?;
        validate_local_host(&self.local_host)?;
        if let Some(subdomain) = &self.subdomain {
            validate_subdomain(subdomain)?;
        }
        Ok(())
    }

    pub fn local_target(&self) -> LocalTarget {
        LocalTarget {
            host: self.local_host.clone(),
            port: self.local_port,
            use_tls: self.local_https,
        }
    }
}
