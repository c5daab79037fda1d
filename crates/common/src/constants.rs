/// Broker used when no host is configured
pub const DEFAULT_BROKER_HOST: &str = "https://localtunnel.me";

/// Local server host used when none is configured
pub const DEFAULT_LOCAL_HOST: &str = "localhost";

/// Pool size used when the broker advertises no usable connection count
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Timeout for dialing the broker or the local server (10 seconds)
pub const DIAL_TIMEOUT_SECS: u64 = 10;

/// Idle bound on broker socket reads during an exchange (60 seconds)
pub const IDLE_TIMEOUT_SECS: u64 = 60;

/// Interval between health sweeps of the connection pool (30 seconds)
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Timeout for the registration request (10 seconds)
pub const REGISTRATION_TIMEOUT_SECS: u64 = 10;

/// Capacity of the session event channel; events beyond it are dropped
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Longest request or header line accepted by the Host rewriter (64 KiB)
pub const MAX_HEADER_LINE_BYTES: usize = 64 * 1024;
