//! localtunnel client library
//!
//! Registers with a localtunnel broker, keeps a pool of TCP connections open
//! to it and relays every HTTP exchange the broker pushes down those
//! connections to a local server, rewriting the `Host` header on the way.
//!
//! ```no_run
//! use lt_tunnel::{TunnelOptions, connect_and_open};
//!
//! # async fn run() -> lt_tunnel::Result<()> {
//! let tunnel = connect_and_open(TunnelOptions::new(3000)).await?;
//! println!("your url is: {}", tunnel.url().await?);
//! tunnel.close();
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod connection;
pub mod events;
pub mod pool;
pub mod registration;
pub mod session;
mod tls;

#[cfg(test)]
mod test_support;

pub use config::{LocalTarget, PoolConfig, TunnelOptions};
pub use events::TunnelEvents;
pub use lt_tunnel_common::{RequestInfo, Result, TunnelDescriptor, TunnelError, TunnelEvent};
pub use session::{SessionState, Tunnel};

/// Create an unopened tunnel session
pub fn connect(options: TunnelOptions) -> Result<Tunnel> {
    Tunnel::new(options)
}

/// Create a tunnel session and open it
pub async fn connect_and_open(options: TunnelOptions) -> Result<Tunnel> {
    let tunnel = Tunnel::new(options)?;
    tunnel.open().await?;
    Ok(tunnel)
}
