//! Tunnel session: registration, pool lifecycle and the caller-facing handle
//!
//! A session moves `Unopened -> Handshaking -> Pooling -> Closed`. A fatal
//! error (registration or endpoint resolution) is published once and closes
//! the session without ever reaching `Pooling`.

use std::sync::Arc;

use lt_tunnel_common::{Result, TunnelDescriptor, TunnelError};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    config::TunnelOptions,
    events::{self, EventSender, TunnelEvents},
    pool::ConnectionPool,
    registration,
};

/// Lifecycle of a tunnel session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Handshaking,
    Pooling,
    Closed,
}

/// What `url()` waits on
#[derive(Debug, Clone)]
enum UrlState {
    Pending,
    Ready(String),
    Failed(TunnelError),
}

struct SessionInner {
    state: SessionState,
    descriptor: Option<TunnelDescriptor>,
    pool: Option<Arc<ConnectionPool>>,
}

/// Handle to one tunnel
pub struct Tunnel {
    options: TunnelOptions,
    cancel: CancellationToken,
    events_tx: EventSender,
    events_rx: Mutex<Option<TunnelEvents>>,
    url_tx: watch::Sender<UrlState>,
    inner: Mutex<SessionInner>,
}

impl Tunnel {
    /// Create an unopened session
    pub fn new(options: TunnelOptions) -> Result<Self> {
        Self::with_cancellation(options, CancellationToken::new())
    }

    /// Create an unopened session whose lifetime is also bounded by `parent`
    pub fn with_cancellation(options: TunnelOptions, parent: CancellationToken) -> Result<Self> {
        options.validate()?;

        let cancel = parent.child_token();
        let (events_tx, events_rx) = events::channel(options.pool.event_capacity, cancel.clone());
        let (url_tx, _) = watch::channel(UrlState::Pending);

        Ok(Self {
            options,
            cancel,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            url_tx,
            inner: Mutex::new(SessionInner {
                state: SessionState::Unopened,
                descriptor: None,
                pool: None,
            }),
        })
    }

    /// Register with the broker and start the connection pool.
    ///
    /// On success the public URL is published to `url()` and the event
    /// stream. Registration and endpoint failures are fatal: they are
    /// published once, the session closes, and the error is returned.
    pub async fn open(&self) -> Result<()> {
        self.observe_cancellation();
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Unopened => inner.state = SessionState::Handshaking,
                SessionState::Closed => return Err(TunnelError::SessionClosed),
                SessionState::Handshaking | SessionState::Pooling => {
                    return Err(TunnelError::AlreadyOpened);
                }
            }
        }

        let registered = tokio::select! {
            _ = self.cancel.cancelled() => Err(TunnelError::Cancelled),
            result = registration::request_tunnel(&self.options) => result,
        };

        let descriptor = match registered {
            Ok(descriptor) => descriptor,
            Err(TunnelError::Cancelled) => {
                self.close();
                return Err(TunnelError::Cancelled);
            }
            Err(e) => return Err(self.fail(e)),
        };

        let pool = Arc::new(ConnectionPool::new(
            descriptor.clone(),
            self.options.local_target(),
            self.options.pool.clone(),
            self.events_tx.clone(),
            self.cancel.child_token(),
        ));

        let started = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return Err(TunnelError::SessionClosed);
            }

            let started = pool.start();
            if started.is_ok() {
                inner.state = SessionState::Pooling;
                inner.descriptor = Some(descriptor.clone());
                inner.pool = Some(pool);
            }
            started
        };
        if let Err(e) = started {
            return Err(self.fail(e));
        }

        info!("Tunnel ready at {}", descriptor.url);
        self.url_tx.send_replace(UrlState::Ready(descriptor.url.clone()));
        self.events_tx.url_ready(descriptor.url);

        Ok(())
    }

    /// Wait for the public URL.
    ///
    /// Resolves with the URL once published, with the fatal error if opening
    /// failed, or with [`TunnelError::Cancelled`] if the session is cancelled
    /// first.
    pub async fn url(&self) -> Result<String> {
        let mut rx = self.url_tx.subscribe();

        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                UrlState::Ready(url) => return Ok(url),
                UrlState::Failed(err) => return Err(err),
                UrlState::Pending => {}
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(TunnelError::SessionClosed);
                    }
                }
                _ = self.cancel.cancelled() => return Err(TunnelError::Cancelled),
            }
        }
    }

    /// Cancel every task, close the pool and publish `Closed`. Idempotent.
    pub fn close(&self) {
        let pool = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
            inner.pool.clone()
        };

        self.cancel.cancel();
        if let Some(pool) = pool {
            pool.close();
        }

        info!("Tunnel closed");
        self.events_tx.closed();
    }

    /// Take the event stream. Only the first call returns it.
    pub fn events(&self) -> Option<TunnelEvents> {
        self.events_rx.lock().take()
    }

    pub fn state(&self) -> SessionState {
        self.observe_cancellation();
        self.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Tunnel metadata, once registration succeeded
    pub fn descriptor(&self) -> Option<TunnelDescriptor> {
        self.inner.lock().descriptor.clone()
    }

    /// Number of pooled connections currently carrying a broker connection
    pub fn active_connections(&self) -> usize {
        self.observe_cancellation();
        let pool = self.inner.lock().pool.clone();
        pool.map_or(0, |pool| pool.active_count())
    }

    /// A cancelled token means the session is over, whoever cancelled it
    fn observe_cancellation(&self) {
        if self.cancel.is_cancelled() {
            self.close();
        }
    }

    fn fail(&self, err: TunnelError) -> TunnelError {
        error!("Tunnel failed: {}", err);
        self.url_tx.send_replace(UrlState::Failed(err.clone()));
        self.events_tx.error(err.clone());
        self.close();
        err
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        debug!("Dropping tunnel session");
        self.close();
    }
}
