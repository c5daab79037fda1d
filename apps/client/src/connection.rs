//! One pooled connection: a broker socket paired with a local-server socket
//!
//! A slot moves `Idle -> Dialing -> Active -> Closed`. A failed dial goes
//! back to `Idle`; a finished or failed exchange ends in `Closed`. Both
//! inactive states are re-dialed by the pool's health sweep. Each broker
//! connection carries exactly one exchange and is torn down afterwards.

use std::{
    future::Future,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use lt_tunnel_common::{BrokerEndpoint, HostRewriter, RequestInfo, Result, TunnelError};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader, ReadBuf},
    net::TcpStream,
    time::{Instant, Sleep, timeout},
};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{LocalTarget, PoolConfig},
    events::EventSender,
    tls,
};

/// Lifecycle of a pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Dialing,
    Active,
    Closed,
}

/// Everything a slot needs to dial and proxy, shared by all slots of a pool
pub(crate) struct ProxyContext {
    broker: BrokerEndpoint,
    local: LocalTarget,
    rewriter: HostRewriter,
    tls: Option<TlsConnector>,
    dial_timeout: Duration,
    idle_timeout: Duration,
    events: EventSender,
}

impl ProxyContext {
    pub fn new(
        broker: BrokerEndpoint,
        local: LocalTarget,
        config: &PoolConfig,
        events: EventSender,
    ) -> Self {
        let tls = local.use_tls.then(tls::insecure_connector);
        Self {
            rewriter: HostRewriter::new(local.address()),
            broker,
            local,
            tls,
            dial_timeout: config.dial_timeout,
            idle_timeout: config.idle_timeout,
            events,
        }
    }
}

struct SlotInner {
    state: SlotState,
    // Bumped on every dial and close so stale tasks cannot clobber newer state
    generation: u64,
    shutdown: Option<CancellationToken>,
}

/// One member of the connection pool
pub struct PooledConnection {
    id: usize,
    ctx: Arc<ProxyContext>,
    cancel: CancellationToken,
    inner: Mutex<SlotInner>,
}

impl PooledConnection {
    pub(crate) fn new(id: usize, ctx: Arc<ProxyContext>, cancel: CancellationToken) -> Self {
        Self {
            id,
            ctx,
            cancel,
            inner: Mutex::new(SlotInner {
                state: SlotState::Idle,
                generation: 0,
                shutdown: None,
            }),
        }
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SlotState::Active
    }

    /// Dial the broker and, on success, start the proxy task.
    ///
    /// No-op while the slot is active or already dialing, or once the pool
    /// is closed. Dial failures are reported as error events; the slot stays
    /// inactive for the next health sweep.
    pub async fn connect(self: Arc<Self>) {
        let generation = {
            let mut inner = self.inner.lock();
            if self.cancel.is_cancelled()
                || matches!(inner.state, SlotState::Dialing | SlotState::Active)
            {
                return;
            }
            inner.state = SlotState::Dialing;
            inner.generation += 1;
            inner.generation
        };

        let addr = self.ctx.broker.address();
        debug!(slot = self.id, "Dialing broker {}", addr);

        let dial = timeout(
            self.ctx.dial_timeout,
            TcpStream::connect((self.ctx.broker.host.as_str(), self.ctx.broker.port)),
        );
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.finish(generation, SlotState::Closed);
                return;
            }
            result = dial => result,
        };

        let broker = match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.dial_failed(generation, &addr, e.to_string()),
            Err(_) => return self.dial_failed(generation, &addr, "timed out".to_string()),
        };

        let shutdown = self.cancel.child_token();
        {
            let mut inner = self.inner.lock();
            if self.cancel.is_cancelled() || inner.generation != generation {
                debug!(slot = self.id, "Slot closed while dialing, dropping connection");
                return;
            }
            inner.state = SlotState::Active;
            inner.shutdown = Some(shutdown.clone());
        }

        debug!(slot = self.id, "Connected to broker {}", addr);
        tokio::spawn(self.run(broker, generation, shutdown));
    }

    /// Tear down the current exchange and release both sockets. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.shutdown.is_none() && inner.state != SlotState::Dialing {
            return;
        }

        inner.generation += 1;
        inner.state = SlotState::Closed;
        if let Some(shutdown) = inner.shutdown.take() {
            shutdown.cancel();
        }
    }

    async fn run(self: Arc<Self>, broker: TcpStream, generation: u64, shutdown: CancellationToken) {
        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(slot = self.id, "Exchange cancelled");
                Ok(())
            }
            result = proxy_exchange(&self.ctx, broker) => result,
        };

        match result {
            Ok(()) => debug!(slot = self.id, "Exchange finished"),
            Err(TunnelError::Timeout) => {
                info!(slot = self.id, "Broker connection idle, tearing down");
            }
            Err(e) => {
                warn!(slot = self.id, "Exchange failed: {}", e);
                self.ctx.events.error(e);
            }
        }

        self.finish(generation, SlotState::Closed);
    }

    fn dial_failed(&self, generation: u64, addr: &str, reason: String) {
        warn!(slot = self.id, "Failed to connect to {}: {}", addr, reason);
        self.finish(generation, SlotState::Idle);
        self.ctx.events.error(TunnelError::dial_failed(addr, reason));
    }

    fn finish(&self, generation: u64, state: SlotState) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.state = state;
            inner.shutdown = None;
        }
    }
}

/// Byte stream to the local server, plain or TLS
pub(crate) trait LocalStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LocalStream for T {}

async fn dial_local(ctx: &ProxyContext) -> Result<Box<dyn LocalStream>> {
    let addr = ctx.local.address();

    let stream = timeout(
        ctx.dial_timeout,
        TcpStream::connect((ctx.local.host.as_str(), ctx.local.port)),
    )
    .await
    .map_err(|_| TunnelError::dial_failed(&addr, "timed out"))?
    .map_err(|e| TunnelError::dial_failed(&addr, e))?;

    let Some(connector) = &ctx.tls else {
        return Ok(Box::new(stream));
    };

    let server_name = tls::server_name(&ctx.local.host)?;
    let stream = timeout(ctx.dial_timeout, connector.connect(server_name, stream))
        .await
        .map_err(|_| TunnelError::dial_failed(&addr, "TLS handshake timed out"))?
        .map_err(|e| TunnelError::dial_failed(&addr, format!("TLS handshake failed: {}", e)))?;

    Ok(Box::new(stream))
}

/// Proxy one exchange: Host-rewritten broker→local, verbatim local→broker.
/// Finishes as soon as either direction ends.
async fn proxy_exchange(ctx: &ProxyContext, broker: TcpStream) -> Result<()> {
    let local = dial_local(ctx).await?;

    let (broker_read, mut broker_write) = broker.into_split();
    let (mut local_read, mut local_write) = tokio::io::split(local);

    let inbound = async {
        let mut reader = BufReader::new(IdleTimeout::new(broker_read, ctx.idle_timeout));
        let request_line = ctx.rewriter.rewrite_head(&mut reader, &mut local_write).await?;

        if let Some(info) = RequestInfo::from_request_line(&request_line) {
            debug!("{} {}", info.method, info.path);
            ctx.events.request(info);
        }

        tokio::io::copy_buf(&mut reader, &mut local_write).await?;
        Ok::<(), TunnelError>(())
    };

    let outbound = async {
        tokio::io::copy(&mut local_read, &mut broker_write).await?;
        Ok::<(), TunnelError>(())
    };

    tokio::select! {
        result = inbound => result,
        result = outbound => result,
    }
}

/// Fails a read with `TimedOut` when the inner reader stays idle too long
pub(crate) struct IdleTimeout<R> {
    inner: R,
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl<R> IdleTimeout<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            sleep: Box::pin(tokio::time::sleep(timeout)),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for IdleTimeout<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                let deadline = Instant::now() + this.timeout;
                this.sleep.as_mut().reset(deadline);
                Poll::Ready(result)
            }
            Poll::Pending => match this.sleep.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "broker connection idle",
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
