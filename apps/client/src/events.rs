//! Session event channel
//!
//! One bounded channel carries every event kind. Producers never block: when
//! the consumer falls behind, new events are dropped and logged instead of
//! stalling a proxy loop.

use lt_tunnel_common::{RequestInfo, TunnelError, TunnelEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Producer half, cloned into the pool and every pooled connection
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<TunnelEvent>,
}

impl EventSender {
    pub fn error(&self, err: TunnelError) {
        self.emit(TunnelEvent::Error(err));
    }

    pub fn request(&self, info: RequestInfo) {
        self.emit(TunnelEvent::IncomingRequest(info));
    }

    pub fn url_ready(&self, url: impl Into<String>) {
        self.emit(TunnelEvent::UrlReady(url.into()));
    }

    pub fn closed(&self) {
        self.emit(TunnelEvent::Closed);
    }

    fn emit(&self, event: TunnelEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver gone");
            }
        }
    }
}

/// Consumer half of a session's events.
///
/// `recv` yields events until [`TunnelEvent::Closed`], then `None`. If the
/// session is cancelled and the `Closed` event itself was dropped, a
/// synthetic `Closed` is still delivered once the queue is drained.
#[derive(Debug)]
pub struct TunnelEvents {
    rx: mpsc::Receiver<TunnelEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl TunnelEvents {
    pub async fn recv(&mut self) -> Option<TunnelEvent> {
        if self.finished {
            return None;
        }

        let event = tokio::select! {
            biased;
            event = self.rx.recv() => event,
            _ = self.cancel.cancelled() => self.rx.try_recv().ok(),
        };

        let event = event.unwrap_or(TunnelEvent::Closed);
        if event.is_closed() {
            self.finished = true;
        }
        Some(event)
    }
}

/// Create a bounded event channel tied to the session's cancellation token
pub fn channel(capacity: usize, cancel: CancellationToken) -> (EventSender, TunnelEvents) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender { tx },
        TunnelEvents {
            rx,
            cancel,
            finished: false,
        },
    )
}
