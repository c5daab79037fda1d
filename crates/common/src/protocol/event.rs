use super::RequestInfo;
use crate::TunnelError;

/// Events published by a tunnel session on its single event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
    /// The broker assigned this public URL
    UrlReady(String),

    /// A fatal or per-connection error
    Error(TunnelError),

    /// A request started flowing through one of the pooled connections.
    /// Informational only.
    IncomingRequest(RequestInfo),

    /// The session was closed; no further events follow
    Closed,
}

impl TunnelEvent {
    pub fn is_closed(&self) -> bool {
        matches!(self, TunnelEvent::Closed)
    }
}
