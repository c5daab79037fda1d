mod descriptor;
mod event;
mod request;

pub use descriptor::{BrokerEndpoint, TunnelDescriptor};
pub use event::TunnelEvent;
pub use request::RequestInfo;
