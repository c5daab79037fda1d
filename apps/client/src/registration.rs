//! Registration handshake with the broker
//!
//! A single `GET <host>[/<subdomain>]?new=` that returns the tunnel metadata
//! as JSON: `{id, url, port, max_conn_count}`.

use lt_tunnel_common::{Result, TunnelDescriptor, TunnelError, validation::validate_broker_host};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::config::TunnelOptions;

/// Build the registration URL for the given options
pub fn registration_url(options: &TunnelOptions) -> Result<Url> {
    let mut url = validate_broker_host(&options.host)?;

    if let Some(subdomain) = &options.subdomain {
        let Ok(mut segments) = url.path_segments_mut() else {
            return Err(TunnelError::InvalidConfig(format!(
                "broker host cannot be a base: {}",
                options.host
            )));
        };
        segments.pop_if_empty().push(subdomain);
    }
    url.set_query(Some("new="));

    Ok(url)
}

/// Ask the broker for a new tunnel
pub async fn request_tunnel(options: &TunnelOptions) -> Result<TunnelDescriptor> {
    let url = registration_url(options)?;
    debug!("Requesting tunnel from {}", url);

    let client = Client::builder()
        .timeout(options.pool.registration_timeout)
        .build()
        .map_err(|e| TunnelError::RegistrationFailed(e.to_string()))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| TunnelError::RegistrationFailed(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(TunnelError::RegistrationFailed(format!(
            "server responded with status {}",
            status.as_u16()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| TunnelError::RegistrationFailed(format!("failed to read response: {}", e)))?;
    let descriptor: TunnelDescriptor = serde_json::from_slice(&body)?;

    info!(
        "Registered tunnel {} at {} (broker port {}, max connections {})",
        descriptor.id, descriptor.url, descriptor.port, descriptor.max_connections
    );

    Ok(descriptor)
}
