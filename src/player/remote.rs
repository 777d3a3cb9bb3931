//! Player network remote: one HTTP GET per key press
//!
//! `GET http://<host>/pub/remote_control?code=<access code>&key=<key>`
//! Any 2xx is success. The endpoint has no idempotence: sending `power`
//! twice toggles twice.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::player::DeviceEndpoint;

/// Default bound on a remote-control request
pub const REMOTE_TIMEOUT: Duration = Duration::from_millis(500);

const REMOTE_CONTROL_PATH: &str = "/pub/remote_control";

/// Outbound key seam, so the controller can be driven without a network
#[async_trait]
pub trait KeySender: Send + Sync {
    /// Send one Player key. `Ok` only when the Player acknowledged it.
    async fn send_key(&self, key: &str) -> Result<()>;
}

/// Build the remote-control URL for `key`
pub fn remote_control_url(endpoint: &DeviceEndpoint, key: &str) -> String {
    let authority = if endpoint.control_port == 80 {
        endpoint.hostname.clone()
    } else {
        format!("{}:{}", endpoint.hostname, endpoint.control_port)
    };
    format!(
        "http://{}{}?code={}&key={}",
        authority,
        REMOTE_CONTROL_PATH,
        urlencoding::encode(&endpoint.access_code),
        urlencoding::encode(key)
    )
}

/// KeySender talking to the Player over HTTP
#[derive(Clone)]
pub struct HttpRemote {
    endpoint: DeviceEndpoint,
    client: Client,
}

impl HttpRemote {
    pub fn new(endpoint: DeviceEndpoint, timeout: Duration) -> Result<Self> {
        // The Player is always on the local network
        let client = Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| PlayerError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl KeySender for HttpRemote {
    async fn send_key(&self, key: &str) -> Result<()> {
        let url = remote_control_url(&self.endpoint, key);

        let response = self.client.get(&url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            PlayerError::Connectivity {
                operation: "remote command",
                target: self.endpoint.hostname.clone(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::Protocol {
                operation: "remote command",
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(
            host = %self.endpoint.hostname,
            key,
            status = status.as_u16(),
            "Remote command sent"
        );
        Ok(())
    }
}
