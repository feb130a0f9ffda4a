use eyre::Result;
use pick_place_lib::{ArmCommand, ArmEndpointConfig};
use reqwest::blocking::Client;
use tracing::debug;

use super::{MotionError, MotionGateway, TransportError};

/// HTTP JSON client for the arm's `/js?json=...` endpoint.
pub struct RoArmClient {
    endpoint: String,
    client: Client,
}

impl RoArmClient {
    pub fn new(config: &ArmEndpointConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            // The arm sits on the local network
            .no_proxy()
            .build()
            .map_err(|e| eyre::eyre!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            endpoint: endpoint_url(&config.ip),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_url(ip: &str) -> String {
    let host = ip.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/js", host)
    } else {
        format!("http://{}/js", host)
    }
}

impl MotionGateway for RoArmClient {
    fn send(&self, command: &ArmCommand) -> Result<String, MotionError> {
        let payload = command.to_payload().to_string();
        debug!("-> {} {}", self.endpoint, payload);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("json", payload.as_str())])
            .send()
            .map_err(|e| MotionError::new(command, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MotionError::new(
                command,
                TransportError::Status(status.as_u16()),
            ));
        }

        let body = response.text().map_err(|e| MotionError::new(command, e))?;
        debug!("<- {}", body);
        Ok(body)
    }
}
