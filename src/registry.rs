//! Device registry client
//!
//! Lists the fleet from the gateway and carries the two admin operations:
//! registering a device by hand and kicking off network discovery. Whether
//! the caller is allowed to use the admin operations is checked upstream;
//! the gateway enforces it for real.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ClientError;
use crate::models::Device;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Registration details for a device added by hand.
#[derive(Debug, Clone, Serialize)]
pub struct NewDevice {
    pub ip: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayersResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    players: Vec<Device>,
}

/// Client for the gateway's device registry endpoints.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    gateway_url: String,
}

impl RegistryClient {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {e}, using default");
                reqwest::Client::new()
            });
        Self {
            client,
            gateway_url: gateway_url.into(),
        }
    }

    /// Fetch the registered device list.
    pub async fn list_players(&self) -> Result<Vec<Device>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/players", self.gateway_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Backend(format!(
                "player list returned {}",
                response.status()
            )));
        }
        let body: PlayersResponse = response.json().await?;
        if !body.success {
            return Err(ClientError::Backend(
                "gateway reported failure listing players".to_string(),
            ));
        }
        Ok(body.players)
    }

    /// Register a device by IP and name.
    pub async fn add_device(&self, device: &NewDevice) -> Result<(), ClientError> {
        if device.ip.trim().is_empty() {
            return Err(ClientError::Validation("ip"));
        }
        if device.name.trim().is_empty() {
            return Err(ClientError::Validation("name"));
        }

        let response = self
            .client
            .post(format!("{}/api/admin/pis", self.gateway_url))
            .json(device)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Backend(format!(
                "device registration returned {}",
                response.status()
            )));
        }
        info!("Registered device {} at {}", device.name, device.ip);
        Ok(())
    }

    /// Ask the gateway to scan the network for unregistered devices.
    pub async fn discover(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/api/admin/discover", self.gateway_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Backend(format!(
                "discovery returned {}",
                response.status()
            )));
        }
        info!("Device discovery triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_wire_shape_omits_empty_optionals() {
        let device = NewDevice {
            ip: "10.0.0.12".to_string(),
            name: "Pool Bar".to_string(),
            location: Some("poolside".to_string()),
            description: None,
        };
        assert_eq!(
            serde_json::to_string(&device).unwrap(),
            r#"{"ip":"10.0.0.12","name":"Pool Bar","location":"poolside"}"#
        );
    }

    #[tokio::test]
    async fn test_add_device_rejects_blank_fields_before_any_network() {
        let registry = RegistryClient::new("http://localhost:9");

        let missing_ip = NewDevice {
            ip: "  ".to_string(),
            name: "Lobby".to_string(),
            location: None,
            description: None,
        };
        let err = registry.add_device(&missing_ip).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation("ip")));

        let missing_name = NewDevice {
            ip: "10.0.0.5".to_string(),
            name: "".to_string(),
            location: None,
            description: None,
        };
        let err = registry.add_device(&missing_name).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation("name")));
    }
}
