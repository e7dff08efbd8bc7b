//! Configuration management
//!
//! Settings come from an optional config file in the platform config dir,
//! overridden by `RMC_*` environment variables (`RMC_GATEWAY_URL`,
//! `RMC_ADDRESSING`, `RMC_POLL__STATUS_INTERVAL_MS`, ...).

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::models::Device;

const DEFAULT_STATUS_INTERVAL_MS: u64 = 5_000;
const DEFAULT_PLAYERS_INTERVAL_MS: u64 = 30_000;
const DEFAULT_STATUS_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONTROL_REFRESH_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Gateway API base URL (auth, registry, and proxied device access).
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Port of the on-device API, used only with direct addressing.
    #[serde(default = "default_device_port")]
    pub device_port: u16,

    /// How per-device API bases are derived.
    #[serde(default)]
    pub addressing: DeviceAddressing,

    #[serde(default)]
    pub poll: PollConfig,
}

fn default_gateway_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_device_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            device_port: default_device_port(),
            addressing: DeviceAddressing::default(),
            poll: PollConfig::default(),
        }
    }
}

impl Config {
    /// API base for one device under the configured addressing strategy.
    ///
    /// Direct addressing needs the device's IP from the registry; a device
    /// without one is reported as an error rather than silently skipped.
    pub fn device_api_base(&self, device: &Device) -> Result<String, ClientError> {
        match self.addressing {
            DeviceAddressing::Gateway => Ok(format!("{}/api/{}", self.gateway_url, device.id)),
            DeviceAddressing::Direct => {
                let ip = device
                    .ip
                    .as_deref()
                    .filter(|ip| !ip.is_empty())
                    .ok_or(ClientError::Validation("ip"))?;
                Ok(format!("http://{}:{}", ip, self.device_port))
            }
        }
    }
}

/// Strategy for reaching a device's playback API.
///
/// The fleet has run both ways: proxied through the gateway, and straight
/// to each device over the tailnet. Neither is hard-coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAddressing {
    /// Route device calls through the gateway: `{gateway}/api/{device_id}`.
    #[default]
    Gateway,
    /// Talk to each device directly: `http://{ip}:{device_port}`.
    Direct,
}

/// Poll cadences and timeouts, all in milliseconds so tests can shrink them.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Period of the per-device status poll.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Period of the dashboard-level device-list refresh. Independent of
    /// the status cadence.
    #[serde(default = "default_players_interval_ms")]
    pub players_interval_ms: u64,

    /// Per-request timeout for device status fetches, so a hung device
    /// cannot stall the poll loop.
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    /// Delay before the post-command status refresh.
    #[serde(default = "default_control_refresh_delay_ms")]
    pub control_refresh_delay_ms: u64,
}

fn default_status_interval_ms() -> u64 {
    DEFAULT_STATUS_INTERVAL_MS
}

fn default_players_interval_ms() -> u64 {
    DEFAULT_PLAYERS_INTERVAL_MS
}

fn default_status_timeout_ms() -> u64 {
    DEFAULT_STATUS_TIMEOUT_MS
}

fn default_control_refresh_delay_ms() -> u64 {
    DEFAULT_CONTROL_REFRESH_DELAY_MS
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: DEFAULT_STATUS_INTERVAL_MS,
            players_interval_ms: DEFAULT_PLAYERS_INTERVAL_MS,
            status_timeout_ms: DEFAULT_STATUS_TIMEOUT_MS,
            control_refresh_delay_ms: DEFAULT_CONTROL_REFRESH_DELAY_MS,
        }
    }
}

impl PollConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn players_interval(&self) -> Duration {
        Duration::from_millis(self.players_interval_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn control_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.control_refresh_delay_ms)
    }
}

/// Platform config directory for this application.
pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "resort-music", "resort-music-control")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Path of a named file inside the config directory.
pub fn get_config_file_path(name: &str) -> PathBuf {
    get_config_dir().join(name)
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy())
                .required(false),
        )
        // Override with environment variables (RMC_GATEWAY_URL, RMC_POLL__STATUS_INTERVAL_MS, etc.)
        // The prefix joins with a single underscore; `__` separates nesting levels.
        .add_source(
            ::config::Environment::with_prefix("RMC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: Config = config.try_deserialize()?;

    url::Url::parse(&config.gateway_url)
        .map_err(|e| anyhow!("invalid gateway URL {:?}: {e}", config.gateway_url))?;
    // Normalize so endpoint composition never doubles a slash.
    config.gateway_url = config.gateway_url.trim_end_matches('/').to_string();

    // tokio::time::interval panics on a zero period.
    if config.poll.status_interval_ms == 0 {
        return Err(anyhow!("poll.status_interval_ms must be positive"));
    }
    if config.poll.players_interval_ms == 0 {
        return Err(anyhow!("poll.players_interval_ms must be positive"));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn device(id: &str, ip: Option<&str>) -> Device {
        Device {
            id: id.to_string(),
            name: format!("Player {id}"),
            ip: ip.map(str::to_string),
            location: None,
            status: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gateway_url, "http://localhost:3001");
        assert_eq!(config.addressing, DeviceAddressing::Gateway);
        assert_eq!(config.poll.status_interval(), Duration::from_secs(5));
        assert_eq!(config.poll.players_interval(), Duration::from_secs(30));
        assert_eq!(config.poll.status_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.poll.control_refresh_delay(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_gateway_addressing_routes_through_gateway() {
        let config = Config::default();
        let base = config.device_api_base(&device("pi1", None)).unwrap();
        assert_eq!(base, "http://localhost:3001/api/pi1");
    }

    #[test]
    fn test_direct_addressing_uses_device_ip_and_port() {
        let config = Config {
            addressing: DeviceAddressing::Direct,
            device_port: 8090,
            ..Default::default()
        };
        let base = config
            .device_api_base(&device("pi1", Some("100.104.127.38")))
            .unwrap();
        assert_eq!(base, "http://100.104.127.38:8090");
    }

    #[test]
    fn test_direct_addressing_without_ip_is_an_error() {
        let config = Config {
            addressing: DeviceAddressing::Direct,
            ..Default::default()
        };
        let err = config.device_api_base(&device("pi1", None)).unwrap_err();
        assert!(matches!(err, ClientError::Validation("ip")));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("RMC_GATEWAY_URL", "http://gw.internal:9000/");
        std::env::set_var("RMC_ADDRESSING", "direct");
        std::env::set_var("RMC_POLL__STATUS_INTERVAL_MS", "250");

        let config = load_config().unwrap();
        // Trailing slash is normalized away.
        assert_eq!(config.gateway_url, "http://gw.internal:9000");
        assert_eq!(config.addressing, DeviceAddressing::Direct);
        assert_eq!(config.poll.status_interval_ms, 250);
        assert_eq!(config.poll.players_interval_ms, DEFAULT_PLAYERS_INTERVAL_MS);

        std::env::remove_var("RMC_GATEWAY_URL");
        std::env::remove_var("RMC_ADDRESSING");
        std::env::remove_var("RMC_POLL__STATUS_INTERVAL_MS");
    }

    #[test]
    #[serial]
    fn test_invalid_gateway_url_is_rejected() {
        std::env::set_var("RMC_GATEWAY_URL", "not a url");
        let result = load_config();
        std::env::remove_var("RMC_GATEWAY_URL");
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_zero_poll_interval_is_rejected() {
        std::env::set_var("RMC_POLL__STATUS_INTERVAL_MS", "0");
        let result = load_config();
        std::env::remove_var("RMC_POLL__STATUS_INTERVAL_MS");
        assert!(result.is_err());

        std::env::set_var("RMC_POLL__PLAYERS_INTERVAL_MS", "0");
        let result = load_config();
        std::env::remove_var("RMC_POLL__PLAYERS_INTERVAL_MS");
        assert!(result.is_err());
    }
}
