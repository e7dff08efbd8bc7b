//! Per-device playback client and status poller
//!
//! Each device in the fleet gets a [`PlayerHandle`]: an HTTP client bound to
//! the device's API base, a background poll loop feeding a shared status
//! snapshot, and a dispatch path for playback commands. Handles are one-shot;
//! when a device leaves the registry its handle is stopped and dropped, and a
//! returning device gets a fresh one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::config::PollConfig;
use crate::error::ClientError;
use crate::models::{PlayerStatus, Role};

/// Playback command addressed to one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerAction {
    Play,
    Pause,
    Skip,
    /// Set volume to a fraction in [0.0, 1.0]; out-of-range values clamp.
    Volume(f64),
}

impl PlayerAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Skip => "skip",
            Self::Volume(_) => "volume",
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlRequest {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: Option<PlayerStatus>,
}

/// HTTP client for one device's playback API.
#[derive(Debug, Clone)]
pub struct PlayerClient {
    client: reqwest::Client,
    device_id: String,
    api_base: String,
}

impl PlayerClient {
    pub fn new(
        device_id: impl Into<String>,
        api_base: impl Into<String>,
        status_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(status_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {e}, using default");
                reqwest::Client::new()
            });
        Self {
            client,
            device_id: device_id.into(),
            api_base: api_base.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn fetch_status(&self) -> Result<PlayerStatus, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/status", self.api_base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Backend(format!(
                "status fetch returned {}",
                response.status()
            )));
        }
        let body: StatusResponse = response.json().await?;
        if !body.success {
            return Err(ClientError::Backend("device reported failure".to_string()));
        }
        body.status
            .ok_or_else(|| ClientError::Backend("status response missing payload".to_string()))
    }

    pub async fn send_command(&self, action: &PlayerAction) -> Result<(), ClientError> {
        let request = match action {
            PlayerAction::Volume(v) => ControlRequest {
                action: action.name(),
                volume: Some(v.clamp(0.0, 1.0)),
            },
            _ => ControlRequest {
                action: action.name(),
                volume: None,
            },
        };
        // The control endpoint's contract is the HTTP status alone; the
        // authoritative state comes from the follow-up poll.
        let response = self
            .client
            .post(format!("{}/api/control", self.api_base))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Backend(format!(
                "control returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    status: Option<PlayerStatus>,
    last_error: Option<String>,
    /// Bumped whenever a fetch starts; a response is applied only if no
    /// newer fetch started while it was in flight.
    generation: u64,
    running: bool,
}

/// One device's poller, snapshot, and command path.
#[derive(Debug)]
pub struct PlayerHandle {
    device_id: String,
    client: PlayerClient,
    state: Arc<RwLock<PlayerState>>,
    bus: SharedBus,
    poll: PollConfig,
    shutdown: CancellationToken,
}

impl PlayerHandle {
    pub fn new(
        client: PlayerClient,
        poll: PollConfig,
        bus: SharedBus,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            device_id: client.device_id().to_string(),
            client,
            state: Arc::new(RwLock::new(PlayerState::default())),
            bus,
            poll,
            shutdown: parent.child_token(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Start the background status poll. Polls immediately, then on the
    /// configured interval. Calling twice is a no-op.
    pub async fn start(&self) {
        {
            let mut state = self.state.write().await;
            if state.running {
                debug!(device = %self.device_id, "Status poller already running");
                return;
            }
            state.running = true;
        }

        info!(device = %self.device_id, "Starting status poller");

        let client = self.client.clone();
        let state = self.state.clone();
        let bus = self.bus.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.poll.status_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!(device = %client.device_id(), "Status poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        poll_once(&client, &state, &bus).await;
                    }
                }
            }
        });
    }

    /// Fetch the status now, outside the regular cadence.
    pub async fn refresh(&self) {
        poll_once(&self.client, &self.state, &self.bus).await;
    }

    /// Send a playback command, then re-poll after a short delay so the
    /// snapshot converges on the device's actual state.
    ///
    /// The role gate is a UX convenience; the backend still authorizes
    /// every command on its side. The re-poll runs even when the command
    /// fails, since the device may have partially applied it.
    pub async fn dispatch(&self, role: Role, action: PlayerAction) -> Result<(), ClientError> {
        if !role.can_control() {
            return Err(ClientError::Auth(
                "viewer role cannot control playback".to_string(),
            ));
        }

        debug!(device = %self.device_id, action = action.name(), "Dispatching command");
        let send_result = self.client.send_command(&action).await;
        if let Err(e) = &send_result {
            warn!(device = %self.device_id, action = action.name(), "Command failed: {e}");
        }

        let client = self.client.clone();
        let state = self.state.clone();
        let bus = self.bus.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.poll.control_refresh_delay();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    poll_once(&client, &state, &bus).await;
                }
            }
        });

        send_result
    }

    /// Stop the poll loop and any pending post-command refresh.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub async fn status(&self) -> Option<PlayerStatus> {
        self.state.read().await.status.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Online means the last poll succeeded. A device that has not answered
    /// its first poll yet counts as offline.
    pub async fn is_online(&self) -> bool {
        let state = self.state.read().await;
        state.last_error.is_none() && state.status.is_some()
    }
}

/// One poll cycle: fetch, then apply unless a newer fetch started meanwhile.
///
/// On failure the previous snapshot is kept so the dashboard can keep
/// showing the last known track alongside the error.
async fn poll_once(client: &PlayerClient, state: &Arc<RwLock<PlayerState>>, bus: &SharedBus) {
    let generation = {
        let mut state = state.write().await;
        state.generation += 1;
        state.generation
    };

    let result = client.fetch_status().await;

    let mut state = state.write().await;
    if state.generation != generation {
        debug!(device = %client.device_id(), "Discarding stale poll result");
        return;
    }

    let event = match result {
        Ok(status) => {
            let changed = state.status.as_ref() != Some(&status) || state.last_error.is_some();
            state.status = Some(status.clone());
            state.last_error = None;
            if changed {
                Some(BusEvent::PlayerStatusChanged {
                    device_id: client.device_id().to_string(),
                    status,
                })
            } else {
                None
            }
        }
        Err(e) => {
            let error = e.to_string();
            warn!(device = %client.device_id(), "Status poll failed: {error}");
            let event = if state.last_error.as_deref() != Some(error.as_str()) {
                Some(BusEvent::PlayerUnreachable {
                    device_id: client.device_id().to_string(),
                    error: error.clone(),
                })
            } else {
                None
            };
            state.last_error = Some(error);
            event
        }
    };
    // Subscribers read back through the same lock; release it first.
    drop(state);

    if let Some(event) = event {
        bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(PlayerAction::Play.name(), "play");
        assert_eq!(PlayerAction::Pause.name(), "pause");
        assert_eq!(PlayerAction::Skip.name(), "skip");
        assert_eq!(PlayerAction::Volume(0.3).name(), "volume");
    }

    #[test]
    fn test_control_request_wire_shape() {
        let with_volume = ControlRequest {
            action: "volume",
            volume: Some(0.55),
        };
        assert_eq!(
            serde_json::to_string(&with_volume).unwrap(),
            r#"{"action":"volume","volume":0.55}"#
        );

        let bare = ControlRequest {
            action: "play",
            volume: None,
        };
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#"{"action":"play"}"#);
    }

    #[tokio::test]
    async fn test_viewer_dispatch_is_blocked_before_any_network() {
        // Closed port: reaching the network would fail loudly, proving the
        // role gate short-circuits first.
        let client = PlayerClient::new("pi1", "http://localhost:9", Duration::from_millis(200));
        let handle = PlayerHandle::new(
            client,
            PollConfig::default(),
            create_bus(),
            &CancellationToken::new(),
        );

        let err = handle
            .dispatch(Role::Viewer, PlayerAction::Play)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
        assert_eq!(handle.status().await, None);
    }

    #[tokio::test]
    async fn test_handle_starts_offline() {
        let client = PlayerClient::new("pi1", "http://localhost:9", Duration::from_millis(200));
        let handle = PlayerHandle::new(
            client,
            PollConfig::default(),
            create_bus(),
            &CancellationToken::new(),
        );
        assert!(!handle.is_online().await);
        assert_eq!(handle.last_error().await, None);
    }
}
