//! Fleet dashboard core
//!
//! Owns the device list and one [`PlayerHandle`] per registered device.
//! A background loop re-reads the registry on a slow cadence, starting
//! pollers for newcomers and stopping them for devices that left. All
//! fleet-level reads (device list, online counts) are served from here.
//!
//! The dashboard is one-shot: after [`Dashboard::shutdown`] a new instance
//! must be constructed to come back up.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::config::Config;
use crate::error::ClientError;
use crate::models::{Device, Role};
use crate::player::{PlayerClient, PlayerHandle};
use crate::registry::{NewDevice, RegistryClient};

/// Fleet totals derived from live poll results, never from the registry's
/// own status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

#[derive(Debug, Default)]
struct DashboardState {
    devices: Vec<Device>,
    handles: HashMap<String, Arc<PlayerHandle>>,
    running: bool,
}

/// Supervises the fleet: registry refresh, per-device pollers, admin
/// operations, and aggregate counts.
#[derive(Debug)]
pub struct Dashboard {
    registry: RegistryClient,
    config: Config,
    state: Arc<RwLock<DashboardState>>,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl Dashboard {
    pub fn new(config: Config, bus: SharedBus) -> Self {
        Self {
            registry: RegistryClient::new(config.gateway_url.clone()),
            config,
            state: Arc::new(RwLock::new(DashboardState::default())),
            bus,
            shutdown: CancellationToken::new(),
        }
    }

    /// Load the fleet and start the periodic registry refresh.
    ///
    /// Fails if the initial device list cannot be fetched; in that case
    /// nothing is left running and `start` may be retried.
    pub async fn start(&self) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            if state.running {
                debug!("Dashboard already running");
                return Ok(());
            }
            state.running = true;
        }

        info!("Starting dashboard");

        if let Err(e) = refresh_players(
            &self.registry,
            &self.config,
            &self.state,
            &self.bus,
            &self.shutdown,
        )
        .await
        {
            self.state.write().await.running = false;
            return Err(e);
        }

        let registry = self.registry.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        let bus = self.bus.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.config.poll.players_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The initial load just happened; skip the immediate first tick.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!("Registry refresh loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) =
                            refresh_players(&registry, &config, &state, &bus, &shutdown).await
                        {
                            warn!("Registry refresh failed: {e}");
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Re-read the registry now, outside the regular cadence.
    pub async fn refresh_players(&self) -> Result<(), ClientError> {
        refresh_players(
            &self.registry,
            &self.config,
            &self.state,
            &self.bus,
            &self.shutdown,
        )
        .await
    }

    /// Poll every device's status now. Used for an explicit refresh button
    /// rather than waiting out the poll interval.
    pub async fn refresh_all_statuses(&self) {
        let handles: Vec<Arc<PlayerHandle>> =
            self.state.read().await.handles.values().cloned().collect();
        futures::future::join_all(handles.iter().map(|handle| handle.refresh())).await;
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.state.read().await.devices.clone()
    }

    pub async fn player(&self, device_id: &str) -> Option<Arc<PlayerHandle>> {
        self.state.read().await.handles.get(device_id).cloned()
    }

    pub async fn counts(&self) -> FleetCounts {
        let state = self.state.read().await;
        let mut online = 0;
        for handle in state.handles.values() {
            if handle.is_online().await {
                online += 1;
            }
        }
        let total = state.devices.len();
        FleetCounts {
            total,
            online,
            offline: total.saturating_sub(online),
        }
    }

    /// Register a device by hand, then refresh the fleet so its poller
    /// starts right away.
    pub async fn add_device(&self, role: Role, device: &NewDevice) -> Result<(), ClientError> {
        if !role.can_admin() {
            return Err(ClientError::Auth(
                "admin role required to register devices".to_string(),
            ));
        }
        self.registry.add_device(device).await?;
        self.refresh_players().await
    }

    /// Trigger gateway-side discovery, then refresh to pick up anything
    /// it found.
    pub async fn discover(&self, role: Role) -> Result<(), ClientError> {
        if !role.can_admin() {
            return Err(ClientError::Auth(
                "admin role required to run discovery".to_string(),
            ));
        }
        self.registry.discover().await?;
        self.refresh_players().await
    }

    /// Stop the refresh loop and every device poller.
    pub async fn shutdown(&self) {
        info!("Shutting down dashboard");
        self.shutdown.cancel();
        let mut state = self.state.write().await;
        state.handles.clear();
        state.running = false;
    }
}

/// Reconcile pollers against the registry's current device list.
async fn refresh_players(
    registry: &RegistryClient,
    config: &Config,
    state: &Arc<RwLock<DashboardState>>,
    bus: &SharedBus,
    shutdown: &CancellationToken,
) -> Result<(), ClientError> {
    let devices = registry.list_players().await?;

    let mut state = state.write().await;

    let current_ids: HashSet<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    state.handles.retain(|id, handle| {
        if current_ids.contains(id.as_str()) {
            true
        } else {
            debug!(device = %id, "Device left registry, stopping poller");
            handle.stop();
            false
        }
    });

    for device in &devices {
        if state.handles.contains_key(&device.id) {
            continue;
        }
        let api_base = match config.device_api_base(device) {
            Ok(base) => base,
            Err(e) => {
                warn!(device = %device.id, "Skipping device without usable address: {e}");
                continue;
            }
        };
        let client = PlayerClient::new(device.id.clone(), api_base, config.poll.status_timeout());
        let handle = Arc::new(PlayerHandle::new(
            client,
            config.poll.clone(),
            bus.clone(),
            shutdown,
        ));
        handle.start().await;
        state.handles.insert(device.id.clone(), handle);
    }

    info!("Registry refresh: {} devices", devices.len());
    state.devices = devices.clone();
    drop(state);

    bus.publish(BusEvent::PlayersRefreshed { devices });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;

    fn dashboard_at_closed_port() -> Dashboard {
        let config = Config {
            gateway_url: "http://localhost:9".to_string(),
            ..Default::default()
        };
        Dashboard::new(config, create_bus())
    }

    #[tokio::test]
    async fn test_admin_operations_blocked_for_non_admins_before_any_network() {
        let dashboard = dashboard_at_closed_port();
        let device = NewDevice {
            ip: "10.0.0.5".to_string(),
            name: "Lobby".to_string(),
            location: None,
            description: None,
        };

        for role in [Role::Operator, Role::Viewer] {
            let err = dashboard.add_device(role, &device).await.unwrap_err();
            assert!(matches!(err, ClientError::Auth(_)));
            let err = dashboard.discover(role).await.unwrap_err();
            assert!(matches!(err, ClientError::Auth(_)));
        }
    }

    #[tokio::test]
    async fn test_counts_on_empty_fleet() {
        let dashboard = dashboard_at_closed_port();
        assert_eq!(
            dashboard.counts().await,
            FleetCounts {
                total: 0,
                online: 0,
                offline: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_start_can_be_retried() {
        let dashboard = dashboard_at_closed_port();
        // Gateway is unreachable, so the initial load fails both times;
        // what matters is that the second attempt actually runs instead of
        // hitting the already-running guard.
        assert!(dashboard.start().await.is_err());
        assert!(dashboard.start().await.is_err());
    }
}
