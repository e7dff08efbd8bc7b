//! Resort Music Control - headless dashboard agent
//!
//! Restores (or establishes) a gateway session, brings up the fleet
//! dashboard, and logs bus events until interrupted. Useful on its own for
//! watching a fleet from a terminal, and as the reference wiring for
//! embedding the library under a real view layer.

use anyhow::{bail, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resort_music_control::auth::AuthClient;
use resort_music_control::bus::{create_bus, BusEvent};
use resort_music_control::config;
use resort_music_control::dashboard::Dashboard;
use resort_music_control::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resort_music_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Resort Music Control");

    let config = config::load_config()?;
    tracing::info!(?config, "Configuration loaded");

    let bus = create_bus();
    let auth = AuthClient::new(config.gateway_url.clone(), SessionStore::new(), bus.clone());

    // Prefer a saved session; fall back to credentials from the environment.
    let user = match auth.validate_session().await {
        Some(user) => user,
        None => {
            let email = std::env::var("RMC_EMAIL").unwrap_or_default();
            let password = std::env::var("RMC_PASSWORD").unwrap_or_default();
            if email.is_empty() || password.is_empty() {
                bail!("no valid session; set RMC_EMAIL and RMC_PASSWORD to log in");
            }
            if !auth.login(&email, &password).await? {
                bail!("login rejected for {email}");
            }
            match auth.current_user().await {
                Some(user) => user,
                None => bail!("login succeeded but no user is set"),
            }
        }
    };
    tracing::info!("Session active for {} ({})", user.email, user.role);

    let dashboard = Dashboard::new(config, bus.clone());
    dashboard.start().await?;

    let counts = dashboard.counts().await;
    tracing::info!(
        "Fleet loaded: {} devices ({} online, {} offline)",
        counts.total,
        counts.online,
        counts.offline
    );

    let mut events = bus.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(BusEvent::SessionEnded) => {
                        tracing::info!("Session ended, stopping fleet supervision");
                        break;
                    }
                    Ok(event) => log_event(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Event log fell behind, skipped {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // The session is left in place so the next run restores it.
    dashboard.shutdown().await;
    Ok(())
}

fn log_event(event: &BusEvent) {
    match event {
        BusEvent::PlayerStatusChanged { device_id, status } => {
            tracing::debug!(
                device = %device_id,
                playing = status.is_playing,
                volume_pct = status.volume_percent(),
                storage = %status.effective_storage_mode(),
                track = status
                    .current_song
                    .as_ref()
                    .map(|song| song.display_title())
                    .unwrap_or("-"),
                "Status update"
            );
        }
        BusEvent::PlayerUnreachable { device_id, error } => {
            tracing::warn!(device = %device_id, "Unreachable: {error}");
        }
        BusEvent::PlayersRefreshed { devices } => {
            tracing::info!("Fleet refreshed: {} devices", devices.len());
        }
        BusEvent::SessionStarted { user } => {
            tracing::info!("Session started for {}", user.email);
        }
        BusEvent::SessionEnded => {
            tracing::info!("Session ended");
        }
    }
}
