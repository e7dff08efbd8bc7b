//! Domain types shared across the dashboard core.
//!
//! These mirror the JSON the gateway and the on-device APIs speak: users and
//! access requests on the auth side, devices and playback snapshots on the
//! fleet side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default volume assumed when a status snapshot does not carry one.
pub const DEFAULT_VOLUME: f64 = 0.7;

/// Access tier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl Role {
    /// Whether this role may send transport/volume commands.
    pub fn can_control(&self) -> bool {
        !matches!(self, Role::Viewer)
    }

    /// Whether this role may use registry admin operations.
    pub fn can_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Operator => write!(f, "operator"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

/// Authenticated dashboard user.
///
/// Created by the backend when an access request is approved; read-only on
/// this side. Only the opaque credential is persisted, never the user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// When the access request was approved (RFC 3339 on the wire).
    #[serde(
        default,
        rename = "approvedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub approved_at: Option<DateTime<Utc>>,
}

/// A networked playback unit known to the device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// The registry's own online/offline opinion. Display classification is
    /// derived from live poll results, not from this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Which storage tier a device is currently serving playback from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Primary,
    Fallback,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for StorageMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "primary" => Self::Primary,
            "fallback" => Self::Fallback,
            _ => Self::Unknown,
        }
    }
}

/// Track currently loaded on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTrack {
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl CurrentTrack {
    /// Title when the file is tagged, filename otherwise.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.filename)
    }
}

/// Latest playback/storage snapshot for one device.
///
/// Replaced wholesale on every successful poll; a stale partial response
/// must never be merged field-by-field into a fresher one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub is_playing: bool,

    #[serde(default)]
    pub current_song_id: Option<i64>,

    /// Canonical fraction in [0.0, 1.0]; the user-facing control speaks
    /// integer percent.
    #[serde(default)]
    pub volume: Option<f64>,

    #[serde(default)]
    pub storage_mode: StorageMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_song: Option<CurrentTrack>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_health: Option<String>,

    #[serde(default)]
    pub primary_storage_available: Option<bool>,

    #[serde(default)]
    pub fallback_storage_available: Option<bool>,
}

impl PlayerStatus {
    /// Volume fraction, falling back to [`DEFAULT_VOLUME`] when the snapshot
    /// omits it.
    pub fn volume_or_default(&self) -> f64 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }

    /// Volume as the user-facing integer percentage.
    pub fn volume_percent(&self) -> u8 {
        volume_to_percent(self.volume_or_default())
    }

    /// Storage mode as it should be displayed.
    ///
    /// A snapshot claiming `primary` while primary storage is reported
    /// unavailable downgrades to the fallback tier, or to unknown when the
    /// fallback is gone too. It never displays as primary.
    pub fn effective_storage_mode(&self) -> StorageMode {
        match (
            self.storage_mode,
            self.primary_storage_available,
            self.fallback_storage_available,
        ) {
            (StorageMode::Primary, Some(false), Some(true)) => StorageMode::Fallback,
            (StorageMode::Primary, Some(false), _) => StorageMode::Unknown,
            (mode, _, _) => mode,
        }
    }
}

/// Convert a canonical volume fraction to the user-facing percentage.
///
/// Rounds rather than truncates so a requested value and its echoed display
/// agree within one step.
pub fn volume_to_percent(volume: f64) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Convert a user-facing percentage back to the fraction sent on the wire.
pub fn percent_to_volume(percent: u8) -> f64 {
    f64::from(percent.min(100)) / 100.0
}

/// Access request submitted from the login gate. Write-only from this side;
/// its fate is queried separately by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub name: String,
    pub email: String,
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Outcome of submitting an access request, with a message safe to show
/// as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequestOutcome {
    pub success: bool,
    pub message: String,
}

/// Fate of a previously submitted access request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessStatus {
    Pending,
    /// The caller can go back to the login flow.
    Approved,
    Rejected,
    #[default]
    Error,
}

impl From<&str> for AccessStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status check result: the fate plus an optional backend message.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessStatusResult {
    pub status: AccessStatus,
    pub message: Option<String>,
}
