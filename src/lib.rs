//! Resort Music Control - dashboard core
//!
//! The headless core of a remote-control dashboard for a fleet of networked
//! music players. It talks to two HTTP surfaces: a gateway (auth, device
//! registry, admin operations) and the per-device playback APIs (status,
//! control), either proxied through the gateway or addressed directly.
//!
//! This library provides:
//! - Session lifecycle: login, persisted-token restore, logout
//! - Per-device status polling with stale-response protection
//! - Playback command dispatch with a debounced follow-up poll
//! - Fleet supervision: registry refresh, poller lifecycle, online counts
//! - A broadcast event bus for whatever view layer sits on top
//!
//! Rendering is deliberately absent; consumers subscribe to the bus and
//! read snapshots.

// =============================================================================
// Lints - Enforce code quality and consistency
// =============================================================================

// Deny truly dangerous patterns (these will fail the build)
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod auth;
pub mod bus;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod player;
pub mod registry;
pub mod session;
