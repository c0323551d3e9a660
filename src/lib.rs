//! Board computer control-plane library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod pins;
pub mod ports;
pub mod store;
pub mod supervisor;
pub mod telemetry;

// The hardware-facing modules; their real backends are guarded by cfg
// attributes inside, host builds get simulations.
pub mod adapters;
pub mod drivers;
