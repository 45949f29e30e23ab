//! FlockSquawk: portable surveillance-device detection core.
//!
//! Scans WiFi and BLE traffic, matches what it sees against a fixed
//! signature database (network names, OUI prefixes, BLE names, Raven
//! service UUIDs) and raises an audio alert plus an NDJSON telemetry record,
//! geotagged when a fresh GPS fix exists.
//!
//! The crate has no platform dependencies and is testable on any host with
//! `cargo test`. Firmware supplies the radio driver (`scanner::RadioDriver`),
//! storage and speaker (`sound::Storage`, `sound::AudioSink`) and a report
//! output (`telemetry::ReportSink`).
//!
//! Data flow:
//!
//! ```text
//! radio callbacks ─► RadioLink queue ─► RadioScanner::publish_pending
//!     ─► EventBus(WiFiFrame / BluetoothDevice) ─► ThreatAnalyzer
//!     ─► EventBus(Threat) ─► TelemetryReporter + EventBus(AudioRequest)
//!     ─► SoundEngine (chunked playback from App::tick)
//! ```
//!
//! `no_std` with `alloc`: the event bus boxes its handlers and the sound
//! engine sizes its playback buffer to the file.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod analyzer;
pub mod app;
pub mod board;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod gps;
pub mod queue;
pub mod scanner;
pub mod signatures;
pub mod sound;
pub mod telemetry;
pub mod wav;
