//! Bluetooth Module
//!
//! Provides BLE communication with the AC Infinity controller.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       FanService                         │
//! │   (presence check + retry/timeout around each session)   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │  Session   │  │ Protocol │
//! │           │  │            │  │          │
//! │ - presence│  │ - read     │  │ - UUIDs  │
//! │   warning │  │ - write    │  │ - decode │
//! │           │  │ - release  │  │ - encode │
//! └─────┬─────┘  └─────┬──────┘  └──────────┘
//!       │              │
//!       ▼              ▼
//! ┌─────────────────────────────┐
//! │ BleTransport (connection)   │
//! │  btleplug peripheral access │
//! └─────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Frame layouts, decoding and command encoding
//! - [`transport`] - The transport port the sessions consume
//! - [`connection`] - `btleplug` implementation of the port
//! - [`scanner`] - Pre-flight presence check
//! - [`session`] - Read and write sessions
//! - [`service`] - Main service coordinator

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod mock;

// Re-export main service for convenience
pub use service::FanService;
