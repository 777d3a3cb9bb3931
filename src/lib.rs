//! Freebox Player Control
//!
//! Exposes a Freebox Player as a smart-home television accessory.
//!
//! This library provides:
//! - TCP reachability probing as a power-state proxy
//! - The Player's HTTP network remote (`/pub/remote_control`)
//! - Remote-key and input-source tables, with TV-specific arrow zapping
//! - The accessory state controller and its periodic power poll
//! - An MQTT bridge for Home Assistant (feature `mqtt`)

pub mod accessory;
pub mod adapters;
pub mod bus;
pub mod config;
pub mod error;
pub mod player;

pub use error::{PlayerError, Result};
