//! Mock servers for integration testing
//!
//! Simulates the Player's network remote so the real HTTP client, prober and
//! controller can be exercised without hardware.

pub mod player;

pub use player::MockPlayer;
