//! Host-side services around the controller: command dispatch and the MQTT bridge

pub mod dispatch;
#[cfg(feature = "mqtt")]
pub mod mqtt;
mod traits;

pub use dispatch::CommandDispatcher;
pub use traits::Startable;
