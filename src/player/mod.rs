//! Freebox Player control: reachability probe, network remote, key tables,
//! and the accessory state controller tying them together.

pub mod controller;
pub mod keys;
pub mod poller;
pub mod probe;
pub mod remote;

pub use controller::{
    AccessoryCommand, AccessoryHost, ControllerTimings, MuteReading, PlayerController,
    PowerReading,
};
pub use keys::{InputSource, KeyMapping, KeyMaps, RemoteKey, VolumeDirection};
pub use poller::PowerPoller;
pub use probe::{ProbeOutcome, Prober, TcpProber};
pub use remote::{HttpRemote, KeySender};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a Player lives and how to authenticate against it.
/// Fixed for the lifetime of an accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    pub hostname: String,
    pub control_port: u16,
    pub power_probe_port: u16,
    #[serde(skip_serializing)]
    pub access_code: String,
}

/// Power state as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Active,
    Inactive,
}

impl PowerState {
    pub fn is_active(self) -> bool {
        self == PowerState::Active
    }
}

impl From<bool> for PowerState {
    fn from(active: bool) -> Self {
        if active {
            PowerState::Active
        } else {
            PowerState::Inactive
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Active => f.write_str("active"),
            PowerState::Inactive => f.write_str("inactive"),
        }
    }
}
