//! Accessory description presented to the host framework
//!
//! Static metadata (manufacturer, model, serial), the five input sources and
//! the speaker's volume control type. Built once at startup.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::player::keys::{InputSource, InputSourceType};

pub const MANUFACTURER: &str = "Free";
pub const MODEL: &str = "Freebox Player Devialet";
pub const SOFTWARE_REVISION: &str = env!("FPC_VERSION");
pub const FIRMWARE_REVISION: &str = env!("CARGO_PKG_NAME");

/// One selectable input source as shown by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSourceInfo {
    pub identifier: u8,
    pub name: String,
    pub launch_key: String,
    pub source_type: InputSourceType,
}

impl From<InputSource> for InputSourceInfo {
    fn from(source: InputSource) -> Self {
        Self {
            identifier: source.id(),
            name: source.display_name().to_string(),
            launch_key: source.launch_key().to_string(),
            source_type: source.source_type(),
        }
    }
}

/// Speaker volume control; the Player only steps up and down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeControlType {
    Relative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryInfo {
    /// Topic/event key, stable for a given name and host
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub software_revision: String,
    pub firmware_revision: String,
    pub sources: Vec<InputSourceInfo>,
    pub volume_control: VolumeControlType,
}

impl AccessoryInfo {
    pub fn new(name: &str, hostname: &str) -> Self {
        Self {
            id: accessory_id(name, hostname),
            name: name.to_string(),
            hostname: hostname.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            serial_number: serial_number(name, hostname),
            software_revision: SOFTWARE_REVISION.to_string(),
            firmware_revision: FIRMWARE_REVISION.to_string(),
            sources: InputSource::ALL.into_iter().map(Into::into).collect(),
            volume_control: VolumeControlType::Relative,
        }
    }
}

/// Lowercase slug of name and host, e.g. `salon-192-168-1-10`
pub fn accessory_id(name: &str, hostname: &str) -> String {
    let raw = format!("{}-{}", name, hostname).to_lowercase();
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Stable 32 hex-char serial derived from host and name
pub fn serial_number(name: &str, hostname: &str) -> String {
    let digest = Sha256::digest(format!("freebox-player-control:{}-{}", hostname, name));
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_five_sources_in_identifier_order() {
        let info = AccessoryInfo::new("Freebox", "192.168.1.10");
        let ids: Vec<u8> = info.sources.iter().map(|s| s.identifier).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(info.sources[1].name, "TV");
        assert_eq!(info.sources[1].source_type, InputSourceType::Tuner);
        assert_eq!(info.sources[4].source_type, InputSourceType::Usb);
        assert_eq!(info.manufacturer, "Free");
        assert_eq!(info.volume_control, VolumeControlType::Relative);
    }

    #[test]
    fn id_is_a_slug() {
        assert_eq!(accessory_id("Freebox", "192.168.1.10"), "freebox-192-168-1-10");
        assert_eq!(accessory_id("  Salon TV ", "player.lan"), "salon-tv-player-lan");
    }

    #[test]
    fn serial_is_stable_and_host_specific() {
        let a = serial_number("Freebox", "192.168.1.10");
        assert_eq!(a.len(), 32);
        assert_eq!(a, serial_number("Freebox", "192.168.1.10"));
        assert_ne!(a, serial_number("Freebox", "192.168.1.11"));
    }
}
