//! Remote keys, input sources and their Player key mappings
//!
//! Player key names follow the vendor's remote-code reference:
//! https://dev.freebox.fr/sdk/freebox_player_codes.html

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::PlayerError;

/// Key tokens understood by the Player remote-control endpoint
pub mod device_key {
    pub const POWER: &str = "power";
    pub const CHANNEL_UP: &str = "prgm_inc";
    pub const CHANNEL_DOWN: &str = "prgm_dec";
    pub const VOLUME_UP: &str = "vol_inc";
    pub const VOLUME_DOWN: &str = "vol_dec";
    pub const RED: &str = "red";
    pub const INFO: &str = "info";
    pub const PLAY: &str = "play";
    pub const REWIND: &str = "bwd";
    pub const FORWARD: &str = "fwd";
    pub const UP: &str = "up";
    pub const DOWN: &str = "down";
    pub const LEFT: &str = "left";
    pub const RIGHT: &str = "right";
    pub const OK: &str = "ok";
    pub const APP_HOME: &str = "home";
    pub const APP_TV: &str = "tv";
    pub const APP_NETFLIX: &str = "netflix";
    pub const APP_YOUTUBE: &str = "youtube";
    pub const APP_MEDIA: &str = "media";
}

// =============================================================================
// Remote keys
// =============================================================================

/// Abstract remote button as delivered by the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKey {
    Rewind,
    FastForward,
    NextTrack,
    PreviousTrack,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Select,
    Back,
    Exit,
    PlayPause,
    Information,
}

impl RemoteKey {
    pub const ALL: [RemoteKey; 13] = [
        RemoteKey::Rewind,
        RemoteKey::FastForward,
        RemoteKey::NextTrack,
        RemoteKey::PreviousTrack,
        RemoteKey::ArrowUp,
        RemoteKey::ArrowDown,
        RemoteKey::ArrowLeft,
        RemoteKey::ArrowRight,
        RemoteKey::Select,
        RemoteKey::Back,
        RemoteKey::Exit,
        RemoteKey::PlayPause,
        RemoteKey::Information,
    ];

    /// Host framework numeric identifier (HAP RemoteKey values)
    pub fn id(self) -> u8 {
        match self {
            RemoteKey::Rewind => 0,
            RemoteKey::FastForward => 1,
            RemoteKey::NextTrack => 2,
            RemoteKey::PreviousTrack => 3,
            RemoteKey::ArrowUp => 4,
            RemoteKey::ArrowDown => 5,
            RemoteKey::ArrowLeft => 6,
            RemoteKey::ArrowRight => 7,
            RemoteKey::Select => 8,
            RemoteKey::Back => 9,
            RemoteKey::Exit => 10,
            RemoteKey::PlayPause => 11,
            RemoteKey::Information => 15,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            RemoteKey::Rewind => "rewind",
            RemoteKey::FastForward => "fast_forward",
            RemoteKey::NextTrack => "next_track",
            RemoteKey::PreviousTrack => "previous_track",
            RemoteKey::ArrowUp => "arrow_up",
            RemoteKey::ArrowDown => "arrow_down",
            RemoteKey::ArrowLeft => "arrow_left",
            RemoteKey::ArrowRight => "arrow_right",
            RemoteKey::Select => "select",
            RemoteKey::Back => "back",
            RemoteKey::Exit => "exit",
            RemoteKey::PlayPause => "play_pause",
            RemoteKey::Information => "information",
        }
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the snake_case name or the numeric identifier
impl FromStr for RemoteKey {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let found = match s.parse::<u8>() {
            Ok(id) => Self::from_id(id),
            Err(_) => Self::ALL
                .into_iter()
                .find(|k| k.name().eq_ignore_ascii_case(s)),
        };
        found.ok_or_else(|| PlayerError::UnknownIdentifier {
            kind: "remote key",
            id: s.to_string(),
        })
    }
}

// =============================================================================
// Input sources
// =============================================================================

/// Kind of input source, as shown by the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSourceType {
    HomeScreen,
    Tuner,
    Application,
    Usb,
}

/// Fixed set of Player apps exposed as selectable input sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Home,
    Tv,
    Netflix,
    Youtube,
    Media,
}

impl InputSource {
    pub const ALL: [InputSource; 5] = [
        InputSource::Home,
        InputSource::Tv,
        InputSource::Netflix,
        InputSource::Youtube,
        InputSource::Media,
    ];

    /// Stable identifier used as the host's active identifier
    pub fn id(self) -> u8 {
        match self {
            InputSource::Home => 1,
            InputSource::Tv => 2,
            InputSource::Netflix => 3,
            InputSource::Youtube => 4,
            InputSource::Media => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Player key launching this source's app
    pub fn launch_key(self) -> &'static str {
        match self {
            InputSource::Home => device_key::APP_HOME,
            InputSource::Tv => device_key::APP_TV,
            InputSource::Netflix => device_key::APP_NETFLIX,
            InputSource::Youtube => device_key::APP_YOUTUBE,
            InputSource::Media => device_key::APP_MEDIA,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            InputSource::Home => "Home",
            InputSource::Tv => "TV",
            InputSource::Netflix => "Netflix",
            InputSource::Youtube => "Youtube",
            InputSource::Media => "Media",
        }
    }

    pub fn source_type(self) -> InputSourceType {
        match self {
            InputSource::Home => InputSourceType::HomeScreen,
            InputSource::Tv => InputSourceType::Tuner,
            InputSource::Netflix | InputSource::Youtube => InputSourceType::Application,
            InputSource::Media => InputSourceType::Usb,
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Accepts the display name, the launch key, or the numeric identifier
impl FromStr for InputSource {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let found = match s.parse::<u8>() {
            Ok(id) => Self::from_id(id),
            Err(_) => Self::ALL.into_iter().find(|src| {
                src.display_name().eq_ignore_ascii_case(s) || src.launch_key().eq_ignore_ascii_case(s)
            }),
        };
        found.ok_or_else(|| PlayerError::UnknownIdentifier {
            kind: "input source",
            id: s.to_string(),
        })
    }
}

// =============================================================================
// Volume
// =============================================================================

/// Relative volume step; no level is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeDirection {
    Up,
    Down,
}

impl VolumeDirection {
    /// HAP VolumeSelector: INCREMENT = 0, DECREMENT = 1
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(VolumeDirection::Up),
            1 => Some(VolumeDirection::Down),
            _ => None,
        }
    }

    pub fn device_key(self) -> &'static str {
        match self {
            VolumeDirection::Up => device_key::VOLUME_UP,
            VolumeDirection::Down => device_key::VOLUME_DOWN,
        }
    }
}

impl FromStr for VolumeDirection {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let found = match s.to_ascii_lowercase().as_str() {
            "up" | "increment" | "+" => Some(VolumeDirection::Up),
            "down" | "decrement" | "-" => Some(VolumeDirection::Down),
            other => other.parse::<u8>().ok().and_then(Self::from_id),
        };
        found.ok_or_else(|| PlayerError::UnknownIdentifier {
            kind: "volume direction",
            id: s.to_string(),
        })
    }
}

// =============================================================================
// Mapping tables
// =============================================================================

/// Immutable table from remote key to Player key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapping {
    keys: HashMap<RemoteKey, &'static str>,
}

impl KeyMapping {
    /// Default table, used by every source without an override
    pub fn standard() -> Self {
        let keys = HashMap::from([
            (RemoteKey::Rewind, device_key::REWIND),
            (RemoteKey::FastForward, device_key::FORWARD),
            (RemoteKey::NextTrack, device_key::CHANNEL_DOWN),
            (RemoteKey::PreviousTrack, device_key::CHANNEL_UP),
            (RemoteKey::ArrowUp, device_key::UP),
            (RemoteKey::ArrowDown, device_key::DOWN),
            (RemoteKey::ArrowLeft, device_key::LEFT),
            (RemoteKey::ArrowRight, device_key::RIGHT),
            (RemoteKey::Select, device_key::OK),
            (RemoteKey::Back, device_key::RED),
            (RemoteKey::Exit, device_key::APP_HOME),
            (RemoteKey::PlayPause, device_key::PLAY),
            (RemoteKey::Information, device_key::INFO),
        ]);
        Self { keys }
    }

    /// Copy of this table with some keys rebound
    pub fn with_overrides(&self, overrides: &[(RemoteKey, &'static str)]) -> Self {
        let mut keys = self.keys.clone();
        keys.extend(overrides.iter().copied());
        Self { keys }
    }

    pub fn get(&self, key: RemoteKey) -> Option<&'static str> {
        self.keys.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The default table plus per-source overrides, built once per accessory
#[derive(Debug, Clone)]
pub struct KeyMaps {
    default: Arc<KeyMapping>,
    overrides: HashMap<InputSource, Arc<KeyMapping>>,
}

impl KeyMaps {
    pub fn new() -> Self {
        let default = Arc::new(KeyMapping::standard());
        // Arrows zap channels in the TV app
        let tv = default.with_overrides(&[
            (RemoteKey::ArrowLeft, device_key::CHANNEL_DOWN),
            (RemoteKey::ArrowRight, device_key::CHANNEL_UP),
        ]);
        let overrides = HashMap::from([(InputSource::Tv, Arc::new(tv))]);
        Self { default, overrides }
    }

    pub fn default_mapping(&self) -> Arc<KeyMapping> {
        self.default.clone()
    }

    /// Table active while `source` is shown, falling back to the default
    pub fn for_source(&self, source: InputSource) -> Arc<KeyMapping> {
        self.overrides
            .get(&source)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for KeyMaps {
    fn default() -> Self {
        Self::new()
    }
}
