//! Configuration management
//!
//! Layered with the `config` crate: defaults, then `config.{toml,json,yaml}`
//! in the config directory, then `FPC_*` environment variables
//! (`FPC_PLAYER__HOSTNAME`, `FPC_MQTT__HOST`, ...).

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PlayerError;
use crate::player::{ControllerTimings, DeviceEndpoint};

const APP_DIR_NAME: &str = "freebox-player-control";
const ENV_PREFIX: &str = "FPC";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub player: PlayerConfig,

    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Display name of the accessory
    pub name: String,
    pub hostname: String,
    /// Network remote access code
    pub code: String,
    /// Port probed to infer power state
    #[serde(alias = "powerstatus")]
    pub power_probe_port: u16,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(
        default = "default_poll_interval_ms",
        alias = "updatePollDelay",
        alias = "updatepolldelay"
    )]
    pub poll_interval_ms: u64,
    #[serde(default = "default_power_on_home_delay_ms")]
    pub power_on_home_delay_ms: u64,
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,
}

fn default_control_port() -> u16 {
    80
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_power_on_home_delay_ms() -> u64 {
    1_000
}

fn default_network_timeout_ms() -> u64 {
    500
}

impl PlayerConfig {
    /// Reject settings the Player cannot work with
    pub fn validate(&self) -> Result<(), PlayerError> {
        let missing = [
            ("name", self.name.trim().is_empty()),
            ("hostname", self.hostname.trim().is_empty()),
            ("code", self.code.trim().is_empty()),
            ("power_probe_port", self.power_probe_port == 0),
            ("control_port", self.control_port == 0),
        ];
        if let Some((field, _)) = missing.iter().find(|(_, bad)| *bad) {
            return Err(PlayerError::Configuration(format!(
                "player.{} must be set",
                field
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(PlayerError::Configuration(
                "player.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.network_timeout_ms == 0 {
            return Err(PlayerError::Configuration(
                "player.network_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint {
            hostname: self.hostname.trim().to_string(),
            control_port: self.control_port,
            power_probe_port: self.power_probe_port,
            access_code: self.code.trim().to_string(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn timings(&self) -> ControllerTimings {
        ControllerTimings {
            power_on_home_delay: Duration::from_millis(self.power_on_home_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: Option<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}

/// Get config directory (FPC_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FPC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

/// Load and validate configuration from the default config directory
pub fn load_config() -> Result<Config> {
    load_config_from_dir(&get_config_dir())
}

/// Load and validate configuration, reading `config.*` from `dir`
pub fn load_config_from_dir(dir: &Path) -> Result<Config> {
    // Defaults come from the serde attributes so legacy aliases never collide
    // with a pre-seeded key. Values stay strings: access codes may start with 0.
    let settings = ::config::Config::builder()
        .add_source(::config::File::with_name(&dir.join("config").to_string_lossy()).required(false))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = settings.try_deserialize().map_err(|e| {
        PlayerError::Configuration(format!("Plugin configuration is not valid: {}", e))
    })?;
    config.player.validate()?;
    Ok(config)
}
