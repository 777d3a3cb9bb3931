//! MQTT Adapter
//!
//! Bridges accessory state on the event bus to MQTT for Home Assistant, and
//! turns `<prefix>/<accessory>/set/...` messages into control commands.
//!
//! Published (retained):
//! - `<prefix>/<accessory>/info`   accessory description (JSON)
//! - `<prefix>/<accessory>/power`  `ON` / `OFF`
//! - `<prefix>/<accessory>/source` active source launch key (`home`, `tv`, ...)
//! - `<prefix>/<accessory>/mute`   `true` / `false`
//!
//! Accepted:
//! - `set/power`  `ON` / `OFF`
//! - `set/key`    remote key name or identifier
//! - `set/source` source name, launch key or identifier
//! - `set/volume` `up` / `down`

use anyhow::{anyhow, Result};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::accessory::AccessoryInfo;
use crate::bus::{BusEvent, SharedBus};
use crate::error::PlayerError;
use crate::impl_startable;
use crate::player::{AccessoryCommand, InputSource, PowerState, RemoteKey, VolumeDirection};

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TOPIC_PREFIX: &str = "freebox-player-control";

/// MQTT connection status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttStatus {
    pub connected: bool,
    pub host: Option<String>,
    pub port: u16,
    pub topic_prefix: String,
}

/// Internal state
struct MqttState {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    topic_prefix: String,
    connected: bool,
    info: Option<AccessoryInfo>,
}

impl Default for MqttState {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            username: None,
            password: None,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            connected: false,
            info: None,
        }
    }
}

/// One outbound MQTT message
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// MQTT Adapter for one accessory
pub struct MqttAdapter {
    accessory_id: String,
    state: Arc<RwLock<MqttState>>,
    client: Arc<RwLock<Option<AsyncClient>>>,
    bus: SharedBus,
    /// Token of the running loops; `None` while stopped
    shutdown: Mutex<Option<CancellationToken>>,
}

impl MqttAdapter {
    pub fn new(bus: SharedBus, accessory_id: impl Into<String>) -> Self {
        Self {
            accessory_id: accessory_id.into(),
            state: Arc::new(RwLock::new(MqttState::default())),
            client: Arc::new(RwLock::new(None)),
            bus,
            shutdown: Mutex::new(None),
        }
    }

    /// Configure the MQTT connection
    pub async fn configure(
        &self,
        host: String,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        topic_prefix: Option<String>,
    ) {
        let mut state = self.state.write().await;
        state.host = Some(host);
        state.port = port.unwrap_or(DEFAULT_PORT);
        state.username = username;
        state.password = password;
        if let Some(prefix) = topic_prefix {
            state.topic_prefix = prefix;
        }
    }

    /// Whether the bridge loops are running
    pub async fn is_running(&self) -> bool {
        self.shutdown
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Check if configured
    pub async fn is_configured(&self) -> bool {
        self.state.read().await.host.is_some()
    }

    /// Get connection status
    pub async fn get_status(&self) -> MqttStatus {
        let state = self.state.read().await;
        MqttStatus {
            connected: state.connected,
            host: state.host.clone(),
            port: state.port,
            topic_prefix: state.topic_prefix.clone(),
        }
    }

    /// Start MQTT connection and bridge
    async fn start_internal(&self) -> Result<()> {
        let (host, port, username, password, topic_prefix) = {
            let state = self.state.read().await;
            let host = state
                .host
                .clone()
                .ok_or_else(|| anyhow!("MQTT host not configured"))?;
            (
                host,
                state.port,
                state.username.clone(),
                state.password.clone(),
                state.topic_prefix.clone(),
            )
        };

        let shutdown = CancellationToken::new();
        {
            let mut running = self.shutdown.lock().await;
            if running.as_ref().is_some_and(|token| !token.is_cancelled()) {
                tracing::debug!("MQTT adapter already running");
                return Ok(());
            }
            *running = Some(shutdown.clone());
        }

        let client_id = format!("{}-{}", DEFAULT_TOPIC_PREFIX, self.accessory_id);
        let mut options = MqttOptions::new(client_id, &host, port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&username, &password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);
        *self.client.write().await = Some(client.clone());

        tracing::info!("MQTT connecting to {}:{}...", host, port);

        // Event loop: connection state and incoming set commands
        let state = self.state.clone();
        let bus = self.bus.clone();
        let accessory_id = self.accessory_id.clone();
        let prefix = topic_prefix.clone();
        let event_shutdown = shutdown.clone();

        tokio::spawn(async move {
            let command_filter = format!("{}/{}/set/#", prefix, accessory_id);
            loop {
                tokio::select! {
                    _ = event_shutdown.cancelled() => {
                        tracing::info!("MQTT event loop shutting down");
                        break;
                    }
                    result = eventloop.poll() => {
                        match result {
                            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                                let payload = String::from_utf8_lossy(&publish.payload);
                                match parse_command(&prefix, &accessory_id, &publish.topic, &payload) {
                                    Some(Ok(command)) => bus.publish(BusEvent::ControlCommand {
                                        accessory_id: accessory_id.clone(),
                                        command,
                                    }),
                                    Some(Err(e)) => {
                                        tracing::warn!(topic = %publish.topic, "Ignoring MQTT command: {}", e);
                                    }
                                    None => {}
                                }
                            }
                            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                                tracing::info!("MQTT connected (code: {:?})", ack.code);
                                // Clean sessions drop subscriptions on reconnect
                                if let Err(e) = client.subscribe(&command_filter, QoS::AtLeastOnce).await {
                                    tracing::warn!("MQTT subscribe failed: {}", e);
                                }
                                let info = {
                                    let mut state = state.write().await;
                                    state.connected = true;
                                    state.info.clone()
                                };
                                if let Some(info) = info {
                                    let message = info_message(&prefix, &info);
                                    if let Err(e) = publish_message(&client, message).await {
                                        tracing::warn!("MQTT info publish failed: {}", e);
                                    }
                                }
                            }
                            Ok(Event::Incoming(Incoming::Disconnect)) => {
                                tracing::warn!("MQTT disconnected");
                                state.write().await.connected = false;
                            }
                            Err(e) => {
                                tracing::error!("MQTT error: {}", e);
                                state.write().await.connected = false;
                                tokio::select! {
                                    _ = event_shutdown.cancelled() => break,
                                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        });

        // Bus forwarder: accessory state to MQTT
        let client_slot = self.client.clone();
        let state = self.state.clone();
        let mut rx = self.bus.subscribe();
        let accessory_id = self.accessory_id.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("MQTT bus forwarder shutting down");
                        break;
                    }
                    result = rx.recv() => {
                        let event = match result {
                            Ok(event) => event,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!("MQTT forwarder lagged, {} events dropped", n);
                                continue;
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        };
                        if event.accessory_id() != Some(accessory_id.as_str()) {
                            continue;
                        }
                        if let BusEvent::AccessoryPublished { ref info } = event {
                            state.write().await.info = Some(info.clone());
                        }
                        let Some(message) = event_message(&topic_prefix, &event) else {
                            continue;
                        };
                        let client = client_slot.read().await.clone();
                        if let Some(client) = client {
                            if let Err(e) = publish_message(&client, message).await {
                                tracing::warn!("MQTT publish failed: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop_internal(&self) {
        let running = self.shutdown.lock().await.take();
        if let Some(token) = running {
            token.cancel();
        }
        let client = self.client.write().await.take();
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                tracing::debug!("MQTT disconnect: {}", e);
            }
        }
        self.state.write().await.connected = false;
        tracing::info!("MQTT adapter stopped");
    }
}

impl_startable!(MqttAdapter, "mqtt", is_configured);

async fn publish_message(client: &AsyncClient, message: OutboundMessage) -> Result<()> {
    client
        .publish(message.topic, QoS::AtLeastOnce, message.retain, message.payload)
        .await?;
    Ok(())
}

fn info_message(prefix: &str, info: &AccessoryInfo) -> OutboundMessage {
    let payload = serde_json::json!({
        "accessory": info,
        "published_at": chrono::Utc::now().to_rfc3339(),
    });
    OutboundMessage {
        topic: format!("{}/{}/info", prefix, info.id),
        payload: payload.to_string(),
        retain: true,
    }
}

/// Map a bus event to the MQTT message announcing it
pub fn event_message(prefix: &str, event: &BusEvent) -> Option<OutboundMessage> {
    let (accessory_id, suffix, payload) = match event {
        BusEvent::AccessoryPublished { info } => return Some(info_message(prefix, info)),
        BusEvent::PowerStateChanged {
            accessory_id,
            state,
        } => (accessory_id, "power", power_payload(*state).to_string()),
        BusEvent::ActiveSourceChanged {
            accessory_id,
            source,
        } => (accessory_id, "source", source.launch_key().to_string()),
        BusEvent::MuteChanged {
            accessory_id,
            muted,
        } => (accessory_id, "mute", muted.to_string()),
        BusEvent::ControlCommand { .. } | BusEvent::ShuttingDown { .. } => return None,
    };
    Some(OutboundMessage {
        topic: format!("{}/{}/{}", prefix, accessory_id, suffix),
        payload,
        retain: true,
    })
}

fn power_payload(state: PowerState) -> &'static str {
    match state {
        PowerState::Active => "ON",
        PowerState::Inactive => "OFF",
    }
}

fn parse_power(payload: &str) -> Result<PowerState, PlayerError> {
    match payload.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "active" => Ok(PowerState::Active),
        "off" | "0" | "false" | "inactive" => Ok(PowerState::Inactive),
        other => Err(PlayerError::UnknownIdentifier {
            kind: "power state",
            id: other.to_string(),
        }),
    }
}

/// Decode a `set/...` message for this accessory.
///
/// `None` when the topic is not a command for this accessory.
pub fn parse_command(
    prefix: &str,
    accessory_id: &str,
    topic: &str,
    payload: &str,
) -> Option<Result<AccessoryCommand, PlayerError>> {
    let base = format!("{}/{}/set/", prefix, accessory_id);
    let characteristic = topic.strip_prefix(&base)?;
    let command = match characteristic {
        "power" => parse_power(payload).map(AccessoryCommand::SetPower),
        "key" => payload.parse::<RemoteKey>().map(AccessoryCommand::RemoteKey),
        "source" => payload
            .parse::<InputSource>()
            .map(AccessoryCommand::SelectSource),
        "volume" => payload
            .parse::<VolumeDirection>()
            .map(AccessoryCommand::Volume),
        other => Err(PlayerError::UnknownIdentifier {
            kind: "characteristic",
            id: other.to_string(),
        }),
    };
    Some(command)
}
