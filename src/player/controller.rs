//! Accessory state controller
//!
//! Translates host operations (power, remote keys, input sources, volume, mute)
//! into Player keys and keeps the reported power state in line with the
//! Player's reachability.
//!
//! ## State
//!
//! The controller is the only writer of three values:
//! - cached power state (forced INACTIVE at startup)
//! - active input source (HOME at startup)
//! - current remote-key mapping, swapped as a whole on a successful source switch
//!
//! Nothing is retried. A failed command leaves state untouched and the next
//! host action or poll tick is the only retry.
//!
//! ## Power-on follow-up
//!
//! The Player always wakes up on its home screen, so a successful switch to
//! ACTIVE schedules a HOME source switch after `power_on_home_delay`. Every
//! later accepted power transition cancels a still pending follow-up.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PlayerError, Result};
use crate::player::keys::{device_key, InputSource, KeyMapping, KeyMaps, RemoteKey, VolumeDirection};
use crate::player::probe::Prober;
use crate::player::remote::KeySender;
use crate::player::{DeviceEndpoint, PowerState};

/// Default delay between power-on and the forced HOME switch
pub const POWER_ON_HOME_DELAY: Duration = Duration::from_millis(1000);

/// Push interface towards the host framework
pub trait AccessoryHost: Send + Sync {
    fn power_state_changed(&self, state: PowerState);
    fn active_source_changed(&self, source: InputSource);
    fn mute_changed(&self, muted: bool);
}

/// Decoded host request, one per user or automation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum AccessoryCommand {
    SetPower(PowerState),
    RemoteKey(RemoteKey),
    SelectSource(InputSource),
    Volume(VolumeDirection),
}

/// Power state read from the probe. A failed probe is INACTIVE with the
/// probe's reason as a warning, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerReading {
    pub state: PowerState,
    pub warning: Option<PlayerError>,
}

/// Mute state inferred from power: the Player counts as muted while off
#[derive(Debug, Clone, PartialEq)]
pub struct MuteReading {
    pub muted: bool,
    pub warning: Option<PlayerError>,
}

#[derive(Debug, Clone)]
pub struct ControllerTimings {
    pub power_on_home_delay: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self {
            power_on_home_delay: POWER_ON_HOME_DELAY,
        }
    }
}

struct PendingHomeSwitch {
    id: u64,
    cancel: CancellationToken,
}

struct ControllerState {
    power: PowerState,
    active_source: InputSource,
    mapping: Arc<KeyMapping>,
    pending_home: Option<PendingHomeSwitch>,
    next_pending_id: u64,
}

/// Controller for one Player. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlayerController {
    endpoint: Arc<DeviceEndpoint>,
    prober: Arc<dyn Prober>,
    sender: Arc<dyn KeySender>,
    host: Arc<dyn AccessoryHost>,
    keymaps: Arc<KeyMaps>,
    state: Arc<RwLock<ControllerState>>,
    timings: ControllerTimings,
}

impl PlayerController {
    pub fn new(
        endpoint: DeviceEndpoint,
        prober: Arc<dyn Prober>,
        sender: Arc<dyn KeySender>,
        host: Arc<dyn AccessoryHost>,
        timings: ControllerTimings,
    ) -> Self {
        let keymaps = Arc::new(KeyMaps::new());
        let state = ControllerState {
            power: PowerState::Inactive,
            active_source: InputSource::Home,
            mapping: keymaps.default_mapping(),
            pending_home: None,
            next_pending_id: 0,
        };
        Self {
            endpoint: Arc::new(endpoint),
            prober,
            sender,
            host,
            keymaps,
            state: Arc::new(RwLock::new(state)),
            timings,
        }
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Cached power state, as last probed or set
    pub async fn power_state(&self) -> PowerState {
        self.state.read().await.power
    }

    /// Last successfully activated input source
    pub async fn active_source(&self) -> InputSource {
        self.state.read().await.active_source
    }

    /// Remote-key mapping currently in effect
    pub async fn current_mapping(&self) -> Arc<KeyMapping> {
        self.state.read().await.mapping.clone()
    }

    /// Push the forced startup state: off, on HOME, muted
    pub fn publish_initial_state(&self) {
        self.host.power_state_changed(PowerState::Inactive);
        self.host.active_source_changed(InputSource::Home);
        self.host.mute_changed(true);
    }

    // =========================================================================
    // Power
    // =========================================================================

    /// Probe the Player and cache the derived power state
    pub async fn get_power_state(&self) -> PowerReading {
        let outcome = self
            .prober
            .probe(&self.endpoint.hostname, self.endpoint.power_probe_port)
            .await;
        let state = PowerState::from(outcome.alive);

        if let Some(ref e) = outcome.error {
            warn!(host = %self.endpoint.hostname, "Getting power state failed: {}", e);
        }

        self.state.write().await.power = state;
        PowerReading {
            state,
            warning: outcome.error,
        }
    }

    /// Toggle power if `target` differs from the cached state.
    ///
    /// The Player only exposes a toggle, so a request matching the cached
    /// state sends nothing.
    pub async fn set_power_state(&self, target: PowerState) -> Result<()> {
        let current = self.power_state().await;
        if current == target {
            debug!(
                "Power state switch bypassed, Player already at target power state: {}",
                target
            );
            return Ok(());
        }

        if let Err(e) = self.sender.send_key(device_key::POWER).await {
            error!(
                host = %self.endpoint.hostname,
                target = %target,
                "Setting power state failed: {}",
                e
            );
            return Err(e);
        }

        let superseded = {
            let mut state = self.state.write().await;
            state.power = target;
            state.pending_home.take()
        };
        if let Some(pending) = superseded {
            debug!("Cancelling pending HOME switch superseded by power {}", target);
            pending.cancel.cancel();
        }

        info!(host = %self.endpoint.hostname, "Player power set to {}", target);
        self.host.mute_changed(!target.is_active());

        if target.is_active() {
            self.schedule_home_switch().await;
        }
        Ok(())
    }

    async fn schedule_home_switch(&self) {
        let cancel = CancellationToken::new();
        let id = {
            let mut state = self.state.write().await;
            let id = state.next_pending_id;
            state.next_pending_id += 1;
            state.pending_home = Some(PendingHomeSwitch {
                id,
                cancel: cancel.clone(),
            });
            id
        };

        let controller = self.clone();
        let delay = self.timings.power_on_home_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Power-on HOME switch cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    controller.finish_home_switch(id).await;
                }
            }
        });
    }

    async fn finish_home_switch(&self, id: u64) {
        let still_pending = {
            let mut state = self.state.write().await;
            match state.pending_home {
                Some(ref pending) if pending.id == id => {
                    state.pending_home = None;
                    true
                }
                _ => false,
            }
        };
        if !still_pending {
            return;
        }

        if self.set_input_source(InputSource::Home).await.is_ok() {
            self.host.active_source_changed(InputSource::Home);
        }
    }

    /// Whether a power-on HOME switch is waiting to fire
    pub async fn home_switch_pending(&self) -> bool {
        self.state.read().await.pending_home.is_some()
    }

    // =========================================================================
    // Remote, sources, speaker
    // =========================================================================

    /// Send the Player key bound to `key` in the current mapping
    pub async fn set_remote_key(&self, key: RemoteKey) -> Result<()> {
        let mapping = self.current_mapping().await;
        let Some(player_key) = mapping.get(key) else {
            let err = PlayerError::UnmappedKey {
                key: key.to_string(),
            };
            error!("Sending remote key to Player failed: {}", err);
            return Err(err);
        };

        self.sender.send_key(player_key).await.map_err(|e| {
            error!(
                host = %self.endpoint.hostname,
                remote_key = %key,
                key = player_key,
                "Sending remote key to Player failed: {}",
                e
            );
            e
        })
    }

    /// Launch the app behind `source`; on success the source's key mapping
    /// takes effect. On failure nothing changes.
    pub async fn set_input_source(&self, source: InputSource) -> Result<()> {
        let key = source.launch_key();
        if let Err(e) = self.sender.send_key(key).await {
            error!(
                host = %self.endpoint.hostname,
                source = %source,
                key,
                "Switching Player input source failed: {}",
                e
            );
            return Err(e);
        }

        let mapping = self.keymaps.for_source(source);
        {
            let mut state = self.state.write().await;
            state.active_source = source;
            state.mapping = mapping;
        }
        debug!(host = %self.endpoint.hostname, "Input source switched to {}", source);
        Ok(())
    }

    /// Muted whenever the Player is off; there is no real mute telemetry
    pub async fn get_mute_state(&self) -> MuteReading {
        let reading = self.get_power_state().await;
        MuteReading {
            muted: !reading.state.is_active(),
            warning: reading.warning,
        }
    }

    /// One relative volume step
    pub async fn set_volume(&self, direction: VolumeDirection) -> Result<()> {
        let key = direction.device_key();
        self.sender.send_key(key).await.map_err(|e| {
            error!(
                host = %self.endpoint.hostname,
                key,
                "Changing Player volume failed: {}",
                e
            );
            e
        })
    }

    // =========================================================================
    // Host entry points
    // =========================================================================

    /// Reconcile with the Player: probe once and push power and the mute
    /// state derived from it, changed or not
    pub async fn poll_tick(&self) -> PowerState {
        debug!(host = %self.endpoint.hostname, "Poll update");
        let reading = self.get_power_state().await;
        self.host.power_state_changed(reading.state);
        self.host.mute_changed(!reading.state.is_active());
        reading.state
    }

    /// Run a host command and record accepted values back to the host
    pub async fn handle_command(&self, command: AccessoryCommand) -> Result<()> {
        match command {
            AccessoryCommand::SetPower(target) => {
                self.set_power_state(target).await?;
                self.host.power_state_changed(target);
            }
            AccessoryCommand::RemoteKey(key) => self.set_remote_key(key).await?,
            AccessoryCommand::SelectSource(source) => {
                self.set_input_source(source).await?;
                self.host.active_source_changed(source);
            }
            AccessoryCommand::Volume(direction) => self.set_volume(direction).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::probe::ProbeOutcome;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio_test::{assert_err, assert_ok};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
        fail_all: AtomicBool,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_key(&self, key: &str) {
            self.failing.lock().unwrap().insert(key.to_string());
        }

        fn set_fail_all(&self, fail: bool) {
            self.fail_all.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl KeySender for RecordingSender {
        async fn send_key(&self, key: &str) -> Result<()> {
            self.sent.lock().unwrap().push(key.to_string());
            let fails =
                self.fail_all.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(key);
            if fails {
                Err(PlayerError::Protocol {
                    operation: "remote command",
                    key: key.to_string(),
                    status: 403,
                })
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct FixedProber {
        alive: AtomicBool,
        probes: AtomicUsize,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, hostname: &str, port: u16) -> ProbeOutcome {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.alive.load(Ordering::SeqCst) {
                ProbeOutcome::alive(Duration::from_millis(2))
            } else {
                ProbeOutcome::dead(PlayerError::Connectivity {
                    operation: "power probe",
                    target: format!("{}:{}", hostname, port),
                    reason: "timed out after 500ms".to_string(),
                })
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Pushed {
        Power(PowerState),
        Source(InputSource),
        Mute(bool),
    }

    #[derive(Default)]
    struct RecordingHost {
        pushed: Mutex<Vec<Pushed>>,
    }

    impl RecordingHost {
        fn pushed(&self) -> Vec<Pushed> {
            self.pushed.lock().unwrap().clone()
        }
    }

    impl AccessoryHost for RecordingHost {
        fn power_state_changed(&self, state: PowerState) {
            self.pushed.lock().unwrap().push(Pushed::Power(state));
        }
        fn active_source_changed(&self, source: InputSource) {
            self.pushed.lock().unwrap().push(Pushed::Source(source));
        }
        fn mute_changed(&self, muted: bool) {
            self.pushed.lock().unwrap().push(Pushed::Mute(muted));
        }
    }

    struct Fixture {
        controller: PlayerController,
        sender: Arc<RecordingSender>,
        prober: Arc<FixedProber>,
        host: Arc<RecordingHost>,
    }

    fn fixture() -> Fixture {
        let sender = Arc::new(RecordingSender::default());
        let prober = Arc::new(FixedProber::default());
        let host = Arc::new(RecordingHost::default());
        let endpoint = DeviceEndpoint {
            hostname: "192.168.1.10".to_string(),
            control_port: 80,
            power_probe_port: 80,
            access_code: "1234".to_string(),
        };
        let controller = PlayerController::new(
            endpoint,
            prober.clone(),
            sender.clone(),
            host.clone(),
            ControllerTimings::default(),
        );
        Fixture {
            controller,
            sender,
            prober,
            host,
        }
    }

    #[tokio::test]
    async fn starts_inactive_on_home_with_default_mapping() {
        let f = fixture();
        assert_eq!(f.controller.power_state().await, PowerState::Inactive);
        assert_eq!(f.controller.active_source().await, InputSource::Home);
        assert_eq!(
            f.controller.current_mapping().await.get(RemoteKey::ArrowRight),
            Some("right")
        );

        f.controller.publish_initial_state();
        assert_eq!(
            f.host.pushed(),
            vec![
                Pushed::Power(PowerState::Inactive),
                Pushed::Source(InputSource::Home),
                Pushed::Mute(true)
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_player_reads_inactive_with_warning() {
        let f = fixture();
        let reading = f.controller.get_power_state().await;
        assert_eq!(reading.state, PowerState::Inactive);
        assert!(reading.warning.as_ref().is_some_and(|e| e.is_connectivity()));
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn reachable_player_is_cached_as_active() {
        let f = fixture();
        f.prober.alive.store(true, Ordering::SeqCst);
        let reading = f.controller.get_power_state().await;
        assert_eq!(reading.state, PowerState::Active);
        assert!(reading.warning.is_none());
        assert_eq!(f.controller.power_state().await, PowerState::Active);
    }

    #[tokio::test]
    async fn setting_current_power_state_sends_nothing() {
        let f = fixture();
        f.controller
            .set_power_state(PowerState::Inactive)
            .await
            .unwrap();
        assert!(f.sender.sent().is_empty());
        assert!(f.host.pushed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_toggles_once_then_switches_home_after_delay() {
        let f = fixture();
        f.controller.set_power_state(PowerState::Active).await.unwrap();

        assert_eq!(f.controller.power_state().await, PowerState::Active);
        assert_eq!(f.sender.sent(), vec!["power"]);
        assert_eq!(f.host.pushed(), vec![Pushed::Mute(false)]);
        assert!(f.controller.home_switch_pending().await);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(f.sender.sent(), vec!["power"], "HOME switch fired early");

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.sender.sent(), vec!["power", "home"]);
        assert_eq!(f.controller.active_source().await, InputSource::Home);
        assert!(f.host.pushed().contains(&Pushed::Source(InputSource::Home)));
        assert!(!f.controller.home_switch_pending().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.sender.sent().len(), 2, "HOME switch must fire exactly once");
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_cancels_pending_home_switch() {
        let f = fixture();
        f.controller.set_power_state(PowerState::Active).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        f.controller
            .set_power_state(PowerState::Inactive)
            .await
            .unwrap();
        assert!(!f.controller.home_switch_pending().await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.sender.sent(), vec!["power", "power"]);
        assert_eq!(
            f.host.pushed(),
            vec![Pushed::Mute(false), Pushed::Mute(true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_power_toggle_keeps_state_and_schedules_nothing() {
        let f = fixture();
        f.sender.fail_key("power");

        let err = assert_err!(f.controller.set_power_state(PowerState::Active).await);
        assert!(err.is_protocol());
        assert_eq!(f.controller.power_state().await, PowerState::Inactive);
        assert!(!f.controller.home_switch_pending().await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.sender.sent(), vec!["power"]);
        assert!(f.host.pushed().is_empty());
    }

    #[tokio::test]
    async fn tv_source_remaps_arrows_to_channels() {
        let f = fixture();
        f.controller.set_input_source(InputSource::Tv).await.unwrap();
        assert_eq!(f.controller.active_source().await, InputSource::Tv);

        f.controller.set_remote_key(RemoteKey::ArrowRight).await.unwrap();
        f.controller.set_remote_key(RemoteKey::ArrowLeft).await.unwrap();
        f.controller.set_remote_key(RemoteKey::ArrowUp).await.unwrap();
        assert_eq!(f.sender.sent(), vec!["tv", "prgm_inc", "prgm_dec", "up"]);
    }

    #[tokio::test]
    async fn leaving_tv_restores_directional_arrows() {
        let f = fixture();
        f.controller.set_input_source(InputSource::Tv).await.unwrap();
        f.controller
            .set_input_source(InputSource::Netflix)
            .await
            .unwrap();

        f.controller.set_remote_key(RemoteKey::ArrowRight).await.unwrap();
        assert_eq!(f.sender.sent(), vec!["tv", "netflix", "right"]);
    }

    #[tokio::test]
    async fn failed_source_switch_keeps_mapping_and_source() {
        let f = fixture();
        f.controller.set_input_source(InputSource::Tv).await.unwrap();
        f.sender.fail_key("youtube");

        let err = f
            .controller
            .set_input_source(InputSource::Youtube)
            .await
            .unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(f.controller.active_source().await, InputSource::Tv);

        f.controller.set_remote_key(RemoteKey::ArrowRight).await.unwrap();
        assert_eq!(f.sender.sent(), vec!["tv", "youtube", "prgm_inc"]);
    }

    #[tokio::test]
    async fn remote_key_failure_is_surfaced_without_state_change() {
        let f = fixture();
        f.sender.set_fail_all(true);
        assert!(f.controller.set_remote_key(RemoteKey::Select).await.is_err());
        assert_eq!(f.sender.sent(), vec!["ok"]);
        assert_eq!(f.controller.power_state().await, PowerState::Inactive);
        assert_eq!(f.controller.active_source().await, InputSource::Home);
    }

    #[tokio::test]
    async fn mute_is_negated_power() {
        let f = fixture();
        let muted = f.controller.get_mute_state().await;
        assert!(muted.muted);
        assert!(muted.warning.is_some());

        f.prober.alive.store(true, Ordering::SeqCst);
        let unmuted = f.controller.get_mute_state().await;
        assert!(!unmuted.muted);
        assert!(unmuted.warning.is_none());
    }

    #[tokio::test]
    async fn volume_steps_map_to_player_keys() {
        let f = fixture();
        f.controller.set_volume(VolumeDirection::Up).await.unwrap();
        f.controller.set_volume(VolumeDirection::Down).await.unwrap();
        assert_eq!(f.sender.sent(), vec!["vol_inc", "vol_dec"]);
    }

    #[tokio::test]
    async fn poll_tick_probes_once_and_always_pushes() {
        let f = fixture();
        assert_eq!(f.controller.poll_tick().await, PowerState::Inactive);
        assert_eq!(f.controller.poll_tick().await, PowerState::Inactive);
        assert_eq!(f.prober.probes.load(Ordering::SeqCst), 2);
        assert_eq!(
            f.host.pushed(),
            vec![
                Pushed::Power(PowerState::Inactive),
                Pushed::Mute(true),
                Pushed::Power(PowerState::Inactive),
                Pushed::Mute(true)
            ]
        );

        // Turned on with the physical remote: picked up on the next tick
        f.prober.alive.store(true, Ordering::SeqCst);
        assert_eq!(f.controller.poll_tick().await, PowerState::Active);
        assert_eq!(f.controller.power_state().await, PowerState::Active);
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn mute_follows_power_switched_outside_the_host() {
        let f = fixture();
        f.controller.publish_initial_state();
        f.prober.alive.store(true, Ordering::SeqCst);
        f.controller.poll_tick().await;

        assert_eq!(
            f.host.pushed(),
            vec![
                Pushed::Power(PowerState::Inactive),
                Pushed::Source(InputSource::Home),
                Pushed::Mute(true),
                Pushed::Power(PowerState::Active),
                Pushed::Mute(false)
            ]
        );

        f.prober.alive.store(false, Ordering::SeqCst);
        f.controller.poll_tick().await;
        assert_eq!(f.host.pushed().last(), Some(&Pushed::Mute(true)));
    }

    #[tokio::test]
    async fn poll_result_gates_the_next_power_toggle() {
        let f = fixture();
        f.prober.alive.store(true, Ordering::SeqCst);
        f.controller.poll_tick().await;

        f.controller.set_power_state(PowerState::Active).await.unwrap();
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn handle_command_records_accepted_values() {
        let f = fixture();
        let c = &f.controller;
        assert_ok!(c.handle_command(AccessoryCommand::SelectSource(InputSource::Media)).await);
        assert_ok!(c.handle_command(AccessoryCommand::Volume(VolumeDirection::Up)).await);
        assert_ok!(c.handle_command(AccessoryCommand::RemoteKey(RemoteKey::PlayPause)).await);

        f.sender.fail_key("netflix");
        assert_err!(c.handle_command(AccessoryCommand::SelectSource(InputSource::Netflix)).await);

        assert_eq!(f.sender.sent(), vec!["media", "vol_inc", "play", "netflix"]);
        assert_eq!(f.host.pushed(), vec![Pushed::Source(InputSource::Media)]);
    }
}
