//! TCP reachability probe, used as a proxy for the Player's power state
//!
//! The Player only opens its probe port while awake, so a successful TCP
//! handshake within the timeout means "powered on".

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::PlayerError;

/// Default bound on a single connect attempt
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Default number of connect attempts per probe
pub const PROBE_ATTEMPTS: u32 = 1;

/// Result of a reachability probe. Never an error by itself: a failed probe
/// is `alive == false` with the reason attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub alive: bool,
    /// Fastest successful handshake
    pub round_trip: Option<Duration>,
    pub error: Option<PlayerError>,
}

impl ProbeOutcome {
    pub fn alive(round_trip: Duration) -> Self {
        Self {
            alive: true,
            round_trip: Some(round_trip),
            error: None,
        }
    }

    pub fn dead(error: PlayerError) -> Self {
        Self {
            alive: false,
            round_trip: None,
            error: Some(error),
        }
    }
}

/// Reachability check seam, so the controller can be driven without a network
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, hostname: &str, port: u16) -> ProbeOutcome;
}

/// Probe `hostname:port` with `attempts` TCP connects, each bounded by `limit`.
///
/// Alive as soon as one attempt yields a round-trip measurement.
pub async fn probe(hostname: &str, port: u16, limit: Duration, attempts: u32) -> ProbeOutcome {
    let target = format!("{}:{}", hostname, port);
    let mut best: Option<Duration> = None;
    let mut last_error = None;

    for attempt in 1..=attempts.max(1) {
        let start = Instant::now();
        match timeout(limit, TcpStream::connect((hostname, port))).await {
            Ok(Ok(_stream)) => {
                let rtt = start.elapsed();
                best = Some(best.map_or(rtt, |b| b.min(rtt)));
            }
            Ok(Err(e)) => {
                debug!(target = %target, attempt, "Probe connect failed: {}", e);
                last_error = Some(e.to_string());
            }
            Err(_) => {
                debug!(target = %target, attempt, "Probe timed out after {:?}", limit);
                last_error = Some(format!("timed out after {}ms", limit.as_millis()));
            }
        }
    }

    match best {
        Some(rtt) => {
            debug!(target = %target, rtt_ms = rtt.as_millis() as u64, "Probe succeeded");
            ProbeOutcome::alive(rtt)
        }
        None => ProbeOutcome::dead(PlayerError::Connectivity {
            operation: "power probe",
            target,
            reason: last_error.unwrap_or_else(|| "no attempt made".to_string()),
        }),
    }
}

/// Prober backed by real TCP connects
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
    attempts: u32,
}

impl TcpProber {
    pub fn new(timeout: Duration, attempts: u32) -> Self {
        Self { timeout, attempts }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT, PROBE_ATTEMPTS)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, hostname: &str, port: u16) -> ProbeOutcome {
        probe(hostname, port, self.timeout, self.attempts).await
    }
}
