//! Freebox Player Control
//!
//! Runs one Player accessory: power polling, command dispatch and, when
//! configured, the MQTT bridge.

use freebox_player_control::accessory::AccessoryInfo;
use freebox_player_control::adapters::{CommandDispatcher, Startable};
use freebox_player_control::bus::{self, BusEvent, BusHost};
use freebox_player_control::config;
use freebox_player_control::player::probe::PROBE_ATTEMPTS;
use freebox_player_control::player::{HttpRemote, PlayerController, PowerPoller, TcpProber};

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freebox_player_control=debug,rumqttc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Freebox Player Control v{} ({})",
        env!("FPC_VERSION"),
        env!("FPC_GIT_SHA")
    );

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            return Err(e);
        }
    };
    let player = &config.player;
    tracing::info!(
        "Configuration loaded for {} at {} (probe port {}, poll every {}ms)",
        player.name,
        player.hostname,
        player.power_probe_port,
        player.poll_interval_ms
    );

    let bus = bus::create_bus();
    let info = AccessoryInfo::new(&player.name, &player.hostname);
    let accessory_id = info.id.clone();

    let endpoint = player.endpoint();
    let remote = HttpRemote::new(endpoint.clone(), player.network_timeout())?;
    let prober = TcpProber::new(player.network_timeout(), PROBE_ATTEMPTS);
    let controller = PlayerController::new(
        endpoint,
        Arc::new(prober),
        Arc::new(remote),
        Arc::new(BusHost::new(accessory_id.clone(), bus.clone())),
        player.timings(),
    );

    #[cfg_attr(not(feature = "mqtt"), allow(unused_mut))]
    let mut services: Vec<Arc<dyn Startable>> = vec![
        Arc::new(CommandDispatcher::new(
            accessory_id.clone(),
            controller.clone(),
            bus.clone(),
        )),
        Arc::new(PowerPoller::new(controller.clone(), player.poll_interval())),
    ];

    #[cfg(feature = "mqtt")]
    if let Some(ref mqtt_config) = config.mqtt {
        let mqtt = freebox_player_control::adapters::mqtt::MqttAdapter::new(
            bus.clone(),
            accessory_id.clone(),
        );
        mqtt.configure(
            mqtt_config.host.clone(),
            Some(mqtt_config.port),
            mqtt_config.username.clone(),
            mqtt_config.password.clone(),
            mqtt_config.topic_prefix.clone(),
        )
        .await;
        services.push(Arc::new(mqtt));
    }

    for service in &services {
        if !service.can_start().await {
            continue;
        }
        if let Err(e) = service.start().await {
            tracing::warn!("Failed to start {}: {}", service.name(), e);
        } else {
            tracing::info!("{} started", service.name());
        }
    }

    // Announce the accessory and its forced initial state
    bus.publish(BusEvent::AccessoryPublished { info });
    controller.publish_initial_state();

    shutdown_signal().await;

    tracing::info!("Shutting down services...");
    bus.publish(BusEvent::ShuttingDown {
        reason: Some("signal".to_string()),
    });
    for service in services.iter().rev() {
        service.stop().await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
