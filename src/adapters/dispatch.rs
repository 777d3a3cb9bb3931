//! Routes host commands from the bus to the accessory controller
//!
//! Commands run one at a time in arrival order. A failed command is logged
//! by the controller and dropped; the dispatcher keeps going.

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::impl_startable;
use crate::player::PlayerController;

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct CommandDispatcher {
    accessory_id: String,
    controller: PlayerController,
    bus: SharedBus,
    running: Mutex<Option<Running>>,
}

impl CommandDispatcher {
    pub fn new(accessory_id: impl Into<String>, controller: PlayerController, bus: SharedBus) -> Self {
        Self {
            accessory_id: accessory_id.into(),
            controller,
            bus,
            running: Mutex::new(None),
        }
    }

    async fn start_internal(&self) -> Result<()> {
        if self.running.lock().await.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut rx = self.bus.subscribe();
        let controller = self.controller.clone();
        let accessory_id = self.accessory_id.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(BusEvent::ControlCommand { accessory_id: target, command })
                            if target == accessory_id =>
                        {
                            debug!(accessory = %accessory_id, ?command, "Dispatching command");
                            if let Err(e) = controller.handle_command(command).await {
                                debug!(accessory = %accessory_id, ?command, "Command dropped: {}", e);
                            }
                        }
                        Ok(BusEvent::ShuttingDown { .. }) => {
                            info!("Command dispatcher received ShuttingDown event");
                            break;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(n)) => {
                            warn!("Command dispatcher lagged, {} events dropped", n);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        let previous = self.running.lock().await.replace(Running { cancel, task });
        if let Some(previous) = previous {
            // Lost a concurrent start race; keep only the newest loop
            previous.cancel.cancel();
        }
        info!(accessory = %self.accessory_id, "Command dispatcher started");
        Ok(())
    }

    async fn stop_internal(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                debug!("Command dispatcher task ended abnormally: {}", e);
            }
        }
    }
}

impl_startable!(CommandDispatcher, "dispatcher");
