//! Event bus between the controller, the host bridges and the command dispatcher
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! Events are typed and can carry payloads.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::accessory::AccessoryInfo;
use crate::player::{AccessoryCommand, AccessoryHost, InputSource, PowerState};

/// Event types that can be published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    // Accessory description, published once at startup
    AccessoryPublished { info: AccessoryInfo },

    // State pushed by the controller
    PowerStateChanged { accessory_id: String, state: PowerState },
    ActiveSourceChanged { accessory_id: String, source: InputSource },
    MuteChanged { accessory_id: String, muted: bool },

    // Commands from the host framework (MQTT, tests)
    ControlCommand {
        accessory_id: String,
        command: AccessoryCommand,
    },

    // Lifecycle
    ShuttingDown { reason: Option<String> },
}

impl BusEvent {
    /// Accessory this event concerns, if any
    pub fn accessory_id(&self) -> Option<&str> {
        match self {
            BusEvent::AccessoryPublished { info } => Some(&info.id),
            BusEvent::PowerStateChanged { accessory_id, .. }
            | BusEvent::ActiveSourceChanged { accessory_id, .. }
            | BusEvent::MuteChanged { accessory_id, .. }
            | BusEvent::ControlCommand { accessory_id, .. } => Some(accessory_id),
            BusEvent::ShuttingDown { .. } => None,
        }
    }
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}

/// [`AccessoryHost`] that publishes controller pushes on the bus
pub struct BusHost {
    accessory_id: String,
    bus: SharedBus,
}

impl BusHost {
    pub fn new(accessory_id: impl Into<String>, bus: SharedBus) -> Self {
        Self {
            accessory_id: accessory_id.into(),
            bus,
        }
    }
}

impl AccessoryHost for BusHost {
    fn power_state_changed(&self, state: PowerState) {
        self.bus.publish(BusEvent::PowerStateChanged {
            accessory_id: self.accessory_id.clone(),
            state,
        });
    }

    fn active_source_changed(&self, source: InputSource) {
        self.bus.publish(BusEvent::ActiveSourceChanged {
            accessory_id: self.accessory_id.clone(),
            source,
        });
    }

    fn mute_changed(&self, muted: bool) {
        self.bus.publish(BusEvent::MuteChanged {
            accessory_id: self.accessory_id.clone(),
            muted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pubsub() {
        let bus = create_bus();
        let mut rx = bus.subscribe();

        bus.publish(BusEvent::MuteChanged {
            accessory_id: "salon".to_string(),
            muted: true,
        });

        match rx.recv().await.unwrap() {
            BusEvent::MuteChanged {
                accessory_id,
                muted,
            } => {
                assert_eq!(accessory_id, "salon");
                assert!(muted);
            }
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = create_bus();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(BusEvent::ShuttingDown { reason: None });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            BusEvent::ShuttingDown { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            BusEvent::ShuttingDown { .. }
        ));
    }

    #[tokio::test]
    async fn bus_host_tags_events_with_accessory() {
        let bus = create_bus();
        let mut rx = bus.subscribe();
        let host = BusHost::new("freebox-192-168-1-10", bus.clone());

        host.power_state_changed(PowerState::Active);
        host.active_source_changed(InputSource::Tv);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.accessory_id(), Some("freebox-192-168-1-10"));
        assert!(matches!(
            first,
            BusEvent::PowerStateChanged {
                state: PowerState::Active,
                ..
            }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BusEvent::ActiveSourceChanged {
                source: InputSource::Tv,
                ..
            }
        ));
    }

    #[test]
    fn control_command_serializes_tagged() {
        let event = BusEvent::ControlCommand {
            accessory_id: "salon".to_string(),
            command: AccessoryCommand::SelectSource(InputSource::Netflix),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ControlCommand");
        assert_eq!(json["payload"]["command"]["command"], "select_source");
        assert_eq!(json["payload"]["command"]["value"], "netflix");
    }
}
