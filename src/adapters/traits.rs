use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Startable - Uniform lifecycle for background services
// =============================================================================

/// Background service that can be started and stopped uniformly
/// (power poller, MQTT bridge, command dispatcher).
#[async_trait]
pub trait Startable: Send + Sync {
    /// Service name used in logs (e.g., "poller", "mqtt")
    fn name(&self) -> &'static str;

    /// Start the service. No-op if already running.
    async fn start(&self) -> Result<()>;

    /// Stop the service and wait for its task to end.
    async fn stop(&self);

    /// Whether this service can be started (e.g., has required config).
    async fn can_start(&self) -> bool {
        true
    }
}

/// Implement [`Startable`] for a type providing
/// `async fn start_internal(&self) -> Result<()>` and `async fn stop_internal(&self)`.
///
/// ```ignore
/// impl_startable!(PowerPoller, "poller");
/// impl_startable!(MqttAdapter, "mqtt", is_configured);  // custom can_start
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($service:ty, $name:literal, $can_start:ident) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $service {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }

            async fn can_start(&self) -> bool {
                self.$can_start().await
            }
        }
    };
    ($service:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $service {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }
        }
    };
}
