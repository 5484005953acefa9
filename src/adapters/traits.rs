use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Startable - Uniform background task lifecycle trait
// =============================================================================

/// Trait for background tasks that can be started/stopped uniformly.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Task name (e.g., "zone_poller")
    fn name(&self) -> &'static str;

    /// Start the task. No-op if already running.
    async fn start(&self) -> Result<()>;

    /// Stop the task gracefully.
    async fn stop(&self);
}

/// Macro to implement Startable trait with minimal boilerplate.
///
/// Implementors must provide:
/// - `async fn start_internal(&self) -> Result<()>`
/// - `async fn stop_internal(&self)`
///
/// Usage:
/// ```ignore
/// impl_startable!(ZonePoller, "zone_poller");
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($task:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $task {
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
