//! Zone poller
//!
//! The MTX never pushes state, so every zone is queried on a fixed interval.
//! Changes are published on the bus; polls that return nothing useful are
//! skipped and transport failures are logged without stopping the loop. The
//! client reconnects lazily on the next cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::audac::AudacClient;
use crate::bus::{BusEvent, SharedBus};
use crate::error::Result;
use crate::protocol::ZoneState;

#[derive(Default)]
struct PollerState {
    running: bool,
    connected: bool,
    last: HashMap<u8, ZoneState>,
}

#[derive(Clone)]
pub struct ZonePoller {
    client: Arc<AudacClient>,
    bus: SharedBus,
    interval: Duration,
    state: Arc<RwLock<PollerState>>,
    /// Wrapped in RwLock to allow creating fresh token on restart
    shutdown: Arc<RwLock<CancellationToken>>,
}

impl ZonePoller {
    pub fn new(client: Arc<AudacClient>, bus: SharedBus, interval: Duration) -> Self {
        Self {
            client,
            bus,
            interval,
            state: Arc::new(RwLock::new(PollerState::default())),
            shutdown: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    /// Last state seen for a zone, if any
    pub async fn zone_state(&self, zone: u8) -> Option<ZoneState> {
        self.state.read().await.last.get(&zone).copied()
    }

    /// Query every zone once, publishing changed states.
    ///
    /// Stops at the first transport failure; the remaining zones would only
    /// wait out the same timeout.
    pub async fn poll_once(&self) -> Result<()> {
        for zone in 1..=self.client.zones() {
            let reply = match self.client.get_zone_info(zone).await {
                Ok(reply) => reply,
                Err(e) => {
                    if e.is_connection_error() {
                        self.set_connected(false).await;
                    }
                    return Err(e);
                }
            };
            self.set_connected(true).await;

            let Some(state) = reply else {
                debug!("No usable state for zone {} this cycle", zone);
                continue;
            };

            let changed = {
                let mut poller = self.state.write().await;
                poller.last.insert(zone, state) != Some(state)
            };
            if changed {
                self.bus.publish(BusEvent::ZoneStateChanged {
                    zone,
                    state,
                    volume_percent: state.volume_percent(),
                });
            }
        }
        Ok(())
    }

    async fn set_connected(&self, connected: bool) {
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.connected != connected;
            state.connected = connected;
            if !connected {
                // Republish everything once the device is back
                state.last.clear();
            }
            changed
        };
        if !changed {
            return;
        }

        let host = self.client.settings().host.clone();
        if connected {
            self.bus.publish(BusEvent::MatrixConnected { host });
        } else {
            self.bus.publish(BusEvent::MatrixDisconnected { host });
        }
    }

    /// Start polling (internal - use Startable trait)
    async fn start_internal(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.write().await;
            if state.running {
                return Ok(());
            }
            state.running = true;
        }

        // Previous token may be cancelled
        let shutdown = {
            let mut token = self.shutdown.write().await;
            *token = CancellationToken::new();
            token.clone()
        };

        let poller = self.clone();
        tokio::spawn(async move { run_polling_loop(poller, shutdown).await });

        info!(
            "Zone polling started for {} zones every {:?}",
            self.client.zones(),
            self.interval
        );
        Ok(())
    }

    /// Stop polling (internal - use Startable trait)
    async fn stop_internal(&self) {
        self.shutdown.read().await.cancel();
        self.state.write().await.running = false;
    }
}

crate::impl_startable!(ZonePoller, "zone_poller");

async fn run_polling_loop(poller: ZonePoller, shutdown: CancellationToken) {
    let mut poll_timer = interval(poller.interval);
    poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Zone polling shutting down");
                break;
            }
            _ = poll_timer.tick() => {
                match poller.poll_once().await {
                    Ok(()) => {
                        if consecutive_failures > 0 {
                            debug!("Zone poll succeeded after {} failures", consecutive_failures);
                            consecutive_failures = 0;
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!("Zone poll failed ({} in a row): {}", consecutive_failures, e);
                    }
                }
            }
        }
    }

    info!("Zone polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Startable;
    use crate::bus::create_bus;
    use crate::config::MatrixSettings;

    fn poller() -> ZonePoller {
        let client = Arc::new(AudacClient::new(MatrixSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_ms: 200,
            ..MatrixSettings::default()
        }));
        ZonePoller::new(client, create_bus(), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn start_and_stop_toggle_running() {
        let poller = poller();
        assert_eq!(poller.name(), "zone_poller");
        assert!(!poller.is_running().await);

        poller.start().await.unwrap();
        assert!(poller.is_running().await);
        // Second start is a no-op
        poller.start().await.unwrap();
        assert!(poller.is_running().await);

        poller.stop().await;
        assert!(!poller.is_running().await);
    }

    #[tokio::test]
    async fn no_state_before_first_poll() {
        let poller = poller();
        assert_eq!(poller.zone_state(1).await, None);
    }
}
