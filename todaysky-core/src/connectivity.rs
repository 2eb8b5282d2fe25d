//! Reachability flag shared between whoever observes the network and the
//! refresher that depends on it.

use std::time::Duration;

use tokio::{sync::watch, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Holds the current connected state and broadcasts transitions.
///
/// Starts out connected. Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current state. Returns `true` if it changed; subscribers
    /// are only woken on a change.
    pub fn set_connected(&self, connected: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            tracing::info!(connected, "network status changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Probe `url` with a HEAD request and record the outcome.
    ///
    /// Any HTTP response counts as connected; only transport failures do not.
    pub async fn probe(&self, http: &reqwest::Client, url: &str) -> bool {
        let connected = http
            .head(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok();
        self.set_connected(connected);
        connected
    }

    /// Probe `url` every `every` until `shutdown` fires.
    pub async fn watch_network(self, url: String, every: Duration, shutdown: CancellationToken) {
        let http = crate::provider::http_client();
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.probe(&http, &url).await;
                }
            }
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
