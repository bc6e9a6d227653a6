use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{transport::GatewayTransport, GatewayEvent};

pub(crate) const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

struct MonitorHandle {
    token: CancellationToken,
    worker: JoinHandle<()>,
}

/// Background connectivity poller. Probes the transport on a fixed cadence
/// and publishes only state transitions, never steady-state repeats.
#[derive(Default)]
pub(crate) struct ConnectivityMonitor {
    inner: Mutex<Option<MonitorHandle>>,
}

impl ConnectivityMonitor {
    /// Replace any running poll loop with a fresh one. The slot lock is held
    /// across the swap so concurrent starts cannot strand a stale loop.
    pub(crate) async fn start(
        &self,
        transport: Arc<dyn GatewayTransport>,
        connected: Arc<AtomicBool>,
        events: broadcast::Sender<GatewayEvent>,
    ) {
        let mut slot = self.inner.lock().await;
        if let Some(handle) = slot.take() {
            handle.token.cancel();
            let _ = handle.worker.await;
        }
        let token = CancellationToken::new();
        let worker = tokio::spawn(run_monitor(transport, connected, events, token.clone()));
        *slot = Some(MonitorHandle { token, worker });
    }

    /// Idempotent: stopping an already-stopped monitor is a no-op.
    pub(crate) async fn stop(&self) {
        let mut slot = self.inner.lock().await;
        if let Some(handle) = slot.take() {
            handle.token.cancel();
            let _ = handle.worker.await;
        }
    }
}

async fn run_monitor(
    transport: Arc<dyn GatewayTransport>,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<GatewayEvent>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let up = transport.probe().await;
        let was_up = connected.swap(up, Ordering::SeqCst);
        if up != was_up {
            info!(connected = up, "gateway connectivity changed");
            let _ = events.send(GatewayEvent::ConnectionStateChanged(up));
        }
    }
}
