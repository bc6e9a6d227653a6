use std::{future::Future, sync::Arc, time::Duration};

use shared::protocol::{GatewayRequest, GatewayResponse};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::transport::{GatewayTransport, TransportError};

// Per-call deadline bands.
pub(crate) const STATUS_DEADLINE: Duration = Duration::from_secs(15);
pub(crate) const CONTROL_DEADLINE: Duration = Duration::from_secs(30);
pub(crate) const TARGETS_DEADLINE: Duration = Duration::from_secs(60);
pub(crate) const PLANNING_DEADLINE: Duration = Duration::from_secs(120);
pub(crate) const UPLOAD_DEADLINE: Duration = Duration::from_secs(300);

/// Tracked pool of one-shot call workers.
///
/// Every in-flight unary call (and the upload) runs as one worker task.
/// Finished handles are reaped opportunistically on each spawn; the rest are
/// joined exhaustively during teardown so no worker outlives the client.
#[derive(Default)]
pub(crate) struct CallRunner {
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CallRunner {
    pub(crate) async fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut workers = self.workers.lock().await;
        workers.retain(|handle| !handle.is_finished());
        workers.push(tokio::spawn(work));
    }

    pub(crate) async fn join_all(&self) {
        let drained: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        for handle in drained {
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn unjoined(&self) -> usize {
        self.workers.lock().await.len()
    }
}

/// Perform one unary exchange under the given deadline.
pub(crate) async fn unary_call(
    transport: Arc<dyn GatewayTransport>,
    request: GatewayRequest,
    deadline: Duration,
) -> Result<GatewayResponse, TransportError> {
    match tokio::time::timeout(deadline, transport.unary(request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(TransportError::DeadlineExceeded(deadline)),
    }
}
