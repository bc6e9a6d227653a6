use std::{collections::HashMap, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use shared::protocol::{GatewayRequest, StreamPayload};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    transport::{GatewayTransport, TransportError},
    GatewayEvent,
};

/// The three long-lived subscription kinds. At most one session per kind is
/// live at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StreamKind {
    SystemState,
    Events,
    MediaDownload,
}

impl StreamKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            StreamKind::SystemState => "system state subscription",
            StreamKind::Events => "inspection event subscription",
            StreamKind::MediaDownload => "media download",
        }
    }
}

struct ActiveSession {
    token: CancellationToken,
    worker: JoinHandle<()>,
}

/// Owns the per-kind streaming sessions and their cancellation tokens.
#[derive(Default)]
pub(crate) struct SessionManager {
    sessions: Mutex<HashMap<StreamKind, ActiveSession>>,
}

impl SessionManager {
    /// Open a subscription of `kind`, superseding any active one: the old
    /// session's token is signalled and its worker awaited before the new
    /// worker is installed, so exactly one logical subscription per kind is
    /// ever live. The map lock is held across the whole swap; a concurrent
    /// start for the same kind waits here instead of racing the install.
    pub(crate) async fn start(
        &self,
        kind: StreamKind,
        transport: Arc<dyn GatewayTransport>,
        request: GatewayRequest,
        events: broadcast::Sender<GatewayEvent>,
    ) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.remove(&kind) {
            debug!(kind = kind.label(), "superseding active session");
            session.token.cancel();
            let _ = session.worker.await;
        }

        let token = CancellationToken::new();
        let worker = tokio::spawn(run_stream(kind, transport, request, events, token.clone()));
        sessions.insert(kind, ActiveSession { token, worker });
    }

    /// Cancel every active session and wait for its worker. Used both for
    /// explicit unsubscribe and for full client teardown.
    pub(crate) async fn stop_all(&self) {
        let drained: Vec<ActiveSession> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in &drained {
            session.token.cancel();
        }
        for session in drained {
            let _ = session.worker.await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Read loop for one streaming session. Items are dispatched in source
/// order; a client-initiated cancel ends the loop silently, any other
/// failure surfaces as a single kind-tagged error event.
async fn run_stream(
    kind: StreamKind,
    transport: Arc<dyn GatewayTransport>,
    request: GatewayRequest,
    events: broadcast::Sender<GatewayEvent>,
    token: CancellationToken,
) {
    let requested_media_id = match &request {
        GatewayRequest::DownloadMedia { media_id } => Some(media_id.clone()),
        _ => None,
    };

    let opened = tokio::select! {
        _ = token.cancelled() => return,
        opened = transport.server_stream(request) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(TransportError::Cancelled) => return,
        Err(err) => {
            let _ = events.send(GatewayEvent::ErrorOccurred(format!(
                "{}: {err}",
                kind.label()
            )));
            return;
        }
    };

    let mut media_data: Vec<u8> = Vec::new();
    loop {
        let item = tokio::select! {
            _ = token.cancelled() => {
                debug!(kind = kind.label(), "session cancelled");
                return;
            }
            item = stream.next() => item,
        };

        match item {
            None => break,
            Some(Ok(StreamPayload::SystemState { status })) => {
                let _ = events.send(GatewayEvent::SystemStateReceived(status));
            }
            Some(Ok(StreamPayload::InspectionEvent { event })) => {
                let _ = events.send(GatewayEvent::InspectionEventReceived(event));
            }
            Some(Ok(StreamPayload::MediaChunk { data_b64, eof, .. })) => {
                match STANDARD.decode(data_b64.as_bytes()) {
                    Ok(bytes) => media_data.extend_from_slice(&bytes),
                    Err(err) => {
                        warn!(kind = kind.label(), "invalid chunk encoding: {err}");
                        let _ = events.send(GatewayEvent::ErrorOccurred(format!(
                            "{}: invalid chunk encoding: {err}",
                            kind.label()
                        )));
                        return;
                    }
                }
                if eof {
                    break;
                }
            }
            Some(Err(TransportError::Cancelled)) => return,
            Some(Err(err)) => {
                let _ = events.send(GatewayEvent::ErrorOccurred(format!(
                    "{} ended: {err}",
                    kind.label()
                )));
                return;
            }
        }
    }

    // Graceful end. A bounded download delivers its reassembled payload as
    // one completion event; the open-ended subscriptions end silently.
    if let Some(media_id) = requested_media_id {
        let _ = events.send(GatewayEvent::MediaDownloaded {
            media_id,
            data: media_data,
        });
    }
}
