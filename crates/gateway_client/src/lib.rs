//! Asynchronous client core for the inspection gateway.
//!
//! [`GatewayClient`] is the single entry point the UI layer talks to. Every
//! call is fire-and-forget: it spawns a tracked worker and the outcome comes
//! back on the broadcast event channel, so consumers never block on the
//! network. Streaming subscriptions are owned by a per-kind session manager
//! and a background monitor reports connectivity transitions.

pub mod http;
pub mod transport;

mod calls;
mod monitor;
mod sessions;
mod upload;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::{
    domain::{
        CaptureConfig, CaptureRecord, InspectionEvent, InspectionTarget, NavMapInfo, PlanOptions,
        PlanRecord, PlanSummary, TaskStatus,
    },
    error::RpcResult,
    protocol::{GatewayRequest, GatewayResponse},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    calls::{
        unary_call, CallRunner, CONTROL_DEADLINE, PLANNING_DEADLINE, STATUS_DEADLINE,
        TARGETS_DEADLINE, UPLOAD_DEADLINE,
    },
    http::HttpTransportFactory,
    monitor::ConnectivityMonitor,
    sessions::{SessionManager, StreamKind},
    transport::{GatewayTransport, TransportError, TransportFactory},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything the client reports back to its consumer, in completion order.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    ConnectionStateChanged(bool),
    ErrorOccurred(String),
    UploadCadProgress(u8),
    UploadCadFinished { result: RpcResult, model_id: String },
    SetTargetsFinished { result: RpcResult, total_targets: u32 },
    PlanInspectionFinished { result: RpcResult, plan: PlanSummary },
    GetPlanFinished { result: RpcResult, plan: PlanRecord },
    StartInspectionFinished { result: RpcResult, task_id: String },
    ControlTaskFinished { result: RpcResult },
    TaskStatusReceived(TaskStatus),
    SystemStateReceived(TaskStatus),
    InspectionEventReceived(InspectionEvent),
    NavMapReceived { result: RpcResult, map: NavMapInfo },
    CapturesReceived { result: RpcResult, captures: Vec<CaptureRecord> },
    MediaDownloaded { media_id: String, data: Vec<u8> },
}

struct ConnectionState {
    address: String,
    transport: Arc<dyn GatewayTransport>,
}

/// Facade over the gateway connection, call workers, streaming sessions and
/// the connectivity monitor.
pub struct GatewayClient {
    factory: Arc<dyn TransportFactory>,
    /// Serializes connect/disconnect so overlapping lifecycle calls cannot
    /// interleave teardown with a fresh install.
    lifecycle: Mutex<()>,
    inner: Mutex<Option<ConnectionState>>,
    connected: Arc<AtomicBool>,
    monitor: ConnectivityMonitor,
    calls: CallRunner,
    sessions: SessionManager,
    events: broadcast::Sender<GatewayEvent>,
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayClient {
    pub fn new() -> Self {
        Self::with_transport_factory(Arc::new(HttpTransportFactory))
    }

    /// Build a client over a custom transport seam. Tests use this to run
    /// the full call pipeline against in-process fakes.
    pub fn with_transport_factory(factory: Arc<dyn TransportFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            factory,
            lifecycle: Mutex::new(()),
            inner: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            monitor: ConnectivityMonitor::default(),
            calls: CallRunner::default(),
            sessions: SessionManager::default(),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn current_address(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .as_ref()
            .map(|state| state.address.clone())
    }

    /// Establish a channel to the gateway at `address`, replacing any
    /// previous connection. Reachability is then reported asynchronously by
    /// the connectivity monitor.
    pub async fn connect(&self, address: &str) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
        let transport = match self.factory.create(address) {
            Ok(transport) => transport,
            Err(err) => {
                warn!(address, "connect rejected: {err}");
                let _ = self
                    .events
                    .send(GatewayEvent::ErrorOccurred(format!("connect: {err}")));
                return;
            }
        };
        info!(address, "gateway channel created");
        *self.inner.lock().await = Some(ConnectionState {
            address: address.to_string(),
            transport: Arc::clone(&transport),
        });
        self.monitor
            .start(transport, Arc::clone(&self.connected), self.events.clone())
            .await;
    }

    /// Ordered teardown: streaming sessions first, then the monitor, then
    /// every outstanding call worker, and only then the channel itself.
    /// Idempotent, and safe to call while calls are in flight.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.sessions.stop_all().await;
        self.monitor.stop().await;
        self.calls.join_all().await;
        let previous = self.inner.lock().await.take();
        if previous.is_some() {
            info!("gateway channel closed");
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self
                .events
                .send(GatewayEvent::ConnectionStateChanged(false));
        }
    }

    /// Current transport, or `None` with no connection established.
    async fn transport(&self) -> Option<Arc<dyn GatewayTransport>> {
        self.inner
            .lock()
            .await
            .as_ref()
            .map(|state| Arc::clone(&state.transport))
    }

    fn not_connected() -> RpcResult {
        RpcResult::unavailable("not connected")
    }

    fn unexpected_response(response: &GatewayResponse) -> RpcResult {
        RpcResult::internal(format!("unexpected gateway response: {response:?}"))
    }

    /// Stream the CAD model at `path` to the gateway in fixed-size chunks.
    /// Progress and the single completion outcome arrive as events.
    pub async fn upload_cad(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::UploadCadFinished {
                result: Self::not_connected(),
                model_id: String::new(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let outcome = tokio::time::timeout(
                    UPLOAD_DEADLINE,
                    upload::run_upload(transport, path, events.clone()),
                )
                .await;
                if outcome.is_err() {
                    let _ = events.send(GatewayEvent::UploadCadFinished {
                        result: TransportError::DeadlineExceeded(UPLOAD_DEADLINE).into(),
                        model_id: String::new(),
                    });
                }
            })
            .await;
    }

    pub async fn set_inspection_targets(
        &self,
        model_id: String,
        targets: Vec<InspectionTarget>,
        capture: CaptureConfig,
        operator_id: String,
    ) {
        let request = GatewayRequest::SetInspectionTargets {
            model_id,
            targets,
            capture,
            operator_id,
        };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::SetTargetsFinished {
                result: Self::not_connected(),
                total_targets: 0,
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, TARGETS_DEADLINE).await {
                    Ok(GatewayResponse::SetInspectionTargets {
                        result,
                        total_targets,
                    }) => GatewayEvent::SetTargetsFinished {
                        result,
                        total_targets,
                    },
                    Ok(other) => GatewayEvent::SetTargetsFinished {
                        result: Self::unexpected_response(&other),
                        total_targets: 0,
                    },
                    Err(err) => GatewayEvent::SetTargetsFinished {
                        result: err.into(),
                        total_targets: 0,
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn plan_inspection(&self, model_id: String, task_name: String, options: PlanOptions) {
        let request = GatewayRequest::PlanInspection {
            model_id,
            task_name,
            options,
        };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::PlanInspectionFinished {
                result: Self::not_connected(),
                plan: PlanSummary::default(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, PLANNING_DEADLINE).await {
                    Ok(GatewayResponse::PlanInspection { result, plan }) => {
                        GatewayEvent::PlanInspectionFinished { result, plan }
                    }
                    Ok(other) => GatewayEvent::PlanInspectionFinished {
                        result: Self::unexpected_response(&other),
                        plan: PlanSummary::default(),
                    },
                    Err(err) => GatewayEvent::PlanInspectionFinished {
                        result: err.into(),
                        plan: PlanSummary::default(),
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn get_plan(&self, plan_id: String) {
        let request = GatewayRequest::GetPlan { plan_id };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::GetPlanFinished {
                result: Self::not_connected(),
                plan: PlanRecord::default(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, CONTROL_DEADLINE).await {
                    Ok(GatewayResponse::GetPlan { result, plan }) => {
                        GatewayEvent::GetPlanFinished { result, plan }
                    }
                    Ok(other) => GatewayEvent::GetPlanFinished {
                        result: Self::unexpected_response(&other),
                        plan: PlanRecord::default(),
                    },
                    Err(err) => GatewayEvent::GetPlanFinished {
                        result: err.into(),
                        plan: PlanRecord::default(),
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn start_inspection(&self, plan_id: String, dry_run: bool) {
        let request = GatewayRequest::StartInspection { plan_id, dry_run };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::StartInspectionFinished {
                result: Self::not_connected(),
                task_id: String::new(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, CONTROL_DEADLINE).await {
                    Ok(GatewayResponse::StartInspection { result, task_id }) => {
                        GatewayEvent::StartInspectionFinished { result, task_id }
                    }
                    Ok(other) => GatewayEvent::StartInspectionFinished {
                        result: Self::unexpected_response(&other),
                        task_id: String::new(),
                    },
                    Err(err) => GatewayEvent::StartInspectionFinished {
                        result: err.into(),
                        task_id: String::new(),
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn pause_inspection(&self, task_id: String, reason: String) {
        self.control_task(GatewayRequest::PauseInspection { task_id, reason })
            .await;
    }

    pub async fn resume_inspection(&self, task_id: String, reason: String) {
        self.control_task(GatewayRequest::ResumeInspection { task_id, reason })
            .await;
    }

    pub async fn stop_inspection(&self, task_id: String, reason: String) {
        self.control_task(GatewayRequest::StopInspection { task_id, reason })
            .await;
    }

    async fn control_task(&self, request: GatewayRequest) {
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::ControlTaskFinished {
                result: Self::not_connected(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let result = match unary_call(transport, request, CONTROL_DEADLINE).await {
                    Ok(GatewayResponse::ControlTask { result }) => result,
                    Ok(other) => Self::unexpected_response(&other),
                    Err(err) => err.into(),
                };
                let _ = events.send(GatewayEvent::ControlTaskFinished { result });
            })
            .await;
    }

    /// One-shot status poll; a successful answer arrives as
    /// [`GatewayEvent::TaskStatusReceived`], any failure as an error event.
    pub async fn get_task_status(&self, task_id: String) {
        let request = GatewayRequest::GetTaskStatus { task_id };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::ErrorOccurred(
                "task status query: not connected".into(),
            ));
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, STATUS_DEADLINE).await {
                    Ok(GatewayResponse::GetTaskStatus { result, status }) if result.is_ok() => {
                        GatewayEvent::TaskStatusReceived(status)
                    }
                    Ok(GatewayResponse::GetTaskStatus { result, .. }) => {
                        GatewayEvent::ErrorOccurred(format!(
                            "task status query failed: {}",
                            result.message
                        ))
                    }
                    Ok(other) => GatewayEvent::ErrorOccurred(format!(
                        "task status query failed: {}",
                        Self::unexpected_response(&other).message
                    )),
                    Err(err) => {
                        GatewayEvent::ErrorOccurred(format!("task status query failed: {err}"))
                    }
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn get_nav_map(&self, map_id: String, include_image_thumbnail: bool) {
        let request = GatewayRequest::GetNavMap {
            map_id,
            include_image_thumbnail,
        };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::NavMapReceived {
                result: Self::not_connected(),
                map: NavMapInfo::default(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, CONTROL_DEADLINE).await {
                    Ok(GatewayResponse::GetNavMap { result, map }) => {
                        GatewayEvent::NavMapReceived { result, map }
                    }
                    Ok(other) => GatewayEvent::NavMapReceived {
                        result: Self::unexpected_response(&other),
                        map: NavMapInfo::default(),
                    },
                    Err(err) => GatewayEvent::NavMapReceived {
                        result: err.into(),
                        map: NavMapInfo::default(),
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    pub async fn list_captures(&self, task_id: String, point_id: i32, include_thumbnails: bool) {
        let request = GatewayRequest::ListCaptures {
            task_id,
            point_id,
            include_thumbnails,
        };
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::CapturesReceived {
                result: Self::not_connected(),
                captures: Vec::new(),
            });
            return;
        };
        let events = self.events.clone();
        self.calls
            .spawn(async move {
                let event = match unary_call(transport, request, CONTROL_DEADLINE).await {
                    Ok(GatewayResponse::ListCaptures { result, captures }) => {
                        GatewayEvent::CapturesReceived { result, captures }
                    }
                    Ok(other) => GatewayEvent::CapturesReceived {
                        result: Self::unexpected_response(&other),
                        captures: Vec::new(),
                    },
                    Err(err) => GatewayEvent::CapturesReceived {
                        result: err.into(),
                        captures: Vec::new(),
                    },
                };
                let _ = events.send(event);
            })
            .await;
    }

    /// Subscribe to system state snapshots. Supersedes any previous system
    /// state subscription.
    pub async fn subscribe_system_state(&self, task_id: String, include_snapshot: bool) {
        self.open_subscription(
            StreamKind::SystemState,
            GatewayRequest::SubscribeSystemState {
                task_id,
                include_snapshot,
            },
        )
        .await;
    }

    /// Subscribe to discrete inspection events. Supersedes any previous
    /// inspection event subscription.
    pub async fn subscribe_inspection_events(&self, task_id: String, include_snapshot: bool) {
        self.open_subscription(
            StreamKind::Events,
            GatewayRequest::SubscribeInspectionEvents {
                task_id,
                include_snapshot,
            },
        )
        .await;
    }

    /// Fetch a media asset as a chunked stream; the reassembled bytes arrive
    /// as one [`GatewayEvent::MediaDownloaded`].
    pub async fn download_media(&self, media_id: String) {
        self.open_subscription(
            StreamKind::MediaDownload,
            GatewayRequest::DownloadMedia { media_id },
        )
        .await;
    }

    async fn open_subscription(&self, kind: StreamKind, request: GatewayRequest) {
        let Some(transport) = self.transport().await else {
            let _ = self.events.send(GatewayEvent::ErrorOccurred(format!(
                "{}: not connected",
                kind.label()
            )));
            return;
        };
        self.sessions
            .start(kind, transport, request, self.events.clone())
            .await;
    }

    /// Cancel every streaming session without tearing down the connection.
    pub async fn stop_subscriptions(&self) {
        self.sessions.stop_all().await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod http_tests;
