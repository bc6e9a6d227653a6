use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::Stream;
use shared::{
    domain::{
        CaptureConfig, InspectionEvent, InspectionPath, InspectionPoint, PlanOptions, PlanSummary,
        TaskPhase, TaskStatus,
    },
    error::{ErrorCode, RpcResult},
    protocol::{GatewayRequest, GatewayResponse, StreamPayload, UploadCadChunk},
};
use tokio::sync::broadcast;

use crate::{
    transport::{
        GatewayTransport, PayloadStream, TransportError, TransportFactory, UploadStream,
    },
    GatewayClient, GatewayEvent,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct StreamScript {
    items: Vec<Result<StreamPayload, TransportError>>,
    /// Never yield anything after `items`; the stream only ends by cancel.
    stay_open: bool,
}

struct ScriptedStream {
    items: VecDeque<Result<StreamPayload, TransportError>>,
    stay_open: bool,
    live: Arc<AtomicUsize>,
}

impl Stream for ScriptedStream {
    type Item = Result<StreamPayload, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.items.pop_front() {
            Poll::Ready(Some(item))
        } else if self.stay_open {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeTransport {
    probe_up: AtomicBool,
    probe_count: AtomicUsize,
    stream_open_delay: Mutex<Option<Duration>>,
    hang_unary: AtomicBool,
    unary_responses: Mutex<VecDeque<Result<GatewayResponse, TransportError>>>,
    requests_seen: Mutex<Vec<GatewayRequest>>,
    stream_scripts: Mutex<VecDeque<StreamScript>>,
    live_streams: Arc<AtomicUsize>,
    upload_chunks: Arc<Mutex<Vec<UploadCadChunk>>>,
    upload_ack: Mutex<Option<Result<GatewayResponse, TransportError>>>,
    fail_upload_open: AtomicBool,
    fail_write_at: Mutex<Option<u32>>,
}

impl FakeTransport {
    fn push_unary(&self, response: Result<GatewayResponse, TransportError>) {
        self.unary_responses.lock().unwrap().push_back(response);
    }

    fn push_stream(&self, items: Vec<Result<StreamPayload, TransportError>>, stay_open: bool) {
        self.stream_scripts
            .lock()
            .unwrap()
            .push_back(StreamScript { items, stay_open });
    }

    fn set_upload_ack(&self, ack: Result<GatewayResponse, TransportError>) {
        *self.upload_ack.lock().unwrap() = Some(ack);
    }
}

#[async_trait]
impl GatewayTransport for FakeTransport {
    async fn probe(&self) -> bool {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        self.probe_up.load(Ordering::SeqCst)
    }

    async fn unary(&self, request: GatewayRequest) -> Result<GatewayResponse, TransportError> {
        self.requests_seen.lock().unwrap().push(request);
        if self.hang_unary.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.unary_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Internal("no scripted response".into())))
    }

    async fn server_stream(
        &self,
        _request: GatewayRequest,
    ) -> Result<PayloadStream, TransportError> {
        let delay = *self.stream_open_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let script = self
            .stream_scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Unavailable("no scripted stream".into()))?;
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(ScriptedStream {
            items: script.items.into(),
            stay_open: script.stay_open,
            live: Arc::clone(&self.live_streams),
        }))
    }

    async fn open_upload(&self) -> Result<Box<dyn UploadStream>, TransportError> {
        if self.fail_upload_open.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("upload refused".into()));
        }
        Ok(Box::new(FakeUploadSink {
            chunks: Arc::clone(&self.upload_chunks),
            ack: self.upload_ack.lock().unwrap().take(),
            fail_at: *self.fail_write_at.lock().unwrap(),
        }))
    }
}

struct FakeUploadSink {
    chunks: Arc<Mutex<Vec<UploadCadChunk>>>,
    ack: Option<Result<GatewayResponse, TransportError>>,
    fail_at: Option<u32>,
}

#[async_trait]
impl UploadStream for FakeUploadSink {
    async fn write_chunk(&mut self, chunk: UploadCadChunk) -> Result<(), TransportError> {
        if self.fail_at == Some(chunk.chunk_index) {
            return Err(TransportError::Internal("socket reset".into()));
        }
        self.chunks.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<GatewayResponse, TransportError> {
        self.ack
            .take()
            .unwrap_or_else(|| Err(TransportError::Internal("no scripted ack".into())))
    }
}

struct FakeFactory {
    transport: Arc<FakeTransport>,
}

impl TransportFactory for FakeFactory {
    fn create(&self, _address: &str) -> Result<Arc<dyn GatewayTransport>, TransportError> {
        Ok(Arc::clone(&self.transport) as Arc<dyn GatewayTransport>)
    }
}

fn client_over(transport: &Arc<FakeTransport>) -> GatewayClient {
    GatewayClient::with_transport_factory(Arc::new(FakeFactory {
        transport: Arc::clone(transport),
    }))
}

// Longer than any call deadline exercised here, so paused-clock tests can
// auto-advance into a timeout without tripping this first.
async fn recv(rx: &mut broadcast::Receiver<GatewayEvent>) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("no event within deadline")
        .expect("event channel closed")
}

async fn wait_for_live_streams(transport: &FakeTransport, expected: usize) {
    for _ in 0..200 {
        if transport.live_streams.load(Ordering::SeqCst) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "live stream count never reached {expected}, still {}",
        transport.live_streams.load(Ordering::SeqCst)
    );
}

fn sample_path(points: u32) -> InspectionPath {
    InspectionPath {
        waypoints: (0..points)
            .map(|i| InspectionPoint {
                point_id: i as i32 + 1,
                ..Default::default()
            })
            .collect(),
        total_points: points,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Unary calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn calls_without_connection_fail_fast() {
    let transport = Arc::new(FakeTransport::default());
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();

    client
        .plan_inspection("model-1".into(), "hull scan".into(), PlanOptions::default())
        .await;

    match recv(&mut rx).await {
        GatewayEvent::PlanInspectionFinished { result, .. } => {
            assert_eq!(result.code, ErrorCode::Unavailable);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    // No worker may be spawned for a short-circuited call.
    assert_eq!(client.calls.unjoined().await, 0);
    assert!(transport.requests_seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plan_inspection_delivers_summary() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_unary(Ok(GatewayResponse::PlanInspection {
        result: RpcResult::ok(),
        plan: PlanSummary {
            plan_id: "plan-7".into(),
            path: sample_path(3),
            ..Default::default()
        },
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client
        .plan_inspection("model-1".into(), "hull scan".into(), PlanOptions::default())
        .await;

    match recv(&mut rx).await {
        GatewayEvent::PlanInspectionFinished { result, plan } => {
            assert!(result.is_ok());
            assert_eq!(plan.plan_id, "plan-7");
            assert_eq!(plan.path.waypoints.len(), 3);
            assert_eq!(plan.path.total_points, 3);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

#[tokio::test]
async fn mismatched_response_variant_maps_to_internal() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_unary(Ok(GatewayResponse::ControlTask {
        result: RpcResult::ok(),
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.get_plan("plan-7".into()).await;

    match recv(&mut rx).await {
        GatewayEvent::GetPlanFinished { result, .. } => {
            assert_eq!(result.code, ErrorCode::Internal);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

#[tokio::test]
async fn busy_control_result_is_passed_through() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_unary(Ok(GatewayResponse::ControlTask {
        result: RpcResult::new(ErrorCode::Busy, "task already pausing"),
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client
        .pause_inspection("task-1".into(), "operator request".into())
        .await;

    match recv(&mut rx).await {
        GatewayEvent::ControlTaskFinished { result } => {
            assert_eq!(result.code, ErrorCode::Busy);
            assert_eq!(result.message, "task already pausing");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_unary_call_times_out_as_internal() {
    let transport = Arc::new(FakeTransport::default());
    transport.hang_unary.store(true, Ordering::SeqCst);
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client
        .stop_inspection("task-1".into(), "shift end".into())
        .await;

    // Paused time auto-advances past the 30 s control deadline.
    match recv(&mut rx).await {
        GatewayEvent::ControlTaskFinished { result } => {
            assert_eq!(result.code, ErrorCode::Internal);
            assert!(result.message.contains("deadline exceeded"), "{result:?}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn failed_status_query_becomes_error_event() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_unary(Ok(GatewayResponse::GetTaskStatus {
        result: RpcResult::new(ErrorCode::NotFound, "no such task"),
        status: TaskStatus::default(),
    }));
    transport.push_unary(Ok(GatewayResponse::GetTaskStatus {
        result: RpcResult::ok(),
        status: TaskStatus {
            task_id: "task-1".into(),
            phase: TaskPhase::Executing,
            ..Default::default()
        },
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.get_task_status("task-9".into()).await;
    match recv(&mut rx).await {
        GatewayEvent::ErrorOccurred(message) => assert!(message.contains("no such task")),
        other => panic!("unexpected event: {other:?}"),
    }

    client.get_task_status("task-1".into()).await;
    match recv(&mut rx).await {
        GatewayEvent::TaskStatusReceived(status) => {
            assert_eq!(status.task_id, "task-1");
            assert_eq!(status.phase, TaskPhase::Executing);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

// ---------------------------------------------------------------------------
// Streaming sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_items_are_dispatched_in_order() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_stream(
        (1..=3)
            .map(|i| {
                Ok(StreamPayload::InspectionEvent {
                    event: InspectionEvent {
                        task_id: "task-1".into(),
                        point_id: i,
                        ..Default::default()
                    },
                })
            })
            .collect(),
        false,
    );
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.subscribe_inspection_events("task-1".into(), false).await;

    for expected in 1..=3 {
        match recv(&mut rx).await {
            GatewayEvent::InspectionEventReceived(event) => {
                assert_eq!(event.point_id, expected);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    client.disconnect().await;
}

#[tokio::test]
async fn resubscribing_supersedes_the_previous_session() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_stream(Vec::new(), true);
    transport.push_stream(Vec::new(), true);
    let client = client_over(&transport);
    client.connect("http://gateway.test").await;

    client.subscribe_system_state(String::new(), true).await;
    wait_for_live_streams(&transport, 1).await;
    // Superseding must fully tear the first session down, never stack two.
    client.subscribe_system_state("task-1".into(), true).await;
    wait_for_live_streams(&transport, 1).await;
    assert_eq!(client.sessions.active_count().await, 1);
    client.disconnect().await;
    assert_eq!(transport.live_streams.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_resubscribes_leave_one_session() {
    let transport = Arc::new(FakeTransport::default());
    for _ in 0..3 {
        transport.push_stream(Vec::new(), true);
    }
    // Slow opens widen the window between superseding and going live.
    *transport.stream_open_delay.lock().unwrap() = Some(Duration::from_millis(20));
    let client = client_over(&transport);
    client.connect("http://gateway.test").await;

    client.subscribe_system_state(String::new(), true).await;
    tokio::join!(
        client.subscribe_system_state("task-1".into(), true),
        client.subscribe_system_state("task-2".into(), true),
    );

    wait_for_live_streams(&transport, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.live_streams.load(Ordering::SeqCst), 1);
    assert_eq!(client.sessions.active_count().await, 1);

    client.disconnect().await;
    assert_eq!(transport.live_streams.load(Ordering::SeqCst), 0);
    assert_eq!(client.sessions.active_count().await, 0);
}

#[tokio::test]
async fn cancelled_session_stays_silent() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_stream(Vec::new(), true);
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.subscribe_system_state(String::new(), false).await;
    client.stop_subscriptions().await;

    assert_eq!(client.sessions.active_count().await, 0);
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn broken_stream_reports_one_tagged_error() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_stream(
        vec![
            Ok(StreamPayload::SystemState {
                status: TaskStatus::default(),
            }),
            Err(TransportError::Internal("connection reset".into())),
        ],
        false,
    );
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.subscribe_system_state(String::new(), false).await;

    assert!(matches!(
        recv(&mut rx).await,
        GatewayEvent::SystemStateReceived(_)
    ));
    match recv(&mut rx).await {
        GatewayEvent::ErrorOccurred(message) => {
            assert!(message.contains("system state subscription"), "{message}");
            assert!(message.contains("connection reset"), "{message}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

#[tokio::test]
async fn media_download_reassembles_chunks() {
    let transport = Arc::new(FakeTransport::default());
    let parts: [&[u8]; 3] = [b"first-", b"second-", b"third"];
    transport.push_stream(
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                Ok(StreamPayload::MediaChunk {
                    media_id: "media-1".into(),
                    data_b64: STANDARD.encode(part),
                    eof: i == parts.len() - 1,
                })
            })
            .collect(),
        false,
    );
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.download_media("media-1".into()).await;

    match recv(&mut rx).await {
        GatewayEvent::MediaDownloaded { media_id, data } => {
            assert_eq!(media_id, "media-1");
            assert_eq!(data, b"first-second-third");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.disconnect().await;
}

// ---------------------------------------------------------------------------
// Connectivity monitor
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn monitor_reports_transitions_only() {
    let transport = Arc::new(FakeTransport::default());
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    // Down from the start: several polls, no events.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert!(!client.is_connected());

    transport.probe_up.store(true, Ordering::SeqCst);
    match recv(&mut rx).await {
        GatewayEvent::ConnectionStateChanged(up) => assert!(up),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(client.is_connected());

    // Steady state produces no repeats.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    transport.probe_up.store(false, Ordering::SeqCst);
    match recv(&mut rx).await {
        GatewayEvent::ConnectionStateChanged(up) => assert!(!up),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(!client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_reports_down_once_and_quiesces() {
    let transport = Arc::new(FakeTransport::default());
    transport.probe_up.store(true, Ordering::SeqCst);
    transport.push_stream(Vec::new(), true);
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    match recv(&mut rx).await {
        GatewayEvent::ConnectionStateChanged(up) => assert!(up),
        other => panic!("unexpected event: {other:?}"),
    }
    client.subscribe_inspection_events("task-1".into(), false).await;

    client.disconnect().await;

    match recv(&mut rx).await {
        GatewayEvent::ConnectionStateChanged(up) => assert!(!up),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(client.sessions.active_count().await, 0);
    assert_eq!(client.calls.unjoined().await, 0);
    assert_eq!(transport.live_streams.load(Ordering::SeqCst), 0);
    assert!(client.current_address().await.is_none());

    // Disconnecting again must not emit a second down transition.
    client.disconnect().await;
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_keep_a_single_monitor() {
    let transport = Arc::new(FakeTransport::default());
    let client = client_over(&transport);

    tokio::join!(
        client.connect("http://gateway-a.test"),
        client.connect("http://gateway-b.test"),
    );
    let address = client.current_address().await.expect("connected");
    assert!(address.starts_with("http://gateway-"), "{address}");

    client.disconnect().await;
    assert!(client.current_address().await.is_none());

    // A stranded poll loop would keep probing after teardown.
    let probes_after_disconnect = transport.probe_count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        transport.probe_count.load(Ordering::SeqCst),
        probes_after_disconnect
    );
    assert!(!client.is_connected());
}

// ---------------------------------------------------------------------------
// CAD upload
// ---------------------------------------------------------------------------

fn temp_file_with(len: usize) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("cad-upload-{}.stp", uuid::Uuid::new_v4()));
    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, payload).expect("write temp file");
    path
}

#[tokio::test]
async fn upload_chunks_file_and_coalesces_progress() {
    let transport = Arc::new(FakeTransport::default());
    transport.set_upload_ack(Ok(GatewayResponse::UploadCad {
        result: RpcResult::ok(),
        model_id: "model-42".into(),
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    let len = 150 * 1024 + 17;
    let path = temp_file_with(len);
    client.upload_cad(&path).await;

    let mut progress: Vec<u8> = Vec::new();
    loop {
        match recv(&mut rx).await {
            GatewayEvent::UploadCadProgress(percent) => progress.push(percent),
            GatewayEvent::UploadCadFinished { result, model_id } => {
                assert!(result.is_ok(), "{result:?}");
                assert_eq!(model_id, "model-42");
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    std::fs::remove_file(&path).ok();

    assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(progress.last().copied(), Some(100));

    let chunks = transport.upload_chunks.lock().unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as u32);
        assert_eq!(chunk.eof, i == chunks.len() - 1);
        assert_eq!(chunk.upload_id, chunks[0].upload_id);
    }
    let decoded: usize = chunks
        .iter()
        .map(|chunk| STANDARD.decode(&chunk.data_b64).expect("valid base64").len())
        .sum();
    assert_eq!(decoded, len);
    drop(chunks);
    client.disconnect().await;
}

#[tokio::test]
async fn upload_of_missing_file_is_invalid_argument() {
    let transport = Arc::new(FakeTransport::default());
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client.upload_cad("/nonexistent/model.stp").await;

    match recv(&mut rx).await {
        GatewayEvent::UploadCadFinished { result, .. } => {
            assert_eq!(result.code, ErrorCode::InvalidArgument);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(transport.upload_chunks.lock().unwrap().is_empty());
    client.disconnect().await;
}

#[tokio::test]
async fn upload_write_failure_names_the_chunk() {
    let transport = Arc::new(FakeTransport::default());
    *transport.fail_write_at.lock().unwrap() = Some(1);
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    let path = temp_file_with(150 * 1024);
    client.upload_cad(&path).await;

    loop {
        match recv(&mut rx).await {
            GatewayEvent::UploadCadProgress(_) => continue,
            GatewayEvent::UploadCadFinished { result, .. } => {
                assert_eq!(result.code, ErrorCode::Internal);
                assert!(result.message.contains("chunk 1"), "{result:?}");
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    std::fs::remove_file(&path).ok();
    client.disconnect().await;
}

#[test]
fn progress_percent_saturates_when_source_grows() {
    use crate::upload::progress_percent;
    assert_eq!(progress_percent(50, 100), 50);
    assert_eq!(progress_percent(100, 100), 100);
    // Size snapshot taken at open; the file may grow while streaming.
    assert_eq!(progress_percent(300 * 1024, 100 * 1024), 100);
}

#[tokio::test]
async fn empty_upload_sends_no_chunks() {
    let transport = Arc::new(FakeTransport::default());
    transport.set_upload_ack(Ok(GatewayResponse::UploadCad {
        result: RpcResult::ok(),
        model_id: "model-empty".into(),
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    let path = temp_file_with(0);
    client.upload_cad(&path).await;

    match recv(&mut rx).await {
        GatewayEvent::UploadCadFinished { result, model_id } => {
            assert!(result.is_ok(), "{result:?}");
            assert_eq!(model_id, "model-empty");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    std::fs::remove_file(&path).ok();
    assert!(transport.upload_chunks.lock().unwrap().is_empty());
    client.disconnect().await;
}

// ---------------------------------------------------------------------------
// Targets and captures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_targets_reports_server_count() {
    let transport = Arc::new(FakeTransport::default());
    transport.push_unary(Ok(GatewayResponse::SetInspectionTargets {
        result: RpcResult::ok(),
        total_targets: 12,
    }));
    let client = client_over(&transport);
    let mut rx = client.subscribe_events();
    client.connect("http://gateway.test").await;

    client
        .set_inspection_targets(
            "model-1".into(),
            vec![Default::default(); 12],
            CaptureConfig {
                camera_id: "cam-0".into(),
                ..Default::default()
            },
            "operator-3".into(),
        )
        .await;

    match recv(&mut rx).await {
        GatewayEvent::SetTargetsFinished {
            result,
            total_targets,
        } => {
            assert!(result.is_ok());
            assert_eq!(total_targets, 12);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let requests = transport.requests_seen.lock().unwrap();
    match &requests[0] {
        GatewayRequest::SetInspectionTargets {
            model_id, targets, ..
        } => {
            assert_eq!(model_id, "model-1");
            assert_eq!(targets.len(), 12);
        }
        other => panic!("unexpected request: {other:?}"),
    }
    drop(requests);
    client.disconnect().await;
}
