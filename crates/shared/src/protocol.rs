use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        CaptureConfig, CaptureRecord, InspectionEvent, InspectionTarget, NavMapInfo, PlanOptions,
        PlanRecord, PlanSummary, TaskStatus,
    },
    error::RpcResult,
};

/// Wire request for every gateway call.
///
/// The client serializes one of these per unary call (and per subscription
/// open); binary payloads travel base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayRequest {
    SetInspectionTargets {
        model_id: String,
        targets: Vec<InspectionTarget>,
        capture: CaptureConfig,
        operator_id: String,
    },
    PlanInspection {
        model_id: String,
        task_name: String,
        options: PlanOptions,
    },
    GetPlan {
        plan_id: String,
    },
    StartInspection {
        plan_id: String,
        dry_run: bool,
    },
    PauseInspection {
        task_id: String,
        reason: String,
    },
    ResumeInspection {
        task_id: String,
        reason: String,
    },
    StopInspection {
        task_id: String,
        reason: String,
    },
    GetTaskStatus {
        task_id: String,
    },
    /// Empty `task_id` subscribes to all tasks.
    SubscribeSystemState {
        task_id: String,
        include_snapshot: bool,
    },
    SubscribeInspectionEvents {
        task_id: String,
        include_snapshot: bool,
    },
    GetNavMap {
        map_id: String,
        include_image_thumbnail: bool,
    },
    /// `point_id == 0` lists captures for all points.
    ListCaptures {
        task_id: String,
        point_id: i32,
        include_thumbnails: bool,
    },
    DownloadMedia {
        media_id: String,
    },
}

/// One chunk of a client-streamed CAD upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadCadChunk {
    pub upload_id: String,
    pub filename: String,
    pub data_b64: String,
    pub chunk_index: u32,
    pub eof: bool,
}

/// Wire response for every unary call and for the upload finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayResponse {
    UploadCad {
        result: RpcResult,
        model_id: String,
    },
    SetInspectionTargets {
        result: RpcResult,
        total_targets: u32,
    },
    PlanInspection {
        result: RpcResult,
        plan: PlanSummary,
    },
    GetPlan {
        result: RpcResult,
        plan: PlanRecord,
    },
    StartInspection {
        result: RpcResult,
        task_id: String,
    },
    ControlTask {
        result: RpcResult,
    },
    GetTaskStatus {
        result: RpcResult,
        status: TaskStatus,
    },
    GetNavMap {
        result: RpcResult,
        map: NavMapInfo,
    },
    ListCaptures {
        result: RpcResult,
        captures: Vec<CaptureRecord>,
    },
}

/// One item of a server-streamed subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamPayload {
    SystemState {
        status: TaskStatus,
    },
    InspectionEvent {
        event: InspectionEvent,
    },
    MediaChunk {
        media_id: String,
        data_b64: String,
        eof: bool,
    },
}
