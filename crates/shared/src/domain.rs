use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Orientation as (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    #[serde(default)]
    pub frame_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose3D {
    pub position: Vec3,
    pub orientation: Quaternion,
    #[serde(default)]
    pub frame_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SurfacePoint {
    pub position: Vec3,
    /// Unit vector in `frame_id`.
    pub normal: Vec3,
    #[serde(default)]
    pub frame_id: String,
    /// Optional, for debug / CAD round-trip.
    #[serde(default)]
    pub face_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewHint {
    /// Camera forward direction unit vector.
    pub view_direction: Vec3,
    /// Rotation around `view_direction`.
    #[serde(default)]
    pub roll_deg: f64,
}

// ---------------------------------------------------------------------------
// Media references
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaRef {
    pub media_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImageRef {
    pub media: MediaRef,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Optional small JPEG preview for the UI, base64-encoded.
    #[serde(default)]
    pub thumbnail_jpeg_b64: String,
}

// ---------------------------------------------------------------------------
// Defect / detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoundingBox2D {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DefectResult {
    pub has_defect: bool,
    #[serde(default)]
    pub defect_type: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub bbox: BoundingBox2D,
}

// ---------------------------------------------------------------------------
// Capture configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    pub camera_id: String,
    #[serde(default)]
    pub focus_distance_m: f64,
    #[serde(default)]
    pub fov_h_deg: f64,
    #[serde(default)]
    pub fov_v_deg: f64,
    #[serde(default)]
    pub max_tilt_from_normal_deg: f64,
}

// ---------------------------------------------------------------------------
// Inspection target / plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InspectionTarget {
    pub point_id: i32,
    #[serde(default)]
    pub group_id: String,
    pub surface: SurfacePoint,
    pub view: ViewHint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InspectionPoint {
    pub point_id: i32,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub agv_pose: Pose2D,
    #[serde(default)]
    pub arm_pose: Pose3D,
    #[serde(default)]
    pub arm_joint_goal: [f64; 6],
    #[serde(default)]
    pub expected_quality: f64,
    #[serde(default)]
    pub planning_cost: f64,
    #[serde(default)]
    pub tcp_pose_goal: Pose3D,
    #[serde(default)]
    pub camera_pose: Pose3D,
    #[serde(default)]
    pub camera_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InspectionPath {
    #[serde(default)]
    pub waypoints: Vec<InspectionPoint>,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub estimated_distance_m: f64,
    #[serde(default)]
    pub estimated_duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanningWeights {
    #[serde(default)]
    pub w_agv_distance: f64,
    #[serde(default)]
    pub w_joint_delta: f64,
    #[serde(default)]
    pub w_manipulability: f64,
    #[serde(default)]
    pub w_view_error: f64,
    #[serde(default)]
    pub w_joint_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions {
    #[serde(default)]
    pub candidate_radius_m: f64,
    #[serde(default)]
    pub candidate_yaw_step_deg: f64,
    pub enable_collision_check: bool,
    pub enable_tsp_optimization: bool,
    #[serde(default)]
    pub ik_solver: String,
    #[serde(default)]
    pub weights: PlanningWeights,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            candidate_radius_m: 0.0,
            candidate_yaw_step_deg: 0.0,
            enable_collision_check: true,
            enable_tsp_optimization: true,
            ik_solver: String::new(),
            weights: PlanningWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanningStatistics {
    #[serde(default)]
    pub candidate_pose_count: u32,
    #[serde(default)]
    pub ik_success_count: u32,
    #[serde(default)]
    pub collision_filtered_count: u32,
    #[serde(default)]
    pub planning_time_ms: u32,
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Unspecified,
    Idle,
    Localizing,
    Planning,
    Executing,
    Paused,
    Completed,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgvStatus {
    pub connected: bool,
    #[serde(default)]
    pub arrived: bool,
    #[serde(default)]
    pub moving: bool,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default)]
    pub current_pose: Pose2D,
    #[serde(default)]
    pub battery_percent: f32,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub linear_velocity_mps: f32,
    #[serde(default)]
    pub angular_velocity_rps: f32,
    #[serde(default)]
    pub goal_pose: Pose2D,
    #[serde(default)]
    pub map_id: String,
    #[serde(default)]
    pub localization_quality: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArmStatus {
    pub connected: bool,
    #[serde(default)]
    pub arrived: bool,
    #[serde(default)]
    pub moving: bool,
    #[serde(default)]
    pub current_joints: [f64; 6],
    #[serde(default)]
    pub manipulability: f64,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub servo_enabled: bool,
    #[serde(default)]
    pub tcp_pose: Pose3D,
    #[serde(default)]
    pub base_pose: Pose3D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskStatus {
    pub task_id: String,
    pub phase: TaskPhase,
    #[serde(default)]
    pub progress_percent: f32,
    #[serde(default)]
    pub current_action: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub agv: AgvStatus,
    #[serde(default)]
    pub arm: ArmStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub current_waypoint_index: u32,
    #[serde(default)]
    pub current_point_id: i32,
    #[serde(default)]
    pub total_waypoints: u32,
    #[serde(default)]
    pub interlock_ok: bool,
    #[serde(default)]
    pub interlock_message: String,
    #[serde(default)]
    pub remaining_time_est_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InspectionEventType {
    #[default]
    Unspecified,
    Info,
    Warn,
    Error,
    Captured,
    DefectFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InspectionEvent {
    pub task_id: String,
    #[serde(default)]
    pub point_id: i32,
    pub event_type: InspectionEventType,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub defect: DefectResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capture_id: String,
    #[serde(default)]
    pub camera_id: String,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub defects: Vec<DefectResult>,
    #[serde(default)]
    pub camera_pose: Pose3D,
}

// ---------------------------------------------------------------------------
// Capture records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaptureRecord {
    pub task_id: String,
    #[serde(default)]
    pub point_id: i32,
    pub capture_id: String,
    #[serde(default)]
    pub camera_id: String,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub defects: Vec<DefectResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Navigation map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NavMapInfo {
    pub map_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resolution_m_per_pixel: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub origin: Pose2D,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Compound call response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanSummary {
    pub plan_id: String,
    #[serde(default)]
    pub path: InspectionPath,
    #[serde(default)]
    pub stats: PlanningStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanRecord {
    pub plan_id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub options: PlanOptions,
    #[serde(default)]
    pub path: InspectionPath,
    #[serde(default)]
    pub stats: PlanningStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
