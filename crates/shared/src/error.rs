use serde::{Deserialize, Serialize};

/// Application-level result codes carried in every gateway response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[default]
    Unspecified,
    Ok,
    InvalidArgument,
    NotFound,
    Timeout,
    Busy,
    Internal,
    Unavailable,
    Conflict,
}

/// Result holder delivered with every call-completion event.
///
/// Either echoes the gateway's embedded application result or is synthesized
/// locally (no connection, local I/O failure, transport failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RpcResult {
    pub code: ErrorCode,
    pub message: String,
}

impl RpcResult {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: String::new(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// True when the call completed successfully.
    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Ok
    }
}
