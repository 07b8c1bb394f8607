use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Short error codes the firmware emits in its `{"error": "..."}` envelope.
/// The set grows with the firmware, so unknown codes are carried through
/// rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    BadPath,
    MissingPath,
    FileInUse,
    MaxAlarms,
    NotRinging,
    BadAction,
    BadJson,
    MissingBody,
    UploadFailed,
    DeleteFailed,
    Other(String),
}

impl ErrorCode {
    pub fn from_wire(code: &str) -> Self {
        match code {
            "unauthorized" => ErrorCode::Unauthorized,
            "not_found" => ErrorCode::NotFound,
            "bad_path" => ErrorCode::BadPath,
            "missing_path" => ErrorCode::MissingPath,
            "file_in_use" => ErrorCode::FileInUse,
            "max_alarms" => ErrorCode::MaxAlarms,
            "not_ringing" => ErrorCode::NotRinging,
            "bad_action" => ErrorCode::BadAction,
            "bad_json" => ErrorCode::BadJson,
            "missing_body" => ErrorCode::MissingBody,
            "upload_failed" => ErrorCode::UploadFailed,
            "delete_failed" => ErrorCode::DeleteFailed,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadPath => "bad_path",
            ErrorCode::MissingPath => "missing_path",
            ErrorCode::FileInUse => "file_in_use",
            ErrorCode::MaxAlarms => "max_alarms",
            ErrorCode::NotRinging => "not_ringing",
            ErrorCode::BadAction => "bad_action",
            ErrorCode::BadJson => "bad_json",
            ErrorCode::MissingBody => "missing_body",
            ErrorCode::UploadFailed => "upload_failed",
            ErrorCode::DeleteFailed => "delete_failed",
            ErrorCode::Other(code) => code,
        }
    }
}

/// JSON error envelope returned by every failing handler. `detail` only
/// appears on upload failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}", render(.error, .detail))]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_wire(&self.error)
    }
}

fn render(error: &str, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("{error}: {detail}"),
        None => error.to_string(),
    }
}
