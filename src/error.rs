use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the engine. Validation and state errors are returned
/// before any mutation takes place; classifier failures are per-frame and
/// leave the session active.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("classifier unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("no data: {0}")]
    NoData(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::NotFound(_) => "not_found",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::UpstreamUnavailable(_) => "upstream_unavailable",
            EngineError::NoData(_) => "no_data",
            EngineError::Store(_) => "store_error",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Wire form of an engine error, carried in the response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for ApiError {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Success/failure envelope returned by every caller-facing engine method.
/// Callers must check `ok` (and for alert decisions, the decision payload)
/// rather than assuming a payload is present.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn from_result(result: EngineResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                data: None,
                error: Some(ApiError::from(&err)),
            },
        }
    }
}
