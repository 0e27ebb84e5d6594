use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response {0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream model call failed: {0}")]
    Upstream(#[from] llm::LlmError),

    #[error("the request's deadline was exceeded before the response completed")]
    Timeout,

    #[error("tool execution failed fatally: {0}")]
    ToolFailed(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ResponseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ToolFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "validation_error",
            Self::Upstream(_) => "upstream_error",
            Self::Timeout => "timeout",
            Self::ToolFailed(_) => "internal_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ResponseError>;
