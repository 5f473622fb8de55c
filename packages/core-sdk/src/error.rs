use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/**
 * \brief Every way a relay request can fail, already shaped for the caller.
 */
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
    #[error("upstream credential not configured")]
    MissingCredential,
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("invalid message at index {0}")]
    InvalidMessage(usize),
    #[error("upstream rejected the credential")]
    UpstreamAuth,
    #[error("upstream rate limit exceeded")]
    RateLimited,
    #[error("upstream rejected the request parameters")]
    UpstreamBadRequest,
    #[error("upstream returned {0}")]
    Upstream(StatusCode),
    #[error("upstream payload has no choices")]
    InvalidAiResponse,
    #[error("upstream call timed out or was cancelled")]
    Timeout,
    #[error("upstream unreachable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

/**
 * \brief Body of every error response.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl RelayError {
    /**
     * \brief Maps a non-success upstream status, first match wins.
     * 401 is masked as a server fault so callers never see it as their own.
     */
    pub fn from_upstream_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => RelayError::UpstreamAuth,
            StatusCode::TOO_MANY_REQUESTS => RelayError::RateLimited,
            StatusCode::BAD_REQUEST => RelayError::UpstreamBadRequest,
            other => RelayError::Upstream(other),
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout
        } else if err.is_connect() {
            RelayError::ServiceUnavailable(err.to_string())
        } else {
            RelayError::Internal(anyhow::Error::new(err))
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingCredential
            | RelayError::UpstreamAuth
            | RelayError::InvalidAiResponse
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::InvalidRequest(_)
            | RelayError::InvalidMessage(_)
            | RelayError::UpstreamBadRequest => StatusCode::BAD_REQUEST,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Upstream(status) => *status,
            RelayError::Timeout => StatusCode::REQUEST_TIMEOUT,
            RelayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed(_) => "Method not allowed",
            RelayError::MissingCredential => "Server configuration error",
            RelayError::InvalidRequest(_) => "Invalid request",
            RelayError::InvalidMessage(_) => "Invalid message format",
            RelayError::UpstreamAuth => "Authentication failed",
            RelayError::RateLimited => "Rate limit exceeded",
            RelayError::UpstreamBadRequest => "Bad request",
            RelayError::Upstream(_) => "Upstream API error",
            RelayError::InvalidAiResponse => "Invalid AI response",
            RelayError::Timeout => "Request timeout",
            RelayError::ServiceUnavailable(_) => "Service unavailable",
            RelayError::Internal(_) => "Internal server error",
        }
    }

    /** \brief Caller-facing explanation; never includes internal detail. */
    pub fn message(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed(_) => "Only POST requests are allowed",
            RelayError::MissingCredential => "API key not configured",
            RelayError::InvalidRequest(msg) => *msg,
            RelayError::InvalidMessage(_) => "Each message must have role and content",
            RelayError::UpstreamAuth => "API key authentication failed",
            RelayError::RateLimited => "Too many requests. Please try again later.",
            RelayError::UpstreamBadRequest => "Invalid request parameters",
            RelayError::Upstream(_) => "Failed to get response from AI service",
            RelayError::InvalidAiResponse => "No response generated",
            RelayError::Timeout => "Request was cancelled or timed out",
            RelayError::ServiceUnavailable(_) => "AI service is temporarily unavailable",
            RelayError::Internal(_) => {
                "An unexpected error occurred while processing your request"
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.label().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
