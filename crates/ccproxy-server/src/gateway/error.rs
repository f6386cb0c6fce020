//! Gateway-specific error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors raised while forwarding a request upstream.
///
/// Everything except [`GatewayError::InvalidUpstream`] happens per request
/// and is reported to the client as `502 Bad Gateway`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The configured upstream base URL cannot be used. Startup only.
    #[error("Invalid upstream configuration: {0}")]
    InvalidUpstream(String),

    /// The inbound request body could not be read.
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    /// The upstream could not be reached or did not answer.
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// The upstream answered but its body could not be read.
    #[error("Failed to read upstream response body: {0}")]
    ResponseBody(String),

    /// The response-interception callback failed.
    #[error("Response interception failed: {0}")]
    Intercept(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUpstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RequestBody(_)
            | Self::Upstream(_)
            | Self::ResponseBody(_)
            | Self::Intercept(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(error = %self, status = status.as_u16(), "forwarding failed");
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}
