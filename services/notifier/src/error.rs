use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Notifier service error variants.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl NotifierError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for NotifierError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Why a delivery attempt did not succeed. Fed into the retry state machine, never returned
/// over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel {0} is disabled")]
    Disabled(&'static str),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by provider: {0}")]
    Rejected(String),
}
