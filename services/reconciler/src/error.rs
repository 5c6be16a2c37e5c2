use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Reconciler service error variants.
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    /// The expected-inventory list is missing or cannot be parsed. Fatal to the run.
    #[error("expected inventory list: {0}")]
    ExpectedList(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ReconcilerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExpectedList(_) => "EXPECTED_LIST_INVALID",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ReconcilerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ExpectedList(_) => StatusCode::UNPROCESSABLE_ENTITY,
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
