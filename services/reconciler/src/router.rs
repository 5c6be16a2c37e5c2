use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use stockroom_core::health::healthz;
use stockroom_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::reconciliation::{
    list_audit_events, list_recon_reports, readyz, run_reconciliation,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Admin
        .route("/admin/reconciliation/run", post(run_reconciliation))
        .route("/admin/recon-reports", get(list_recon_reports))
        .route("/admin/audit-events", get(list_audit_events))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
