use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use stockroom_core::health::healthz;
use stockroom_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::notification::{get_metrics, list_notifications, readyz};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Admin
        .route("/admin/notifications", get(list_notifications))
        .route("/admin/metrics", get(get_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
