use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::audit;
use crate::auth::{admin_only, bearer_auth};
use crate::booking;
use crate::broadcast::ws;
use crate::screening;
use crate::shared::AppState;

/// Builds the full application router.
///
/// Three surfaces: an unauthenticated liveness check, the authenticated /api
/// group, and the /admin group which additionally requires the ADMIN role.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/screenings", get(screening::handlers::list_screenings))
        .route("/screenings/:id", get(screening::handlers::get_screening))
        .route(
            "/screenings/:id/seats",
            get(screening::handlers::get_seat_map),
        )
        .route(
            "/screenings/:id/seat-details",
            get(screening::handlers::get_seat_details),
        )
        .route("/screenings/:id/lock", post(booking::handlers::lock_seat))
        .route("/screenings/:id/ws", get(ws::screening_ws))
        .route("/bookings/confirm", post(booking::handlers::confirm_booking))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    let admin = Router::new()
        .route("/bookings", get(booking::handlers::admin_list_bookings))
        .route("/audit-logs", get(audit::handlers::list_audit_logs))
        .route("/screenings", post(screening::handlers::create_screening))
        .route("/ws", get(ws::admin_ws))
        .layer(middleware::from_fn(admin_only))
        .layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .route("/", get(|| async { "cineseat" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
