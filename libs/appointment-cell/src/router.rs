// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::SchedulingState;
use crate::store::PostgrestSchedulingStore;

pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    let store = Arc::new(PostgrestSchedulingStore::new(&config));
    appointment_routes_with_state(config, Arc::new(SchedulingState::new(store)))
}

/// Wire the appointment routes over an explicit state handle; tests inject
/// an in-memory store through this.
pub fn appointment_routes_with_state(config: Arc<AppConfig>, state: Arc<SchedulingState>) -> Router {
    // All appointment operations require authentication.
    Router::new()
        .route("/available-slots", get(handlers::available_slots))
        .route("/", post(handlers::book_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::reschedule_appointment))
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
