use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn records_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/prescriptions", post(handlers::create_prescription))
        .route("/prescriptions", get(handlers::list_prescriptions))
        .route("/prescriptions/{prescription_id}", get(handlers::get_prescription))
        .route("/prescriptions/{prescription_id}", put(handlers::update_prescription))
        .route("/prescriptions/{prescription_id}", delete(handlers::delete_prescription))
        .route("/medical-records", post(handlers::create_medical_record))
        .route("/medical-records", get(handlers::list_medical_records))
        .route("/medical-records/{record_id}", get(handlers::get_medical_record))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
