// libs/availability-cell/src/router.rs
use axum::{
    Router,
    routing::{get, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AvailabilityState};

pub fn availability_routes(state: AvailabilityState) -> Router {
    let protected_routes = Router::new()
        // Slot generation
        .route("/doctors/{doctor_id}/clinics/{clinic_id}/working-days", get(handlers::list_working_days))
        .route("/doctors/{doctor_id}/clinics/{clinic_id}/segments", get(handlers::list_time_segments))

        // Window management
        .route(
            "/doctors/{doctor_id}/clinics/{clinic_id}/windows",
            get(handlers::list_windows).post(handlers::create_window),
        )
        .route(
            "/windows/{window_id}",
            put(handlers::update_window).delete(handlers::remove_window),
        )

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
