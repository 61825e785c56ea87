use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::{AppointmentBookingService, AppointmentQueryService, AppointmentStore};
use availability_cell::handlers::AvailabilityState;
use availability_cell::router::availability_routes;
use availability_cell::services::{AvailabilityService, AvailabilityStore, SlotGeneratorService};
use shared_config::AppConfig;
use shared_database::ReferenceDirectory;
use shared_utils::clock::Clock;

/// Storage ports and collaborators the cells are built from.
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn ReferenceDirectory>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub clock: Arc<dyn Clock>,
}

pub fn create_router(config: Arc<AppConfig>, backends: Backends) -> Router {
    let policy = config.scheduling.clone();

    let availability_state = AvailabilityState {
        config: config.clone(),
        windows: Arc::new(AvailabilityService::new(
            backends.availability.clone(),
            backends.directory.clone(),
        )),
        slots: Arc::new(SlotGeneratorService::new(
            backends.availability.clone(),
            backends.directory.clone(),
            policy.working_days_horizon_months,
        )),
        clock: backends.clock.clone(),
    };

    let appointment_state = AppointmentState {
        config: config.clone(),
        booking: Arc::new(AppointmentBookingService::new(
            backends.appointments.clone(),
            backends.directory.clone(),
            backends.clock.clone(),
            policy.clone(),
        )),
        queries: Arc::new(AppointmentQueryService::new(
            backends.appointments.clone(),
            backends.directory.clone(),
            &policy,
        )),
    };

    Router::new()
        .route("/", get(|| async { "Clinic Scheduling API is running!" }))
        .nest("/availability", availability_routes(availability_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
