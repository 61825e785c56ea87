// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::extractor::{ApiJson, ApiPath, ApiQuery};

use crate::models::{
    AppointmentFilters, AppointmentScope, BookAppointmentRequest, CancelAppointmentRequest,
    ConflictCheckQuery, FeedbackRequest, RescheduleAppointmentRequest,
};
use crate::services::{AppointmentBookingService, AppointmentQueryService};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
    pub queries: Arc<AppointmentQueryService>,
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiJson(request): ApiJson<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.book_appointment(&actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(&actor, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(filters): ApiQuery<AppointmentFilters>,
) -> Result<Json<Value>, AppError> {
    let scope = AppointmentScope::for_actor(&actor)?;
    let page = state.queries.list_appointments(scope, filters).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": page.items,
        "pagination": {
            "page": page.page,
            "page_size": page.page_size,
            "total": page.total,
            "total_pages": page.total_pages,
        }
    })))
}

pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
    ApiJson(request): ApiJson<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .reschedule_appointment(&actor, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

// ==============================================================================
// STATUS HANDLERS
// ==============================================================================

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
    request: Option<ApiJson<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = request.map(|ApiJson(request)| request).unwrap_or_default();
    let appointment = state
        .booking
        .cancel_appointment(&actor, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

pub async fn confirm_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.confirm_appointment(&actor, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

pub async fn start_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.mark_in_progress(&actor, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment started"
    })))
}

pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.complete_appointment(&actor, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

pub async fn leave_feedback(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiPath(appointment_id): ApiPath<i64>,
    ApiJson(request): ApiJson<FeedbackRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .leave_feedback(&actor, appointment_id, request.feedback)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Feedback saved"
    })))
}

// ==============================================================================
// UTILITY HANDLERS
// ==============================================================================

pub async fn check_appointment_conflicts(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let result = state.booking.check_conflicts(&actor, query).await?;

    Ok(Json(json!({
        "success": true,
        "has_conflict": result.has_conflict,
        "conflicting_appointments": result.conflicting_appointments
    })))
}
