// libs/availability-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Actor, Role};
use shared_models::error::AppError;
use shared_utils::clock::Clock;
use shared_utils::extractor::{ApiJson, ApiPath, ApiQuery};

use crate::models::{CreateWindowRequest, DateRangeQuery, SegmentQuery, UpdateWindowRequest};
use crate::services::{AvailabilityService, SlotGeneratorService};

#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub windows: Arc<AvailabilityService>,
    pub slots: Arc<SlotGeneratorService>,
    pub clock: Arc<dyn Clock>,
}

/// Admins manage every pair, clinic staff their own clinic, doctors themselves.
fn ensure_can_manage(actor: &Actor, doctor_id: i64, clinic_id: i64) -> Result<(), AppError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::ClinicStaff => actor.clinic_id == Some(clinic_id),
        Role::Doctor => actor.id == doctor_id,
        Role::Patient => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("Not authorized to manage availability for this doctor and clinic"))
    }
}

// ==============================================================================
// SLOT GENERATION HANDLERS
// ==============================================================================

pub async fn list_working_days(
    State(state): State<AvailabilityState>,
    ApiPath((doctor_id, clinic_id)): ApiPath<(i64, i64)>,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let days = state
        .slots
        .list_working_days(doctor_id, clinic_id, range, state.clock.today())
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "clinic_id": clinic_id,
        "working_days": days,
    })))
}

pub async fn list_time_segments(
    State(state): State<AvailabilityState>,
    ApiPath((doctor_id, clinic_id)): ApiPath<(i64, i64)>,
    ApiQuery(query): ApiQuery<SegmentQuery>,
) -> Result<Json<Value>, AppError> {
    let segments = state
        .slots
        .generate_segments(
            doctor_id,
            clinic_id,
            query.date,
            query.segment_minutes,
            query.step_minutes,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "segments": segments,
    })))
}

// ==============================================================================
// WINDOW MANAGEMENT HANDLERS
// ==============================================================================

pub async fn list_windows(
    State(state): State<AvailabilityState>,
    Extension(actor): Extension<Actor>,
    ApiPath((doctor_id, clinic_id)): ApiPath<(i64, i64)>,
    ApiQuery(range): ApiQuery<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&actor, doctor_id, clinic_id)?;

    let windows = state
        .windows
        .list_windows(doctor_id, clinic_id, range, state.clock.today())
        .await?;

    Ok(Json(json!({
        "success": true,
        "windows": windows,
    })))
}

pub async fn create_window(
    State(state): State<AvailabilityState>,
    Extension(actor): Extension<Actor>,
    ApiPath((doctor_id, clinic_id)): ApiPath<(i64, i64)>,
    ApiJson(request): ApiJson<CreateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&actor, doctor_id, clinic_id)?;

    let window = state.windows.create_window(doctor_id, clinic_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "window": window,
        "message": "Availability window created"
    })))
}

pub async fn update_window(
    State(state): State<AvailabilityState>,
    Extension(actor): Extension<Actor>,
    ApiPath(window_id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateWindowRequest>,
) -> Result<Json<Value>, AppError> {
    let current = state.windows.get_window(window_id).await?;
    ensure_can_manage(&actor, current.doctor_id, current.clinic_id)?;

    let window = state.windows.update_window(window_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "window": window,
        "message": "Availability window updated"
    })))
}

pub async fn remove_window(
    State(state): State<AvailabilityState>,
    Extension(actor): Extension<Actor>,
    ApiPath(window_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let current = state.windows.get_window(window_id).await?;
    ensure_can_manage(&actor, current.doctor_id, current.clinic_id)?;

    state.windows.remove_window(window_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability window removed"
    })))
}
