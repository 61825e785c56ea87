// libs/availability-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// AVAILABILITY WINDOWS
// ==============================================================================

/// A dated interval during which a doctor can be booked at one clinic.
/// Start and end always fall on the same UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: i64,
    pub affiliation_id: i64,
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }

    /// Active and not removed.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.removed_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAvailabilityWindow {
    pub affiliation_id: i64,
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Selection of windows for one doctor at one clinic. Dates are inclusive
/// and compared against the window's calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFilter {
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub bookable_only: bool,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWindowRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentQuery {
    pub date: NaiveDate,
    pub segment_minutes: i64,
    pub step_minutes: i64,
}

/// A candidate bookable slice `[start_time, end_time)`. Consecutive
/// segments overlap whenever the step is shorter than the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Availability window not found")]
    WindowNotFound,

    #[error("Doctor is not affiliated with this clinic")]
    DoctorNotAffiliated,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AvailabilityError {
    pub fn code(&self) -> &'static str {
        match self {
            AvailabilityError::ValidationError(_) => "VALIDATION_ERROR",
            AvailabilityError::WindowNotFound => "AVAILABILITY_WINDOW_NOT_FOUND",
            AvailabilityError::DoctorNotAffiliated => "DOCTOR_NOT_AFFILIATED",
            AvailabilityError::Storage(_) => "INTERNAL",
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        let code = err.code();
        match err {
            AvailabilityError::ValidationError(msg) => AppError::Validation(code, msg),
            AvailabilityError::WindowNotFound | AvailabilityError::DoctorNotAffiliated => {
                AppError::NotFound(code, err.to_string())
            }
            AvailabilityError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}
