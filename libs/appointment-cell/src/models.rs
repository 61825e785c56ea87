// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::auth::{Actor, Role};
use shared_models::error::AppError;

pub const MAX_NOTES_LENGTH: usize = 2000;
pub const MAX_FEEDBACK_LENGTH: usize = 2000;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment still occupies its interval for conflict purposes.
    pub fn blocks_schedule(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!(
                "Unknown appointment status: {}",
                other
            ))),
        }
    }
}

/// Row handed to the store on booking; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

// ==============================================================================
// SCOPE AND INITIATOR
// ==============================================================================

/// Authorization context restricting which appointments a caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    Admin,
    Clinic(i64),
    Doctor(i64),
    Patient(i64),
}

impl AppointmentScope {
    pub fn for_actor(actor: &Actor) -> Result<Self, AppointmentError> {
        match actor.role {
            Role::Admin => Ok(AppointmentScope::Admin),
            Role::ClinicStaff => actor
                .clinic_id
                .map(AppointmentScope::Clinic)
                .ok_or_else(|| AppointmentError::Forbidden(
                    "Clinic staff account is not linked to a clinic".to_string(),
                )),
            Role::Doctor => Ok(AppointmentScope::Doctor(actor.id)),
            Role::Patient => Ok(AppointmentScope::Patient(actor.id)),
        }
    }

    pub fn permits(&self, appointment: &Appointment) -> bool {
        match *self {
            AppointmentScope::Admin => true,
            AppointmentScope::Clinic(id) => appointment.clinic_id == id,
            AppointmentScope::Doctor(id) => appointment.doctor_id == id,
            AppointmentScope::Patient(id) => appointment.patient_id == id,
        }
    }
}

/// Who asked for a cancellation. Decides the lateness guard and the
/// label written into the notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Admin,
    Clinic,
    Doctor,
    Patient,
}

impl Initiator {
    pub fn label(&self) -> &'static str {
        match self {
            Initiator::Admin => "admin",
            Initiator::Clinic => "clinic",
            Initiator::Doctor => "doctor",
            Initiator::Patient => "patient",
        }
    }

    /// Clinics may cancel right up to the appointment.
    pub fn is_lateness_guarded(&self) -> bool {
        !matches!(self, Initiator::Clinic)
    }
}

impl From<Role> for Initiator {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => Initiator::Admin,
            Role::ClinicStaff => Initiator::Clinic,
            Role::Doctor => Initiator::Doctor,
            Role::Patient => Initiator::Patient,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub start_time: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub min_minutes_before_start: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
    pub min_minutes_before_start: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub exclude_appointment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

/// Caller-supplied filters for listing appointments. Fields already fixed
/// by the caller's scope are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentFilters {
    pub doctor_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub clinic_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    /// Inclusive lower bound on the start date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the start date.
    pub to: Option<NaiveDate>,
    /// Admin only: matches doctor or patient display names.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Resolved store-level selection. `start_from` is inclusive and
/// `start_before` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub doctor_id: Option<i64>,
    pub clinic_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_before: Option<DateTime<Utc>>,
    pub name_match: Option<NameMatch>,
    pub offset: u64,
    pub limit: u64,
}

/// Appointments whose doctor is in `doctor_ids` or whose patient is in
/// `patient_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMatch {
    pub doctor_ids: Vec<i64>,
    pub patient_ids: Vec<i64>,
}

impl NameMatch {
    pub fn is_empty(&self) -> bool {
        self.doctor_ids.is_empty() && self.patient_ids.is_empty()
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_ids.contains(&appointment.doctor_id)
            || self.patient_ids.contains(&appointment.patient_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found or inactive")]
    DoctorNotFound,

    #[error("Patient not found or inactive")]
    PatientNotFound,

    #[error("Clinic not found or inactive")]
    ClinicNotFound,

    #[error("Doctor is not affiliated with this clinic")]
    DoctorNotAffiliated,

    #[error("The requested time overlaps an existing appointment")]
    SchedulingConflict,

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Appointment is already completed")]
    AlreadyCompleted,

    #[error("Appointment is already confirmed")]
    AlreadyConfirmed,

    #[error("Appointment is already in progress")]
    AlreadyInProgress,

    #[error("Appointment starts in less than {0} minutes and can no longer be changed")]
    TooLateToModify(i64),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AppointmentError::SchedulingConflict,
            other => AppointmentError::Storage(other),
        }
    }
}

impl AppointmentError {
    pub fn code(&self) -> &'static str {
        match self {
            AppointmentError::ValidationError(_) => "VALIDATION_ERROR",
            AppointmentError::NotFound => "APPOINTMENT_NOT_FOUND",
            AppointmentError::DoctorNotFound => "DOCTOR_NOT_FOUND",
            AppointmentError::PatientNotFound => "PATIENT_NOT_FOUND",
            AppointmentError::ClinicNotFound => "CLINIC_NOT_FOUND",
            AppointmentError::DoctorNotAffiliated => "DOCTOR_NOT_AFFILIATED",
            AppointmentError::SchedulingConflict => "SCHEDULING_CONFLICT",
            AppointmentError::AlreadyCancelled => "APPOINTMENT_ALREADY_CANCELLED",
            AppointmentError::AlreadyCompleted => "APPOINTMENT_ALREADY_COMPLETED",
            AppointmentError::AlreadyConfirmed => "APPOINTMENT_ALREADY_CONFIRMED",
            AppointmentError::AlreadyInProgress => "APPOINTMENT_ALREADY_IN_PROGRESS",
            AppointmentError::TooLateToModify(_) => "TOO_LATE_TO_MODIFY",
            AppointmentError::Forbidden(_) => "FORBIDDEN",
            AppointmentError::Storage(_) => "INTERNAL",
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let code = err.code();
        match err {
            AppointmentError::ValidationError(msg) => AppError::Validation(code, msg),
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::ClinicNotFound
            | AppointmentError::DoctorNotAffiliated => AppError::NotFound(code, err.to_string()),
            AppointmentError::SchedulingConflict
            | AppointmentError::AlreadyCancelled
            | AppointmentError::AlreadyCompleted
            | AppointmentError::AlreadyConfirmed
            | AppointmentError::AlreadyInProgress => AppError::Conflict(code, err.to_string()),
            AppointmentError::TooLateToModify(_) => AppError::Policy(code, err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(code, msg),
            AppointmentError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn actor(role: Role, id: i64, clinic_id: Option<i64>) -> Actor {
        Actor { id, role, clinic_id, email: None }
    }

    #[test]
    fn scope_follows_role() {
        assert_eq!(AppointmentScope::for_actor(&actor(Role::Admin, 1, None)).unwrap(), AppointmentScope::Admin);
        assert_eq!(
            AppointmentScope::for_actor(&actor(Role::ClinicStaff, 2, Some(7))).unwrap(),
            AppointmentScope::Clinic(7)
        );
        assert_eq!(AppointmentScope::for_actor(&actor(Role::Doctor, 3, None)).unwrap(), AppointmentScope::Doctor(3));
        assert_eq!(AppointmentScope::for_actor(&actor(Role::Patient, 4, None)).unwrap(), AppointmentScope::Patient(4));
    }

    #[test]
    fn clinic_staff_without_clinic_is_forbidden() {
        let err = AppointmentScope::for_actor(&actor(Role::ClinicStaff, 2, None)).unwrap_err();
        assert_eq!(AppError::from(err).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn error_categories_map_to_http_statuses() {
        let cases = [
            (AppointmentError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AppointmentError::DoctorNotAffiliated, StatusCode::NOT_FOUND),
            (AppointmentError::AlreadyCompleted, StatusCode::CONFLICT),
            (AppointmentError::SchedulingConflict, StatusCode::CONFLICT),
            (AppointmentError::TooLateToModify(60), StatusCode::UNPROCESSABLE_ENTITY),
            (AppointmentError::Storage(StoreError::Unavailable("down".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn exclusion_violation_becomes_scheduling_conflict() {
        let err = AppointmentError::from(StoreError::Conflict("23P01".into()));
        assert_eq!(err.code(), "SCHEDULING_CONFLICT");
    }

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<AppointmentStatus>().unwrap(), status);
        }
    }
}
