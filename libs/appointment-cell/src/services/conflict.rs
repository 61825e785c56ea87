// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentError, ConflictCheckResponse};
use crate::services::store::AppointmentStore;

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share at
/// least one instant. Touching endpoints do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Active appointments of the (doctor, clinic) pair that overlap the
    /// interval. Appointments of the same doctor at other clinics are not
    /// considered.
    pub async fn check_conflicts(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<i64>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }

        debug!("Checking conflicts for doctor {} at clinic {} from {} to {}",
               doctor_id, clinic_id, start_time, end_time);

        let candidates = self
            .store
            .find_active_overlapping(doctor_id, clinic_id, start_time, end_time, exclude_appointment_id)
            .await?;

        // The store narrows by interval; re-test here so adapters with
        // coarser filters cannot widen the result.
        let conflicting_appointments: Vec<_> = candidates
            .into_iter()
            .filter(|a| a.blocks_schedule())
            .filter(|a| intervals_overlap(start_time, end_time, a.start_time, a.end_time))
            .collect();

        let has_conflict = !conflicting_appointments.is_empty();
        if has_conflict {
            warn!("Conflict detected for doctor {} at clinic {} - {} conflicting appointments",
                  doctor_id, clinic_id, conflicting_appointments.len());
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }

    /// Fails with `SchedulingConflict` when the interval is taken.
    pub async fn ensure_free(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<i64>,
    ) -> Result<(), AppointmentError> {
        let result = self
            .check_conflicts(doctor_id, clinic_id, start_time, end_time, exclude_appointment_id)
            .await?;

        if result.has_conflict {
            return Err(AppointmentError::SchedulingConflict);
        }
        Ok(())
    }
}
