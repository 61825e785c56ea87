// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument, warn};

use shared_config::SchedulingPolicy;
use shared_database::ReferenceDirectory;
use shared_models::auth::{Actor, Role};
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentScope, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, ConflictCheckQuery, ConflictCheckResponse, Initiator,
    NewAppointment, RescheduleAppointmentRequest, MAX_FEEDBACK_LENGTH, MAX_NOTES_LENGTH,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentAction, AppointmentLifecycleService};
use crate::services::locks::{PairGuard, SchedulingLocks};
use crate::services::store::AppointmentStore;

/// Booking engine: creates, moves and transitions appointments. Every write
/// that depends on the free/busy state of a (doctor, clinic) pair runs under
/// that pair's lock.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn ReferenceDirectory>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    locks: SchedulingLocks,
    clock: Arc<dyn Clock>,
    policy: SchedulingPolicy,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn ReferenceDirectory>,
        clock: Arc<dyn Clock>,
        policy: SchedulingPolicy,
    ) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(store.clone()),
            lifecycle_service: AppointmentLifecycleService::new(),
            locks: SchedulingLocks::new(),
            store,
            directory,
            clock,
            policy,
        }
    }

    fn booked_duration(&self) -> Duration {
        self.policy.appointment_duration()
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, actor), fields(actor_id = actor.id))]
    pub async fn book_appointment(
        &self,
        actor: &Actor,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment for patient {} with doctor {} at clinic {}",
               request.patient_id, request.doctor_id, request.clinic_id);

        validate_booking_request(&request)?;
        ensure_can_book(actor, &request)?;

        self.require_active_doctor(request.doctor_id).await?;
        self.require_active_patient(request.patient_id).await?;
        self.require_active_clinic(request.clinic_id).await?;
        self.require_affiliation(request.doctor_id, request.clinic_id).await?;

        let start_time = request.start_time;
        let end_time = start_time + self.booked_duration();

        let _guard = self.locks.acquire(request.doctor_id, request.clinic_id).await;

        self.conflict_service
            .ensure_free(request.doctor_id, request.clinic_id, start_time, end_time, None)
            .await?;

        let appointment = self
            .store
            .insert(NewAppointment {
                doctor_id: request.doctor_id,
                clinic_id: request.clinic_id,
                patient_id: request.patient_id,
                start_time,
                end_time,
                notes: request.notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        info!("Appointment {} booked for doctor {} at clinic {} from {} to {}",
              appointment.id, appointment.doctor_id, appointment.clinic_id, start_time, end_time);

        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let scope = AppointmentScope::for_actor(actor)?;
        self.load_in_scope(scope, appointment_id).await
    }

    // ==============================================================================
    // RESCHEDULING
    // ==============================================================================

    /// Moves the appointment to `new_start_time` and restarts its lifecycle at
    /// `Pending`, whatever the previous non-terminal status was.
    #[instrument(skip(self, actor), fields(actor_id = actor.id))]
    pub async fn reschedule_appointment(
        &self,
        actor: &Actor,
        appointment_id: i64,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {} to {}", appointment_id, request.new_start_time);

        let min_minutes = self.min_minutes(request.min_minutes_before_start)?;
        let scope = AppointmentScope::for_actor(actor)?;
        let (_guard, current) = self.lock_appointment(scope, appointment_id).await?;

        match current.status {
            AppointmentStatus::Cancelled => return Err(AppointmentError::AlreadyCancelled),
            AppointmentStatus::Completed => return Err(AppointmentError::AlreadyCompleted),
            _ => {}
        }

        self.lifecycle_service
            .ensure_not_too_late(current.start_time, self.clock.now(), min_minutes)?;

        let start_time = request.new_start_time;
        let end_time = start_time + self.booked_duration();

        self.conflict_service
            .ensure_free(current.doctor_id, current.clinic_id, start_time, end_time, Some(current.id))
            .await?;

        let previous_status = current.status;
        let updated = self
            .store
            .update(&Appointment {
                start_time,
                end_time,
                status: AppointmentStatus::Pending,
                ..current
            })
            .await?;

        info!("Appointment {} rescheduled to {} ({} -> pending)",
              updated.id, start_time, previous_status);

        Ok(updated)
    }

    // ==============================================================================
    // STATUS TRANSITIONS
    // ==============================================================================

    /// Cancels the appointment. Clinic-initiated cancellations skip the
    /// lateness guard; a supplied reason is appended to the notes.
    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        appointment_id: i64,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        self.lifecycle_service.ensure_role_may(actor.role, AppointmentAction::Cancel)?;
        let min_minutes = self.min_minutes(request.min_minutes_before_start)?;
        let initiator = Initiator::from(actor.role);

        let scope = AppointmentScope::for_actor(actor)?;
        let (_guard, current) = self.lock_appointment(scope, appointment_id).await?;

        let next = self.lifecycle_service.apply(current.status, AppointmentAction::Cancel)?;

        if initiator.is_lateness_guarded() {
            self.lifecycle_service
                .ensure_not_too_late(current.start_time, self.clock.now(), min_minutes)?;
        }

        let notes = match request.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => append_line(
                current.notes.clone(),
                format!("Cancelled by {}: {}", initiator.label(), reason),
            ),
            _ => current.notes.clone(),
        };

        let updated = self
            .store
            .update(&Appointment {
                status: next,
                notes,
                ..current
            })
            .await?;

        info!("Appointment {} cancelled by {}", updated.id, initiator.label());
        Ok(updated)
    }

    pub async fn confirm_appointment(
        &self,
        actor: &Actor,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        self.apply_action(actor, appointment_id, AppointmentAction::Confirm).await
    }

    pub async fn mark_in_progress(
        &self,
        actor: &Actor,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        self.apply_action(actor, appointment_id, AppointmentAction::MarkInProgress).await
    }

    pub async fn complete_appointment(
        &self,
        actor: &Actor,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        self.apply_action(actor, appointment_id, AppointmentAction::Complete).await
    }

    async fn apply_action(
        &self,
        actor: &Actor,
        appointment_id: i64,
        action: AppointmentAction,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Applying {} to appointment {}", action, appointment_id);

        self.lifecycle_service.ensure_role_may(actor.role, action)?;
        let scope = AppointmentScope::for_actor(actor)?;
        let (_guard, current) = self.lock_appointment(scope, appointment_id).await?;

        let previous = current.status;
        let next = self.lifecycle_service.apply(previous, action)?;

        let updated = self
            .store
            .update(&Appointment {
                status: next,
                ..current
            })
            .await?;

        info!("Appointment {} status changed: {} -> {}", updated.id, previous, next);
        Ok(updated)
    }

    // ==============================================================================
    // FEEDBACK AND CONFLICT CHECKS
    // ==============================================================================

    /// Doctor-authored schedule feedback; replaces any earlier feedback.
    pub async fn leave_feedback(
        &self,
        actor: &Actor,
        appointment_id: i64,
        feedback: String,
    ) -> Result<Appointment, AppointmentError> {
        if actor.role != Role::Doctor {
            return Err(AppointmentError::Forbidden(
                "Only the treating doctor can leave schedule feedback".to_string(),
            ));
        }

        let feedback = feedback.trim().to_string();
        if feedback.is_empty() {
            return Err(AppointmentError::ValidationError("Feedback must not be empty".to_string()));
        }
        if feedback.chars().count() > MAX_FEEDBACK_LENGTH {
            return Err(AppointmentError::ValidationError(format!(
                "Feedback must be at most {} characters",
                MAX_FEEDBACK_LENGTH
            )));
        }

        let scope = AppointmentScope::for_actor(actor)?;
        let (_guard, current) = self.lock_appointment(scope, appointment_id).await?;

        if current.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let updated = self
            .store
            .update(&Appointment {
                feedback: Some(feedback),
                ..current
            })
            .await?;

        info!("Feedback recorded on appointment {}", updated.id);
        Ok(updated)
    }

    /// Read-only conflict lookup. Conflicting appointments outside the
    /// caller's scope still count but are not listed.
    pub async fn check_conflicts(
        &self,
        actor: &Actor,
        query: ConflictCheckQuery,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let scope = AppointmentScope::for_actor(actor)?;
        let end_time = query
            .end_time
            .unwrap_or_else(|| query.start_time + self.booked_duration());

        let mut response = self
            .conflict_service
            .check_conflicts(
                query.doctor_id,
                query.clinic_id,
                query.start_time,
                end_time,
                query.exclude_appointment_id,
            )
            .await?;

        response.conflicting_appointments.retain(|a| scope.permits(a));
        Ok(response)
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn load_in_scope(
        &self,
        scope: AppointmentScope,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        match self.store.get(appointment_id).await? {
            Some(appointment) if scope.permits(&appointment) => Ok(appointment),
            Some(_) => {
                warn!("Appointment {} requested outside of scope {:?}", appointment_id, scope);
                Err(AppointmentError::NotFound)
            }
            None => Err(AppointmentError::NotFound),
        }
    }

    /// Takes the pair lock of an existing appointment and re-reads it under
    /// the lock. Doctor and clinic never change, so the pair is stable.
    async fn lock_appointment(
        &self,
        scope: AppointmentScope,
        appointment_id: i64,
    ) -> Result<(PairGuard, Appointment), AppointmentError> {
        let snapshot = self.load_in_scope(scope, appointment_id).await?;
        let guard = self.locks.acquire(snapshot.doctor_id, snapshot.clinic_id).await;
        let current = self.load_in_scope(scope, appointment_id).await?;
        Ok((guard, current))
    }

    fn min_minutes(&self, requested: Option<i64>) -> Result<i64, AppointmentError> {
        let minutes = requested.unwrap_or(self.policy.min_minutes_before_start);
        if minutes < 0 || Duration::try_minutes(minutes).is_none() {
            return Err(AppointmentError::ValidationError(
                "min_minutes_before_start must be a non-negative number of minutes in range".to_string(),
            ));
        }
        Ok(minutes)
    }

    async fn require_active_doctor(&self, doctor_id: i64) -> Result<(), AppointmentError> {
        match self.directory.doctor(doctor_id).await? {
            Some(doctor) if doctor.is_active => Ok(()),
            _ => Err(AppointmentError::DoctorNotFound),
        }
    }

    async fn require_active_patient(&self, patient_id: i64) -> Result<(), AppointmentError> {
        match self.directory.patient(patient_id).await? {
            Some(patient) if patient.is_active => Ok(()),
            _ => Err(AppointmentError::PatientNotFound),
        }
    }

    async fn require_active_clinic(&self, clinic_id: i64) -> Result<(), AppointmentError> {
        match self.directory.clinic(clinic_id).await? {
            Some(clinic) if clinic.is_active => Ok(()),
            _ => Err(AppointmentError::ClinicNotFound),
        }
    }

    async fn require_affiliation(&self, doctor_id: i64, clinic_id: i64) -> Result<(), AppointmentError> {
        match self.directory.affiliation(doctor_id, clinic_id).await? {
            Some(affiliation) if affiliation.is_active => Ok(()),
            _ => Err(AppointmentError::DoctorNotAffiliated),
        }
    }
}

fn validate_booking_request(request: &BookAppointmentRequest) -> Result<(), AppointmentError> {
    if request.doctor_id <= 0 || request.clinic_id <= 0 || request.patient_id <= 0 {
        return Err(AppointmentError::ValidationError(
            "doctor_id, clinic_id and patient_id must be positive".to_string(),
        ));
    }

    if let Some(notes) = &request.notes {
        if notes.chars().count() > MAX_NOTES_LENGTH {
            return Err(AppointmentError::ValidationError(format!(
                "Notes must be at most {} characters",
                MAX_NOTES_LENGTH
            )));
        }
    }

    Ok(())
}

/// Admins book for anyone; everyone else only inside their own scope.
fn ensure_can_book(actor: &Actor, request: &BookAppointmentRequest) -> Result<(), AppointmentError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::ClinicStaff => actor.clinic_id == Some(request.clinic_id),
        Role::Doctor => actor.id == request.doctor_id,
        Role::Patient => actor.id == request.patient_id,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden(
            "Not authorized to book this appointment".to_string(),
        ))
    }
}

fn append_line(notes: Option<String>, line: String) -> Option<String> {
    match notes {
        Some(existing) if !existing.trim().is_empty() => Some(format!("{}\n{}", existing, line)),
        _ => Some(line),
    }
}
