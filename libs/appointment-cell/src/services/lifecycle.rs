// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_models::auth::Role;

use crate::models::{AppointmentError, AppointmentStatus};

/// State-machine actions. Reschedule is not an action here: it always
/// restarts the lifecycle at `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Confirm,
    MarkInProgress,
    Complete,
    Cancel,
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentAction::Confirm => write!(f, "confirm"),
            AppointmentAction::MarkInProgress => write!(f, "start"),
            AppointmentAction::Complete => write!(f, "complete"),
            AppointmentAction::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(AppointmentStatus),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyCancelled,
    AlreadyCompleted,
    AlreadyConfirmed,
    AlreadyInProgress,
}

impl From<Rejection> for AppointmentError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::AlreadyCancelled => AppointmentError::AlreadyCancelled,
            Rejection::AlreadyCompleted => AppointmentError::AlreadyCompleted,
            Rejection::AlreadyConfirmed => AppointmentError::AlreadyConfirmed,
            Rejection::AlreadyInProgress => AppointmentError::AlreadyInProgress,
        }
    }
}

/// The full (status × action) table.
pub fn transition(current: AppointmentStatus, action: AppointmentAction) -> Transition {
    use AppointmentAction as A;
    use AppointmentStatus as S;
    use Transition::{Rejected, To};

    match (current, action) {
        (S::Cancelled, _) => Rejected(Rejection::AlreadyCancelled),
        (S::Completed, _) => Rejected(Rejection::AlreadyCompleted),

        (S::Confirmed, A::Confirm) => Rejected(Rejection::AlreadyConfirmed),
        (S::InProgress, A::MarkInProgress) => Rejected(Rejection::AlreadyInProgress),

        (S::Pending | S::Confirmed | S::InProgress, A::Confirm) => To(S::Confirmed),
        (S::Pending | S::Confirmed | S::InProgress, A::MarkInProgress) => To(S::InProgress),
        (S::Pending | S::Confirmed | S::InProgress, A::Complete) => To(S::Completed),
        (S::Pending | S::Confirmed | S::InProgress, A::Cancel) => To(S::Cancelled),
    }
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Next status for `action`, or the typed state conflict.
    pub fn apply(
        &self,
        current: AppointmentStatus,
        action: AppointmentAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        match transition(current, action) {
            Transition::To(next) => {
                debug!("Status transition validated: {} -[{}]-> {}", current, action, next);
                Ok(next)
            }
            Transition::Rejected(rejection) => {
                warn!("Invalid status transition attempted: {} -[{}]", current, action);
                Err(rejection.into())
            }
        }
    }

    /// Rejects a change once the appointment starts within `min_minutes` of `now`.
    pub fn ensure_not_too_late(
        &self,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
        min_minutes: i64,
    ) -> Result<(), AppointmentError> {
        let guard = Duration::try_minutes(min_minutes).ok_or_else(|| {
            AppointmentError::ValidationError(format!("{} minutes is out of range", min_minutes))
        })?;
        if start_time - now < guard {
            return Err(AppointmentError::TooLateToModify(min_minutes));
        }
        Ok(())
    }

    /// Role gate for state-machine actions. Cancel is open to every role;
    /// the lateness guard is applied separately per initiator.
    pub fn ensure_role_may(&self, role: Role, action: AppointmentAction) -> Result<(), AppointmentError> {
        let allowed = match action {
            AppointmentAction::Cancel => true,
            AppointmentAction::Confirm | AppointmentAction::MarkInProgress | AppointmentAction::Complete => {
                !matches!(role, Role::Patient)
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(format!(
                "Role {} may not {} appointments",
                role, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    const ALL_STATUSES: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    const ALL_ACTIONS: [AppointmentAction; 4] = [
        AppointmentAction::Confirm,
        AppointmentAction::MarkInProgress,
        AppointmentAction::Complete,
        AppointmentAction::Cancel,
    ];

    #[test]
    fn terminal_states_reject_every_action_with_their_own_code() {
        for action in ALL_ACTIONS {
            assert_eq!(
                transition(AppointmentStatus::Cancelled, action),
                Transition::Rejected(Rejection::AlreadyCancelled)
            );
            assert_eq!(
                transition(AppointmentStatus::Completed, action),
                Transition::Rejected(Rejection::AlreadyCompleted)
            );
        }
    }

    #[test]
    fn non_terminal_states_accept_every_action_except_repeats() {
        for status in ALL_STATUSES.into_iter().filter(|s| s.is_active()) {
            for action in ALL_ACTIONS {
                let outcome = transition(status, action);
                let repeat = matches!(
                    (status, action),
                    (AppointmentStatus::Confirmed, AppointmentAction::Confirm)
                        | (AppointmentStatus::InProgress, AppointmentAction::MarkInProgress)
                );
                assert_eq!(matches!(outcome, Transition::Rejected(_)), repeat, "{} / {}", status, action);
            }
        }
    }

    #[test]
    fn pending_can_complete_directly() {
        assert_eq!(
            transition(AppointmentStatus::Pending, AppointmentAction::Complete),
            Transition::To(AppointmentStatus::Completed)
        );
    }

    #[test]
    fn lateness_guard_boundary() {
        let lifecycle = AppointmentLifecycleService::new();
        let now = Utc.with_ymd_and_hms(2026, 11, 2, 8, 0, 0).unwrap();

        assert_matches!(
            lifecycle.ensure_not_too_late(now + Duration::minutes(59), now, 60),
            Err(AppointmentError::TooLateToModify(60))
        );
        assert!(lifecycle.ensure_not_too_late(now + Duration::minutes(60), now, 60).is_ok());
        assert!(lifecycle.ensure_not_too_late(now + Duration::minutes(61), now, 60).is_ok());
        assert_matches!(
            lifecycle.ensure_not_too_late(now, now, i64::MAX),
            Err(AppointmentError::ValidationError(_))
        );
    }

    #[test]
    fn patients_may_only_cancel() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.ensure_role_may(Role::Patient, AppointmentAction::Cancel).is_ok());
        assert_matches!(
            lifecycle.ensure_role_may(Role::Patient, AppointmentAction::Confirm),
            Err(AppointmentError::Forbidden(_))
        );
        assert!(lifecycle.ensure_role_may(Role::ClinicStaff, AppointmentAction::Complete).is_ok());
        assert!(lifecycle.ensure_role_may(Role::Doctor, AppointmentAction::MarkInProgress).is_ok());
    }
}
