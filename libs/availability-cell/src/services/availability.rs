// libs/availability-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use tracing::{debug, info};

use shared_database::{Affiliation, ReferenceDirectory};

use crate::models::{
    AvailabilityError, AvailabilityWindow, CreateWindowRequest, DateRangeQuery,
    NewAvailabilityWindow, UpdateWindowRequest, WindowFilter,
};
use crate::services::store::AvailabilityStore;

/// Window management for doctor-at-clinic availability. Windows are not
/// reconciled against booked appointments when they change.
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
    directory: Arc<dyn ReferenceDirectory>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>, directory: Arc<dyn ReferenceDirectory>) -> Self {
        Self { store, directory }
    }

    pub async fn create_window(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        request: CreateWindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Creating availability window for doctor {} at clinic {}", doctor_id, clinic_id);

        validate_window_bounds(request.start_time, request.end_time)?;
        let affiliation = self.require_affiliation(doctor_id, clinic_id).await?;

        let window = self
            .store
            .insert(NewAvailabilityWindow {
                affiliation_id: affiliation.id,
                doctor_id,
                clinic_id,
                start_time: request.start_time,
                end_time: request.end_time,
            })
            .await?;

        info!("Availability window {} created for doctor {} at clinic {}", window.id, doctor_id, clinic_id);
        Ok(window)
    }

    pub async fn get_window(&self, window_id: i64) -> Result<AvailabilityWindow, AvailabilityError> {
        match self.store.get(window_id).await? {
            Some(window) if window.removed_at.is_none() => Ok(window),
            _ => Err(AvailabilityError::WindowNotFound),
        }
    }

    pub async fn update_window(
        &self,
        window_id: i64,
        request: UpdateWindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Updating availability window {}", window_id);

        let current = self.get_window(window_id).await?;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        validate_window_bounds(start_time, end_time)?;

        let updated = self
            .store
            .update(&AvailabilityWindow {
                start_time,
                end_time,
                is_active: request.is_active.unwrap_or(current.is_active),
                ..current
            })
            .await?;

        info!("Availability window {} updated", window_id);
        Ok(updated)
    }

    /// Soft removal; the window stops producing working days and segments.
    pub async fn remove_window(&self, window_id: i64) -> Result<AvailabilityWindow, AvailabilityError> {
        let current = self.get_window(window_id).await?;

        let removed = self
            .store
            .update(&AvailabilityWindow {
                removed_at: Some(Utc::now()),
                ..current
            })
            .await?;

        info!("Availability window {} removed", window_id);
        Ok(removed)
    }

    /// All non-removed windows (active or not) for the pair in the range;
    /// an open range means today through one year ahead.
    pub async fn list_windows(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        range: DateRangeQuery,
        today: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.require_affiliation(doctor_id, clinic_id).await?;

        let from = range.from.unwrap_or(today);
        let to = range
            .to
            .unwrap_or_else(|| from.checked_add_months(Months::new(12)).unwrap_or(from));
        if from > to {
            return Err(AvailabilityError::ValidationError(
                "from must not be after to".to_string(),
            ));
        }

        let mut windows = self
            .store
            .list(&WindowFilter {
                doctor_id,
                clinic_id,
                from,
                to,
                bookable_only: false,
            })
            .await?;
        windows.retain(|w| w.removed_at.is_none());

        Ok(windows)
    }

    async fn require_affiliation(
        &self,
        doctor_id: i64,
        clinic_id: i64,
    ) -> Result<Affiliation, AvailabilityError> {
        match self.directory.affiliation(doctor_id, clinic_id).await? {
            Some(affiliation) if affiliation.is_active => Ok(affiliation),
            _ => Err(AvailabilityError::DoctorNotAffiliated),
        }
    }
}

/// A window must be non-empty and may not cross midnight (UTC).
pub fn validate_window_bounds(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), AvailabilityError> {
    if start_time >= end_time {
        return Err(AvailabilityError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }

    if start_time.date_naive() != end_time.date_naive() {
        return Err(AvailabilityError::ValidationError(
            "Start and end time must fall on the same day".to_string(),
        ));
    }

    Ok(())
}
