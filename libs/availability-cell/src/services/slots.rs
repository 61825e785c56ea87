// libs/availability-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use tracing::debug;

use shared_database::ReferenceDirectory;

use crate::models::{AvailabilityError, DateRangeQuery, TimeSegment, WindowFilter};
use crate::services::store::AvailabilityStore;

/// Windows never cross a calendar day, so nothing longer can fit one.
pub const MAX_SEGMENT_MINUTES: i64 = 24 * 60;

/// Turns availability windows into working days and candidate segments.
pub struct SlotGeneratorService {
    store: Arc<dyn AvailabilityStore>,
    directory: Arc<dyn ReferenceDirectory>,
    horizon_months: u32,
}

impl SlotGeneratorService {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        directory: Arc<dyn ReferenceDirectory>,
        horizon_months: u32,
    ) -> Self {
        Self {
            store,
            directory,
            horizon_months,
        }
    }

    /// Distinct dates in `[from, to]` carrying at least one bookable window,
    /// ascending. Defaults to today through today plus the configured horizon.
    pub async fn list_working_days(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        range: DateRangeQuery,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, AvailabilityError> {
        let from = range.from.unwrap_or(today);
        let to = match range.to {
            Some(to) => to,
            None => from
                .checked_add_months(Months::new(self.horizon_months))
                .ok_or_else(|| AvailabilityError::ValidationError("Date range out of bounds".to_string()))?,
        };

        if from > to {
            return Err(AvailabilityError::ValidationError(
                "from must not be after to".to_string(),
            ));
        }

        self.require_affiliation(doctor_id, clinic_id).await?;

        debug!("Listing working days for doctor {} at clinic {} between {} and {}",
               doctor_id, clinic_id, from, to);

        let windows = self
            .store
            .list(&WindowFilter {
                doctor_id,
                clinic_id,
                from,
                to,
                bookable_only: true,
            })
            .await?;

        let mut days: Vec<NaiveDate> = windows.iter().map(|w| w.date()).collect();
        days.sort_unstable();
        days.dedup();

        Ok(days)
    }

    /// Candidate segments for `date`, window by window in start order.
    pub async fn generate_segments(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        date: NaiveDate,
        segment_minutes: i64,
        step_minutes: i64,
    ) -> Result<Vec<TimeSegment>, AvailabilityError> {
        let segment = minutes_in_day("segment_minutes", segment_minutes)?;
        let step = minutes_in_day("step_minutes", step_minutes)?;

        self.require_affiliation(doctor_id, clinic_id).await?;

        let windows = self
            .store
            .list(&WindowFilter {
                doctor_id,
                clinic_id,
                from: date,
                to: date,
                bookable_only: true,
            })
            .await?;

        let segments: Vec<TimeSegment> = windows
            .iter()
            .flat_map(|w| slide_segments(w.start_time, w.end_time, segment, step))
            .collect();

        debug!("Generated {} segments from {} windows for doctor {} at clinic {} on {}",
               segments.len(), windows.len(), doctor_id, clinic_id, date);

        Ok(segments)
    }

    async fn require_affiliation(&self, doctor_id: i64, clinic_id: i64) -> Result<(), AvailabilityError> {
        match self.directory.affiliation(doctor_id, clinic_id).await? {
            Some(affiliation) if affiliation.is_active => Ok(()),
            _ => Err(AvailabilityError::DoctorNotAffiliated),
        }
    }
}

/// Slides a `segment`-long cursor across `[start, end)` in `step` increments,
/// keeping every position that still ends inside the window.
pub fn slide_segments(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    segment: Duration,
    step: Duration,
) -> Vec<TimeSegment> {
    let mut segments = Vec::new();
    if segment <= Duration::zero() || step <= Duration::zero() {
        return segments;
    }

    let mut cursor = start;
    while let Some(segment_end) = cursor.checked_add_signed(segment) {
        if segment_end > end {
            break;
        }
        segments.push(TimeSegment {
            start_time: cursor,
            end_time: segment_end,
        });
        match cursor.checked_add_signed(step) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    segments
}

fn minutes_in_day(name: &str, minutes: i64) -> Result<Duration, AvailabilityError> {
    if !(1..=MAX_SEGMENT_MINUTES).contains(&minutes) {
        return Err(AvailabilityError::ValidationError(format!(
            "{} must be between 1 and {}",
            name, MAX_SEGMENT_MINUTES
        )));
    }
    Ok(Duration::minutes(minutes))
}
