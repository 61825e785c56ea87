// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join;
use tracing::debug;

use shared_config::SchedulingPolicy;
use shared_database::ReferenceDirectory;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilters, AppointmentQuery, AppointmentScope,
    NameMatch, Page,
};
use crate::services::store::AppointmentStore;

/// Single listing path for every actor. The scope only contributes a
/// predicate; paging and ordering are identical for all of them.
pub struct AppointmentQueryService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn ReferenceDirectory>,
    default_page_size: u32,
    max_page_size: u32,
}

impl AppointmentQueryService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn ReferenceDirectory>,
        policy: &SchedulingPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            default_page_size: policy.default_page_size,
            max_page_size: policy.max_page_size,
        }
    }

    pub async fn list_appointments(
        &self,
        scope: AppointmentScope,
        filters: AppointmentFilters,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let (page, page_size) = self.clamp_paging(filters.page, filters.page_size);

        if let (Some(from), Some(to)) = (filters.from, filters.to) {
            if from > to {
                return Err(AppointmentError::ValidationError(
                    "from must not be after to".to_string(),
                ));
            }
        }

        let name_match = match (scope, filters.search.as_deref().map(str::trim)) {
            (AppointmentScope::Admin, Some(term)) if !term.is_empty() => Some(self.resolve_names(term).await?),
            _ => None,
        };

        let mut query = AppointmentQuery {
            doctor_id: filters.doctor_id,
            clinic_id: filters.clinic_id,
            patient_id: filters.patient_id,
            status: filters.status,
            start_from: filters.from.map(start_of_day),
            start_before: filters.to.and_then(|to| to.succ_opt()).map(start_of_day),
            name_match,
            offset: u64::from(page - 1) * u64::from(page_size),
            limit: u64::from(page_size),
        };

        match scope {
            AppointmentScope::Admin => {}
            AppointmentScope::Clinic(id) => query.clinic_id = Some(id),
            AppointmentScope::Doctor(id) => query.doctor_id = Some(id),
            AppointmentScope::Patient(id) => query.patient_id = Some(id),
        }

        debug!("Listing appointments for {:?}: {:?}", scope, query);

        let (items, total) = if query.name_match.as_ref().is_some_and(NameMatch::is_empty) {
            (Vec::new(), 0)
        } else {
            self.store.query(&query).await?
        };

        Ok(Page {
            items,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(u64::from(page_size)),
        })
    }

    /// `page` is clamped up to 1, `page_size` into `[1, max]`.
    pub fn clamp_paging(&self, page: Option<u32>, page_size: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1));
        (page, page_size)
    }

    async fn resolve_names(&self, term: &str) -> Result<NameMatch, AppointmentError> {
        let (doctor_ids, patient_ids) = try_join(
            self.directory.search_doctors(term),
            self.directory.search_patients(term),
        )
        .await?;

        Ok(NameMatch { doctor_ids, patient_ids })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
