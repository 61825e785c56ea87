// libs/appointment-cell/src/services/store.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::{StoreError, SupabaseClient};

use crate::models::{Appointment, AppointmentQuery, AppointmentStatus, NewAppointment};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists a new appointment in `Pending` status.
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError>;

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    /// Non-terminal appointments of the pair whose `[start, end)` overlaps the
    /// given interval, ordered by start.
    async fn find_active_overlapping(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// One page of matches ordered by start descending (id descending on
    /// ties), plus the total match count.
    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

type PairKey = (i64, i64, DateTime<Utc>, i64);

#[derive(Default)]
struct Tables {
    rows: HashMap<i64, Appointment>,
    by_pair: BTreeSet<PairKey>,
    last_id: i64,
    /// Longest `end - start` ever stored; bounds how far back an overlap can start.
    longest: Duration,
}

impl Tables {
    fn index(&mut self, appointment: &Appointment) {
        self.longest = self.longest.max(appointment.end_time - appointment.start_time);
        self.by_pair.insert(pair_key(appointment));
    }
}

fn pair_key(appointment: &Appointment) -> PairKey {
    (appointment.doctor_id, appointment.clinic_id, appointment.start_time, appointment.id)
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    tables: RwLock<Tables>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(appointment: &Appointment, query: &AppointmentQuery) -> bool {
    query.doctor_id.map_or(true, |id| appointment.doctor_id == id)
        && query.clinic_id.map_or(true, |id| appointment.clinic_id == id)
        && query.patient_id.map_or(true, |id| appointment.patient_id == id)
        && query.status.map_or(true, |status| appointment.status == status)
        && query.start_from.map_or(true, |from| appointment.start_time >= from)
        && query.start_before.map_or(true, |before| appointment.start_time < before)
        && query.name_match.as_ref().map_or(true, |m| m.matches(appointment))
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_id += 1;

        let now = Utc::now();
        let created = Appointment {
            id: tables.last_id,
            doctor_id: appointment.doctor_id,
            clinic_id: appointment.clinic_id,
            patient_id: appointment.patient_id,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: AppointmentStatus::Pending,
            notes: appointment.notes,
            feedback: None,
            created_at: now,
            updated_at: now,
        };

        tables.index(&created);
        tables.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;

        let previous = tables
            .rows
            .get(&appointment.id)
            .map(pair_key)
            .ok_or_else(|| StoreError::Unavailable(format!("appointment {} vanished", appointment.id)))?;

        let updated = Appointment {
            updated_at: Utc::now(),
            ..appointment.clone()
        };

        tables.by_pair.remove(&previous);
        tables.index(&updated);
        tables.rows.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_active_overlapping(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;

        // An overlapping appointment starts in `(start - longest, end)`.
        let earliest = start
            .checked_sub_signed(tables.longest)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let lower = (doctor_id, clinic_id, earliest, i64::MIN);
        let upper = (doctor_id, clinic_id, end, i64::MIN);

        let found = tables
            .by_pair
            .range(lower..upper)
            .filter_map(|(_, _, _, id)| tables.rows.get(id))
            .filter(|a| Some(a.id) != exclude_id)
            .filter(|a| a.blocks_schedule() && a.end_time > start)
            .cloned()
            .collect();

        Ok(found)
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError> {
        let tables = self.tables.read().await;

        let mut matched: Vec<&Appointment> = tables
            .rows
            .values()
            .filter(|a| matches_query(a, query))
            .collect();
        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

/// PostgREST-backed store. Overlap safety across processes relies on the
/// `appointments_no_overlap` exclusion constraint; a violation surfaces as
/// `StoreError::Conflict`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn timestamp(value: DateTime<Utc>) -> String {
        urlencoding::encode(&value.to_rfc3339()).into_owned()
    }

    fn id_list(ids: &[i64]) -> String {
        ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
    }

    fn first(rows: Vec<Appointment>, action: &str) -> Result<Appointment, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("{} returned no representation", action)))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "doctor_id": appointment.doctor_id,
            "clinic_id": appointment.clinic_id,
            "patient_id": appointment.patient_id,
            "start_time": appointment.start_time.to_rfc3339(),
            "end_time": appointment.end_time.to_rfc3339(),
            "status": AppointmentStatus::Pending.to_string(),
            "notes": appointment.notes,
            "feedback": null,
            "created_at": now,
            "updated_at": now,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                None,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await?;

        Self::first(rows, "insert")
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let body = json!({
            "start_time": appointment.start_time.to_rfc3339(),
            "end_time": appointment.end_time.to_rfc3339(),
            "status": appointment.status.to_string(),
            "notes": appointment.notes,
            "feedback": appointment.feedback,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await?;

        Self::first(rows, "update")
    }

    async fn find_active_overlapping(
        &self,
        doctor_id: i64,
        clinic_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("clinic_id=eq.{}", clinic_id),
            "status=not.in.(completed,cancelled)".to_string(),
            format!("start_time=lt.{}", Self::timestamp(end)),
            format!("end_time=gt.{}", Self::timestamp(start)),
        ];
        if let Some(id) = exclude_id {
            query_parts.push(format!("id=neq.{}", id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );
        debug!("Checking overlaps: {}", path);

        self.supabase.request(Method::GET, &path, None, None).await
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<(Vec<Appointment>, u64), StoreError> {
        let mut query_parts = Vec::new();

        if let Some(id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", id));
        }
        if let Some(id) = query.clinic_id {
            query_parts.push(format!("clinic_id=eq.{}", id));
        }
        if let Some(id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.start_from {
            query_parts.push(format!("start_time=gte.{}", Self::timestamp(from)));
        }
        if let Some(before) = query.start_before {
            query_parts.push(format!("start_time=lt.{}", Self::timestamp(before)));
        }
        if let Some(name_match) = &query.name_match {
            let mut alternatives = Vec::new();
            if !name_match.doctor_ids.is_empty() {
                alternatives.push(format!("doctor_id.in.({})", Self::id_list(&name_match.doctor_ids)));
            }
            if !name_match.patient_ids.is_empty() {
                alternatives.push(format!("patient_id.in.({})", Self::id_list(&name_match.patient_ids)));
            }
            if alternatives.is_empty() {
                return Ok((Vec::new(), 0));
            }
            query_parts.push(format!("or=({})", alternatives.join(",")));
        }

        query_parts.push("order=start_time.desc,id.desc".to_string());
        query_parts.push(format!("offset={}", query.offset));
        query_parts.push(format!("limit={}", query.limit));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        debug!("Querying appointments: {}", path);

        let (rows, total): (Vec<Appointment>, Option<u64>) =
            self.supabase.request_with_count(&path, None).await?;
        let total = total.unwrap_or(query.offset + rows.len() as u64);

        Ok((rows, total))
    }
}
