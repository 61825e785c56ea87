// libs/availability-cell/src/services/store.rs
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::{StoreError, SupabaseClient};

use crate::models::{AvailabilityWindow, NewAvailabilityWindow, WindowFilter};

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, StoreError>;

    async fn update(&self, window: &AvailabilityWindow) -> Result<AvailabilityWindow, StoreError>;

    /// Matching windows ordered by start time.
    async fn list(&self, filter: &WindowFilter) -> Result<Vec<AvailabilityWindow>, StoreError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    windows: RwLock<BTreeMap<i64, AvailabilityWindow>>,
    next_id: AtomicI64,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(window: &AvailabilityWindow, filter: &WindowFilter) -> bool {
    let date = window.date();
    window.doctor_id == filter.doctor_id
        && window.clinic_id == filter.clinic_id
        && date >= filter.from
        && date <= filter.to
        && (!filter.bookable_only || window.is_bookable())
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let created = AvailabilityWindow {
            id,
            affiliation_id: window.affiliation_id,
            doctor_id: window.doctor_id,
            clinic_id: window.clinic_id,
            start_time: window.start_time,
            end_time: window.end_time,
            is_active: true,
            removed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.windows.write().await.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, StoreError> {
        Ok(self.windows.read().await.get(&id).cloned())
    }

    async fn update(&self, window: &AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let mut windows = self.windows.write().await;
        let slot = windows
            .get_mut(&window.id)
            .ok_or_else(|| StoreError::Unavailable(format!("window {} vanished", window.id)))?;

        *slot = AvailabilityWindow {
            updated_at: Utc::now(),
            ..window.clone()
        };
        Ok(slot.clone())
    }

    async fn list(&self, filter: &WindowFilter) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let mut found: Vec<AvailabilityWindow> = self
            .windows
            .read()
            .await
            .values()
            .filter(|w| matches(w, filter))
            .cloned()
            .collect();

        found.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn day_start(date: NaiveDate) -> String {
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().to_rfc3339())
            .unwrap_or_default()
    }

    fn first(rows: Vec<AvailabilityWindow>, action: &str) -> Result<AvailabilityWindow, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("{} returned no representation", action)))
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "affiliation_id": window.affiliation_id,
            "doctor_id": window.doctor_id,
            "clinic_id": window.clinic_id,
            "start_time": window.start_time.to_rfc3339(),
            "end_time": window.end_time.to_rfc3339(),
            "is_active": true,
            "removed_at": null,
            "created_at": now,
            "updated_at": now,
        });

        let rows: Vec<AvailabilityWindow> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/availability_windows",
                None,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await?;

        Self::first(rows, "insert")
    }

    async fn get(&self, id: i64) -> Result<Option<AvailabilityWindow>, StoreError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", id);
        let rows: Vec<AvailabilityWindow> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, window: &AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let body = json!({
            "start_time": window.start_time.to_rfc3339(),
            "end_time": window.end_time.to_rfc3339(),
            "is_active": window.is_active,
            "removed_at": window.removed_at.map(|t| t.to_rfc3339()),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/availability_windows?id=eq.{}", window.id);
        let rows: Vec<AvailabilityWindow> = self
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

    async fn list(&self, filter: &WindowFilter) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let upper = filter.to.succ_opt().unwrap_or(filter.to);

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", filter.doctor_id),
            format!("clinic_id=eq.{}", filter.clinic_id),
            format!("start_time=gte.{}", urlencoding::encode(&Self::day_start(filter.from))),
            format!("start_time=lt.{}", urlencoding::encode(&Self::day_start(upper))),
        ];
        if filter.bookable_only {
            query_parts.push("is_active=eq.true".to_string());
            query_parts.push("removed_at=is.null".to_string());
        }

        let path = format!(
            "/rest/v1/availability_windows?{}&order=start_time.asc,id.asc",
            query_parts.join("&")
        );
        debug!("Listing availability windows: {}", path);

        self.supabase.request(Method::GET, &path, None, None).await
    }
}
