use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::supabase::SupabaseClient;

/// A doctor, clinic or patient as seen by the scheduler: an id, a display
/// name and the active flag owned by reference-data management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: i64,
    pub display_name: String,
    pub is_active: bool,
}

/// Doctor-at-clinic association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub id: i64,
    pub doctor_id: i64,
    pub clinic_id: i64,
    pub is_active: bool,
}

/// Read-only lookups into reference data owned by other services.
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    async fn doctor(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError>;

    async fn clinic(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError>;

    async fn patient(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError>;

    async fn affiliation(
        &self,
        doctor_id: i64,
        clinic_id: i64,
    ) -> Result<Option<Affiliation>, StoreError>;

    /// Ids of doctors whose display name contains `term`, case-insensitively.
    async fn search_doctors(&self, term: &str) -> Result<Vec<i64>, StoreError>;

    /// Ids of patients whose display name contains `term`, case-insensitively.
    async fn search_patients(&self, term: &str) -> Result<Vec<i64>, StoreError>;
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Directory seeded once at construction. Used by tests and by the
/// `memory` storage backend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    doctors: HashMap<i64, DirectoryEntry>,
    clinics: HashMap<i64, DirectoryEntry>,
    patients: HashMap<i64, DirectoryEntry>,
    affiliations: HashMap<(i64, i64), Affiliation>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctor(mut self, id: i64, name: &str, is_active: bool) -> Self {
        self.doctors.insert(id, entry(id, name, is_active));
        self
    }

    pub fn with_clinic(mut self, id: i64, name: &str, is_active: bool) -> Self {
        self.clinics.insert(id, entry(id, name, is_active));
        self
    }

    pub fn with_patient(mut self, id: i64, name: &str, is_active: bool) -> Self {
        self.patients.insert(id, entry(id, name, is_active));
        self
    }

    pub fn with_affiliation(mut self, doctor_id: i64, clinic_id: i64, is_active: bool) -> Self {
        let id = self.affiliations.len() as i64 + 1;
        self.affiliations.insert(
            (doctor_id, clinic_id),
            Affiliation { id, doctor_id, clinic_id, is_active },
        );
        self
    }

    pub fn into_shared(self) -> Arc<dyn ReferenceDirectory> {
        Arc::new(self)
    }
}

fn entry(id: i64, name: &str, is_active: bool) -> DirectoryEntry {
    DirectoryEntry {
        id,
        display_name: name.to_string(),
        is_active,
    }
}

fn search(entries: &HashMap<i64, DirectoryEntry>, term: &str) -> Vec<i64> {
    let needle = term.to_lowercase();
    let mut ids: Vec<i64> = entries
        .values()
        .filter(|e| e.display_name.to_lowercase().contains(&needle))
        .map(|e| e.id)
        .collect();
    ids.sort_unstable();
    ids
}

#[async_trait]
impl ReferenceDirectory for InMemoryDirectory {
    async fn doctor(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        Ok(self.doctors.get(&id).cloned())
    }

    async fn clinic(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        Ok(self.clinics.get(&id).cloned())
    }

    async fn patient(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        Ok(self.patients.get(&id).cloned())
    }

    async fn affiliation(
        &self,
        doctor_id: i64,
        clinic_id: i64,
    ) -> Result<Option<Affiliation>, StoreError> {
        Ok(self.affiliations.get(&(doctor_id, clinic_id)).cloned())
    }

    async fn search_doctors(&self, term: &str) -> Result<Vec<i64>, StoreError> {
        Ok(search(&self.doctors, term))
    }

    async fn search_patients(&self, term: &str) -> Result<Vec<i64>, StoreError> {
        Ok(search(&self.patients, term))
    }
}

// ==============================================================================
// SUPABASE DIRECTORY
// ==============================================================================

pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn entry(&self, table: &str, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        debug!("Resolving {} {}", table, id);

        let path = format!(
            "/rest/v1/{}?id=eq.{}&select=id,display_name,is_active",
            table, id
        );
        let rows: Vec<DirectoryEntry> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn search(&self, table: &str, term: &str) -> Result<Vec<i64>, StoreError> {
        let pattern = format!("*{}*", term);
        let path = format!(
            "/rest/v1/{}?display_name=ilike.{}&select=id&order=id.asc",
            table,
            urlencoding::encode(&pattern)
        );
        let rows: Vec<IdRow> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

#[async_trait]
impl ReferenceDirectory for SupabaseDirectory {
    async fn doctor(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        self.entry("doctors", id).await
    }

    async fn clinic(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        self.entry("clinics", id).await
    }

    async fn patient(&self, id: i64) -> Result<Option<DirectoryEntry>, StoreError> {
        self.entry("patients", id).await
    }

    async fn affiliation(
        &self,
        doctor_id: i64,
        clinic_id: i64,
    ) -> Result<Option<Affiliation>, StoreError> {
        let path = format!(
            "/rest/v1/doctor_clinics?doctor_id=eq.{}&clinic_id=eq.{}&select=id,doctor_id,clinic_id,is_active",
            doctor_id, clinic_id
        );
        let rows: Vec<Affiliation> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn search_doctors(&self, term: &str) -> Result<Vec<i64>, StoreError> {
        self.search("doctors", term).await
    }

    async fn search_patients(&self, term: &str) -> Result<Vec<i64>, StoreError> {
        self.search("patients", term).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_search_is_case_insensitive() {
        let directory = InMemoryDirectory::new()
            .with_doctor(1, "Dr. Salma Nour", true)
            .with_doctor(2, "Dr. Omar Fathy", true)
            .with_patient(7, "Nour Hassan", true);

        assert_eq!(directory.search_doctors("nour").await.unwrap(), vec![1]);
        assert_eq!(directory.search_patients("NOUR").await.unwrap(), vec![7]);
        assert!(directory.search_doctors("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_affiliation_is_keyed_by_pair() {
        let directory = InMemoryDirectory::new().with_affiliation(1, 10, true);

        assert!(directory.affiliation(1, 10).await.unwrap().is_some());
        assert!(directory.affiliation(10, 1).await.unwrap().is_none());
    }
}
