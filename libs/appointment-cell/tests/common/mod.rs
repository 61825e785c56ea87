#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use appointment_cell::models::{Appointment, BookAppointmentRequest};
use appointment_cell::services::{
    AppointmentBookingService, AppointmentQueryService, AppointmentStore, InMemoryAppointmentStore,
};
use shared_config::SchedulingPolicy;
use shared_database::{InMemoryDirectory, ReferenceDirectory};
use shared_models::auth::{Actor, Role};
use shared_utils::clock::FixedClock;

pub const DOCTOR: i64 = 1;
pub const OTHER_DOCTOR: i64 = 2;
pub const INACTIVE_DOCTOR: i64 = 3;
pub const CLINIC: i64 = 10;
pub const OTHER_CLINIC: i64 = 20;
pub const PATIENT: i64 = 100;
pub const OTHER_PATIENT: i64 = 101;

/// 2026-11-02 08:00 UTC, the frozen "now" of every scenario.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 2, 8, 0, 0).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 2, hour, minute, 0).unwrap()
}

pub fn minutes_from_now(minutes: i64) -> DateTime<Utc> {
    now() + Duration::minutes(minutes)
}

pub fn directory() -> Arc<dyn ReferenceDirectory> {
    InMemoryDirectory::new()
        .with_doctor(DOCTOR, "Dr. Mona Adel", true)
        .with_doctor(OTHER_DOCTOR, "Dr. Karim Farouk", true)
        .with_doctor(INACTIVE_DOCTOR, "Dr. Retired", false)
        .with_clinic(CLINIC, "Nile Clinic", true)
        .with_clinic(OTHER_CLINIC, "Delta Clinic", true)
        .with_patient(PATIENT, "Omar Hassan", true)
        .with_patient(OTHER_PATIENT, "Laila Nabil", true)
        .with_affiliation(DOCTOR, CLINIC, true)
        .with_affiliation(DOCTOR, OTHER_CLINIC, true)
        .with_affiliation(OTHER_DOCTOR, CLINIC, true)
        .with_affiliation(INACTIVE_DOCTOR, CLINIC, true)
        .into_shared()
}

pub struct Scheduling {
    pub store: Arc<dyn AppointmentStore>,
    pub booking: Arc<AppointmentBookingService>,
    pub queries: Arc<AppointmentQueryService>,
}

impl Scheduling {
    pub fn new() -> Self {
        let store: Arc<dyn AppointmentStore> = Arc::new(InMemoryAppointmentStore::new());
        let directory = directory();
        let policy = SchedulingPolicy::default();

        Self {
            booking: Arc::new(AppointmentBookingService::new(
                store.clone(),
                directory.clone(),
                Arc::new(FixedClock(now())),
                policy.clone(),
            )),
            queries: Arc::new(AppointmentQueryService::new(store.clone(), directory, &policy)),
            store,
        }
    }

    pub async fn book(&self, doctor_id: i64, clinic_id: i64, start: DateTime<Utc>) -> Appointment {
        self.booking
            .book_appointment(&admin(), request(doctor_id, clinic_id, PATIENT, start))
            .await
            .expect("booking should succeed")
    }
}

pub fn request(doctor_id: i64, clinic_id: i64, patient_id: i64, start: DateTime<Utc>) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        clinic_id,
        patient_id,
        start_time: start,
        notes: None,
    }
}

pub fn admin() -> Actor {
    Actor { id: 900, role: Role::Admin, clinic_id: None, email: None }
}

pub fn clinic_staff(clinic_id: i64) -> Actor {
    Actor { id: 800, role: Role::ClinicStaff, clinic_id: Some(clinic_id), email: None }
}

pub fn doctor(id: i64) -> Actor {
    Actor { id, role: Role::Doctor, clinic_id: None, email: None }
}

pub fn patient(id: i64) -> Actor {
    Actor { id, role: Role::Patient, clinic_id: None, email: None }
}
