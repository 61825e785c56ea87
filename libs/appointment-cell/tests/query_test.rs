mod common;

use chrono::NaiveDate;

use appointment_cell::models::{
    AppointmentFilters, AppointmentScope, AppointmentStatus, CancelAppointmentRequest,
};

use common::*;

async fn seeded() -> Scheduling {
    let scheduling = Scheduling::new();
    let admin = admin();

    for (doctor_id, clinic_id, patient_id, hour) in [
        (DOCTOR, CLINIC, PATIENT, 9),
        (DOCTOR, CLINIC, OTHER_PATIENT, 10),
        (DOCTOR, OTHER_CLINIC, PATIENT, 11),
        (OTHER_DOCTOR, CLINIC, OTHER_PATIENT, 12),
        (OTHER_DOCTOR, CLINIC, PATIENT, 13),
    ] {
        scheduling
            .booking
            .book_appointment(&admin, request(doctor_id, clinic_id, patient_id, at(hour, 0)))
            .await
            .unwrap();
    }

    scheduling
}

fn starts(items: &[appointment_cell::models::Appointment]) -> Vec<u32> {
    use chrono::Timelike;
    items.iter().map(|a| a.start_time.hour()).collect()
}

#[tokio::test]
async fn every_scope_sees_only_its_own_rows_newest_first() {
    let scheduling = seeded().await;

    let cases = [
        (AppointmentScope::Admin, vec![13, 12, 11, 10, 9]),
        (AppointmentScope::Clinic(CLINIC), vec![13, 12, 10, 9]),
        (AppointmentScope::Doctor(DOCTOR), vec![11, 10, 9]),
        (AppointmentScope::Patient(PATIENT), vec![13, 11, 9]),
    ];

    for (scope, expected) in cases {
        let page = scheduling
            .queries
            .list_appointments(scope, AppointmentFilters::default())
            .await
            .unwrap();

        assert_eq!(starts(&page.items), expected, "{:?}", scope);
        assert_eq!(page.total, expected.len() as u64);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.total_pages, 1);
    }
}

#[tokio::test]
async fn scope_overrides_the_matching_filter() {
    let scheduling = seeded().await;

    let page = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Doctor(DOCTOR),
            AppointmentFilters { doctor_id: Some(OTHER_DOCTOR), ..Default::default() },
        )
        .await
        .unwrap();

    assert!(page.items.iter().all(|a| a.doctor_id == DOCTOR));
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn counterpart_and_status_filters_narrow_the_result() {
    let scheduling = seeded().await;
    let page = scheduling
        .queries
        .list_appointments(AppointmentScope::Patient(PATIENT), AppointmentFilters::default())
        .await
        .unwrap();
    let latest = page.items[0].id;
    scheduling
        .booking
        .cancel_appointment(&admin(), latest, CancelAppointmentRequest::default())
        .await
        .unwrap();

    let by_doctor = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Patient(PATIENT),
            AppointmentFilters { doctor_id: Some(DOCTOR), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(starts(&by_doctor.items), vec![11, 9]);

    let cancelled = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Clinic(CLINIC),
            AppointmentFilters { status: Some(AppointmentStatus::Cancelled), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].id, latest);
}

#[tokio::test]
async fn date_range_is_inclusive_of_both_days() {
    let scheduling = seeded().await;
    let day = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();

    let same_day = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { from: Some(day), to: Some(day), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(same_day.total, 5);

    let next_day = day.succ_opt().unwrap();
    let empty = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { from: Some(next_day), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn paging_is_clamped_and_reports_totals() {
    let scheduling = seeded().await;

    let second_page = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { page: Some(2), page_size: Some(2), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(starts(&second_page.items), vec![11, 10]);
    assert_eq!(second_page.total, 5);
    assert_eq!(second_page.total_pages, 3);

    let clamped = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { page: Some(0), page_size: Some(1000), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.page_size, 100);
    assert_eq!(clamped.items.len(), 5);
}

#[tokio::test]
async fn repeated_listing_is_idempotent() {
    let scheduling = seeded().await;
    let filters = AppointmentFilters { page_size: Some(3), ..Default::default() };

    let first = scheduling
        .queries
        .list_appointments(AppointmentScope::Admin, filters.clone())
        .await
        .unwrap();
    let second = scheduling
        .queries
        .list_appointments(AppointmentScope::Admin, filters)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn name_search_is_admin_only() {
    let scheduling = seeded().await;
    let search = || AppointmentFilters { search: Some("karim".to_string()), ..Default::default() };

    let admin_view = scheduling
        .queries
        .list_appointments(AppointmentScope::Admin, search())
        .await
        .unwrap();
    assert_eq!(starts(&admin_view.items), vec![13, 12]);

    // Matches patient names as well as doctor names.
    let by_patient = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { search: Some("laila".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(starts(&by_patient.items), vec![12, 10]);

    let nobody = scheduling
        .queries
        .list_appointments(
            AppointmentScope::Admin,
            AppointmentFilters { search: Some("zzz".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(nobody.total, 0);

    // Outside the admin scope the search term is ignored.
    let doctor_view = scheduling
        .queries
        .list_appointments(AppointmentScope::Doctor(DOCTOR), search())
        .await
        .unwrap();
    assert_eq!(doctor_view.total, 3);
}
