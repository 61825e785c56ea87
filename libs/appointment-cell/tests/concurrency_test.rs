mod common;

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;

use appointment_cell::models::{AppointmentError, AppointmentQuery, RescheduleAppointmentRequest};

use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_overlapping_bookings_yield_exactly_one_success() {
    let scheduling = Arc::new(Scheduling::new());

    let attempts = (0..16).map(|i| {
        let scheduling = scheduling.clone();
        tokio::spawn(async move {
            // Every attempt overlaps every other one.
            let start = at(10, 0) + Duration::minutes(i % 5);
            scheduling
                .booking
                .book_appointment(&admin(), request(DOCTOR, CLINIC, PATIENT, start))
                .await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppointmentError::SchedulingConflict)))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, results.len() - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_identical_requests_never_both_succeed() {
    for _ in 0..25 {
        let scheduling = Arc::new(Scheduling::new());

        let first = {
            let scheduling = scheduling.clone();
            tokio::spawn(async move {
                scheduling
                    .booking
                    .book_appointment(&admin(), request(DOCTOR, CLINIC, PATIENT, at(10, 0)))
                    .await
            })
        };
        let second = {
            let scheduling = scheduling.clone();
            tokio::spawn(async move {
                scheduling
                    .booking
                    .book_appointment(&patient(OTHER_PATIENT), request(DOCTOR, CLINIC, OTHER_PATIENT, at(10, 0)))
                    .await
            })
        };

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert!(first.is_ok() ^ second.is_ok(), "exactly one booking must win");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reschedules_into_one_slot_leave_no_overlap() {
    let scheduling = Arc::new(Scheduling::new());
    let mut ids = Vec::new();
    for hour in [11, 12, 13, 14] {
        ids.push(scheduling.book(DOCTOR, CLINIC, at(hour, 0)).await.id);
    }

    let moves = ids.into_iter().map(|id| {
        let scheduling = scheduling.clone();
        tokio::spawn(async move {
            scheduling
                .booking
                .reschedule_appointment(
                    &admin(),
                    id,
                    RescheduleAppointmentRequest { new_start_time: at(17, 0), min_minutes_before_start: None },
                )
                .await
        })
    });

    let results: Vec<_> = join_all(moves).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let (at_five, _) = scheduling
        .store
        .query(&AppointmentQuery {
            start_from: Some(at(17, 0)),
            start_before: Some(at(17, 30)),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(at_five.len(), 1);
}
