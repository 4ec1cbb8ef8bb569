use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentFilter, AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest,
    CancelledBy, RescheduleAppointmentRequest, SchedulingError,
};
use appointment_cell::services::{AppointmentBookingService, SlotAvailabilityService};
use appointment_cell::store::{InMemorySchedulingStore, SchedulingStore};
use appointment_cell::TimeSlot;
use shared_models::auth::{CallerIdentity, Role};

fn patient(profile_id: Uuid) -> CallerIdentity {
    CallerIdentity {
        user_id: Uuid::new_v4(),
        role: Role::Patient,
        profile_id: Some(profile_id),
    }
}

fn slot(label: &str) -> TimeSlot {
    label.parse().unwrap()
}

fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn book_request(doctor_id: Uuid, date: NaiveDate, time_slot: TimeSlot) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        appointment_date: date,
        time_slot,
        reason: Some("Recurring headaches".to_string()),
        symptoms: None,
        duration_minutes: Some(30),
        appointment_type: None,
        method: None,
    }
}

async fn service_with_doctor() -> (Arc<AppointmentBookingService>, Arc<InMemorySchedulingStore>, Uuid) {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doctor_id = store.add_doctor().await;
    let service = Arc::new(AppointmentBookingService::new(store.clone()));
    (service, store, doctor_id)
}

#[tokio::test]
async fn booking_creates_pending_appointment() {
    let (service, _store, doctor_id) = service_with_doctor().await;
    let caller = patient(Uuid::new_v4());

    let appointment = service
        .book_appointment(&caller, book_request(doctor_id, june_first(), slot("09:00")))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.patient_id, caller.profile_id.unwrap());
    assert_eq!(appointment.doctor_id, doctor_id);
    assert_eq!(appointment.time_slot, slot("09:00"));
    assert_eq!(appointment.reason.as_deref(), Some("Recurring headaches"));
}

#[tokio::test]
async fn double_booking_the_same_slot_is_rejected() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("09:00")))
        .await
        .unwrap();

    let second = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("09:00")))
        .await;

    assert_matches!(second, Err(SchedulingError::SlotTaken { .. }));
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_admit_exactly_one() {
    let (service, store, doctor_id) = service_with_doctor().await;

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let caller = patient(Uuid::new_v4());
            tokio::spawn(async move {
                service
                    .book_appointment(&caller, book_request(doctor_id, june_first(), slot("10:30")))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(SchedulingError::SlotTaken { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one concurrent booking may win the slot");
    assert_eq!(conflicts, 3, "every loser gets a definitive conflict");

    let stored = store
        .list_appointments(&AppointmentFilter {
            doctor_id: Some(doctor_id),
            date: Some(june_first()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn cancelling_frees_the_slot_for_rebooking() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let first = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("11:00")))
        .await
        .unwrap();

    service
        .cancel_appointment(
            first.id,
            CancelAppointmentRequest {
                reason: Some("Feeling better".to_string()),
                cancelled_by: Some(CancelledBy::Patient),
            },
        )
        .await
        .unwrap();

    let rebooked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("11:00")))
        .await
        .unwrap();

    assert_eq!(rebooked.status, AppointmentStatus::Pending);
    assert_ne!(rebooked.id, first.id);
}

#[tokio::test]
async fn cancellation_stamps_metadata() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("12:00")))
        .await
        .unwrap();

    let cancelled = service
        .cancel_appointment(
            booked.id,
            CancelAppointmentRequest {
                reason: Some("Double booked elsewhere".to_string()),
                cancelled_by: Some(CancelledBy::Doctor),
            },
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Double booked elsewhere"));
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Doctor));
}

#[tokio::test]
async fn rescheduling_onto_its_own_slot_never_conflicts() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("13:00")))
        .await
        .unwrap();

    // No-op move: the appointment itself occupies the slot, and the conflict
    // search must exclude it.
    let rescheduled = service
        .reschedule_appointment(
            booked.id,
            RescheduleAppointmentRequest {
                appointment_date: Some(june_first()),
                time_slot: Some(slot("13:00")),
                reason: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(rescheduled.time_slot, slot("13:00"));
    assert_eq!(rescheduled.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn rescheduling_into_an_occupied_slot_is_rejected() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("14:00")))
        .await
        .unwrap();
    let movable = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("14:30")))
        .await
        .unwrap();

    let result = service
        .reschedule_appointment(
            movable.id,
            RescheduleAppointmentRequest {
                appointment_date: None,
                time_slot: Some(slot("14:00")),
                reason: None,
            },
        )
        .await;

    assert_matches!(result, Err(SchedulingError::SlotTaken { .. }));

    // The failed move leaves the appointment where it was.
    let unchanged = service.get_appointment(movable.id).await.unwrap();
    assert_eq!(unchanged.time_slot, slot("14:30"));
}

#[tokio::test]
async fn rescheduling_moves_date_and_reason_but_not_status() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("15:00")))
        .await
        .unwrap();
    service.set_status(booked.id, "confirmed").await.unwrap();

    let new_date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let rescheduled = service
        .reschedule_appointment(
            booked.id,
            RescheduleAppointmentRequest {
                appointment_date: Some(new_date),
                time_slot: Some(slot("09:30")),
                reason: Some("Travel conflict".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(rescheduled.appointment_date, new_date);
    assert_eq!(rescheduled.time_slot, slot("09:30"));
    assert_eq!(rescheduled.reason.as_deref(), Some("Travel conflict"));
    assert_eq!(rescheduled.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn status_updates_are_unrestricted_and_repeatable() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("16:00")))
        .await
        .unwrap();

    // The lifecycle deliberately enforces no transition table; a completed
    // appointment may go back to pending, and setting the same value twice
    // succeeds both times. Tightening this is a product decision this test
    // would surface.
    let completed = service.set_status(booked.id, "completed").await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let reverted = service.set_status(booked.id, "pending").await.unwrap();
    assert_eq!(reverted.status, AppointmentStatus::Pending);

    let again = service.set_status(booked.id, "pending").await.unwrap();
    assert_eq!(again.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn bogus_status_is_rejected_and_appointment_unchanged() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("16:30")))
        .await
        .unwrap();

    let result = service.set_status(booked.id, "BOGUS").await;
    assert_matches!(result, Err(SchedulingError::InvalidStatus(_)));

    let unchanged = service.get_appointment(booked.id).await.unwrap();
    assert_eq!(unchanged.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn status_values_parse_case_insensitively() {
    let (service, _store, doctor_id) = service_with_doctor().await;

    let booked = service
        .book_appointment(&patient(Uuid::new_v4()), book_request(doctor_id, june_first(), slot("17:00")))
        .await
        .unwrap();

    let confirmed = service.set_status(booked.id, "CONFIRMED").await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn callers_without_a_patient_profile_cannot_book() {
    let (service, store, doctor_id) = service_with_doctor().await;

    let doctor_caller = CallerIdentity {
        user_id: Uuid::new_v4(),
        role: Role::Doctor,
        profile_id: Some(store.add_doctor().await),
    };
    let admin_caller = CallerIdentity {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
        profile_id: None,
    };

    for caller in [doctor_caller, admin_caller] {
        let result = service
            .book_appointment(&caller, book_request(doctor_id, june_first(), slot("09:00")))
            .await;
        assert_matches!(result, Err(SchedulingError::PatientProfileNotFound));
    }
}

#[tokio::test]
async fn booking_with_unknown_doctor_fails() {
    let (service, _store, _doctor_id) = service_with_doctor().await;

    let result = service
        .book_appointment(
            &patient(Uuid::new_v4()),
            book_request(Uuid::new_v4(), june_first(), slot("09:00")),
        )
        .await;

    assert_matches!(result, Err(SchedulingError::DoctorNotFound));
}

#[tokio::test]
async fn operations_on_missing_appointments_fail_not_found() {
    let (service, _store, _doctor_id) = service_with_doctor().await;
    let ghost = Uuid::new_v4();

    assert_matches!(
        service.get_appointment(ghost).await,
        Err(SchedulingError::AppointmentNotFound)
    );
    assert_matches!(
        service
            .reschedule_appointment(
                ghost,
                RescheduleAppointmentRequest {
                    appointment_date: None,
                    time_slot: Some(slot("09:00")),
                    reason: None
                }
            )
            .await,
        Err(SchedulingError::AppointmentNotFound)
    );
    assert_matches!(
        service.set_status(ghost, "confirmed").await,
        Err(SchedulingError::AppointmentNotFound)
    );
}

#[tokio::test]
async fn listing_is_scoped_to_the_caller() {
    let (service, store, doctor_id) = service_with_doctor().await;
    let other_doctor = store.add_doctor().await;

    let alice = patient(Uuid::new_v4());
    let bob = patient(Uuid::new_v4());

    service
        .book_appointment(&alice, book_request(doctor_id, june_first(), slot("09:00")))
        .await
        .unwrap();
    service
        .book_appointment(&bob, book_request(doctor_id, june_first(), slot("09:30")))
        .await
        .unwrap();
    service
        .book_appointment(&bob, book_request(other_doctor, june_first(), slot("09:00")))
        .await
        .unwrap();

    let alice_view = service
        .list_for_caller(&alice, AppointmentFilter::default())
        .await
        .unwrap();
    assert_eq!(alice_view.len(), 1);
    assert!(alice_view.iter().all(|a| a.patient_id == alice.profile_id.unwrap()));

    let doctor_user = Uuid::new_v4();
    let doctor_profile = store.add_doctor_for_user(doctor_user).await;
    let doctor_caller = CallerIdentity {
        user_id: doctor_user,
        role: Role::Doctor,
        profile_id: Some(doctor_profile),
    };
    let empty_view = service
        .list_for_caller(&doctor_caller, AppointmentFilter::default())
        .await
        .unwrap();
    assert!(empty_view.is_empty());

    let admin = CallerIdentity {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
        profile_id: None,
    };
    let admin_view = service
        .list_for_caller(&admin, AppointmentFilter::default())
        .await
        .unwrap();
    assert_eq!(admin_view.len(), 3);
}

/// The end-to-end walkthrough: book, conflict, cancel, rebook.
#[tokio::test]
async fn booking_conflict_cancel_rebook_scenario() {
    let (service, store, doctor_id) = service_with_doctor().await;
    let availability = SlotAvailabilityService::new(store.clone());

    let first_patient = patient(Uuid::new_v4());
    let second_patient = patient(Uuid::new_v4());
    let nine = slot("09:00");

    let first = service
        .book_appointment(&first_patient, book_request(doctor_id, june_first(), nine))
        .await
        .unwrap();
    assert_eq!(first.status, AppointmentStatus::Pending);

    let conflict = service
        .book_appointment(&second_patient, book_request(doctor_id, june_first(), nine))
        .await;
    assert_matches!(conflict, Err(SchedulingError::SlotTaken { .. }));

    service
        .cancel_appointment(
            first.id,
            CancelAppointmentRequest { reason: None, cancelled_by: Some(CancelledBy::Patient) },
        )
        .await
        .unwrap();

    let open = availability.available_slots(doctor_id, june_first()).await.unwrap();
    assert!(open.contains(&nine), "cancellation must free the slot");

    let rebooked = service
        .book_appointment(&second_patient, book_request(doctor_id, june_first(), nine))
        .await
        .unwrap();
    assert_eq!(rebooked.patient_id, second_patient.profile_id.unwrap());
}
