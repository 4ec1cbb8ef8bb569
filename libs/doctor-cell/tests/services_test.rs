use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{DoctorError, DoctorSearchQuery, UpdateDoctorRequest};
use doctor_cell::services::DoctorService;
use shared_utils::test_utils::{MockStoreResponses, TestConfig};

fn service(mock_server: &MockServer) -> DoctorService {
    DoctorService::new(&TestConfig::with_store_url(&mock_server.uri()).to_app_config())
}

#[tokio::test]
async fn languages_are_decoded_from_comma_separated_text() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                "General Practice",
            )
        ])))
        .mount(&mock_server)
        .await;

    let doctor = service(&mock_server)
        .get_doctor(doctor_id, "token")
        .await
        .unwrap();

    assert_eq!(doctor.languages, vec!["English".to_string(), "Spanish".to_string()]);
    assert_eq!(doctor.specialty, "General Practice");
    assert!(doctor.is_available);
}

#[tokio::test]
async fn missing_doctor_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server).get_doctor(Uuid::new_v4(), "token").await;
    assert_matches!(result, Err(DoctorError::NotFound));
}

#[tokio::test]
async fn updates_encode_languages_back_to_text() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(body_partial_json(json!({ "languages": "English,French" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": doctor_id,
                "user_id": Uuid::new_v4(),
                "first_name": "Test",
                "last_name": "Doctor",
                "email": "doctor@example.com",
                "specialty": "General Practice",
                "license_number": "MD123456",
                "bio": null,
                "languages": "English,French",
                "consultation_fee": 80.0,
                "is_available": true,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    let updated = service(&mock_server)
        .update_doctor(
            doctor_id,
            UpdateDoctorRequest {
                first_name: None,
                last_name: None,
                specialty: None,
                bio: None,
                languages: Some(vec!["English".to_string(), "French".to_string()]),
                consultation_fee: None,
                is_available: None,
            },
            "token",
        )
        .await
        .unwrap();

    assert_eq!(updated.languages, vec!["English".to_string(), "French".to_string()]);
}

#[tokio::test]
async fn specialty_search_builds_an_ilike_filter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("specialty", "ilike.*cardio*"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "Cardiology",
            )
        ])))
        .mount(&mock_server)
        .await;

    let doctors = service(&mock_server)
        .search_doctors(
            DoctorSearchQuery {
                specialty: Some("cardio".to_string()),
                available_only: Some(true),
                limit: None,
                offset: None,
            },
            "token",
        )
        .await
        .unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].specialty, "Cardiology");
}

#[tokio::test]
async fn patient_list_deduplicates_repeat_visitors() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    // Two appointments, one patient.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("select", "patient_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "patient_id": patient_id },
            { "patient_id": patient_id }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("in.({})", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": patient_id,
                "first_name": "Test",
                "last_name": "Patient",
                "email": "patient@example.com"
            }
        ])))
        .mount(&mock_server)
        .await;

    let patients = service(&mock_server)
        .doctor_patients(doctor_id, "token")
        .await
        .unwrap();

    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].id, patient_id);
}

#[tokio::test]
async fn doctor_with_no_appointments_has_no_patients() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let patients = service(&mock_server)
        .doctor_patients(Uuid::new_v4(), "token")
        .await
        .unwrap();

    assert!(patients.is_empty());
}
