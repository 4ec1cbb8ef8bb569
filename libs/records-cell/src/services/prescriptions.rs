use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{
    CreatePrescriptionRequest, Prescription, RecordsError, RecordsFilter,
    UpdatePrescriptionRequest,
};

pub struct PrescriptionService {
    client: PostgrestClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub async fn create_prescription(
        &self,
        doctor_id: Uuid,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        debug!("Doctor {} issuing prescription for patient {}", doctor_id, request.patient_id);

        let body = json!({
            "patient_id": request.patient_id,
            "doctor_id": doctor_id,
            "appointment_id": request.appointment_id,
            "medication": request.medication,
            "dosage": request.dosage,
            "instructions": request.instructions,
        });

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/prescriptions",
                Some(auth_token),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        decode_one(rows, RecordsError::PrescriptionNotFound)
    }

    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        decode_one(rows, RecordsError::PrescriptionNotFound)
    }

    pub async fn list_prescriptions(
        &self,
        filter: &RecordsFilter,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, RecordsError> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        query_parts.push("order=created_at.desc".to_string());

        let path = format!("/rest/v1/prescriptions?{}", query_parts.join("&"));
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(decode).collect()
    }

    pub async fn update_prescription(
        &self,
        prescription_id: Uuid,
        request: UpdatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        let mut update_data = serde_json::Map::new();
        if let Some(medication) = request.medication {
            update_data.insert("medication".to_string(), json!(medication));
        }
        if let Some(dosage) = request.dosage {
            update_data.insert("dosage".to_string(), json!(dosage));
        }
        if let Some(instructions) = request.instructions {
            update_data.insert("instructions".to_string(), json!(instructions));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        decode_one(rows, RecordsError::PrescriptionNotFound)
    }

    pub async fn delete_prescription(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<(), RecordsError> {
        let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let _: Vec<Value> = self
            .client
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(auth_token),
                None,
                Some(representation_headers()),
            )
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}

fn decode(row: Value) -> Result<Prescription, RecordsError> {
    serde_json::from_value(row)
        .map_err(|e| RecordsError::DatabaseError(format!("Failed to parse prescription: {}", e)))
}

fn decode_one(rows: Vec<Value>, missing: RecordsError) -> Result<Prescription, RecordsError> {
    let row = rows.into_iter().next().ok_or(missing)?;
    decode(row)
}
