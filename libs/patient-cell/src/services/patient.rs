use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{Patient, PatientError, UpdatePatientRequest};

/// Store row for a patient; the list columns are comma-separated text and
/// are decoded only here, at the store boundary.
#[derive(Debug, Deserialize)]
struct PatientRow {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: Option<String>,
    date_of_birth: Option<NaiveDate>,
    allergies: Option<String>,
    current_medications: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone_number: row.phone_number,
            date_of_birth: row.date_of_birth,
            allergies: row.allergies.as_deref().map(decode_list).unwrap_or_default(),
            current_medications: row
                .current_medications
                .as_deref()
                .map(decode_list)
                .unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn decode_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn encode_list(values: &[String]) -> String {
    values.join(",")
}

pub struct PatientService {
    client: PostgrestClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_one(&path, auth_token).await
    }

    /// The profile linked to a user account ("my profile").
    pub async fn get_patient_by_user(&self, user_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();
        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert(
                "date_of_birth".to_string(),
                json!(date_of_birth.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(encode_list(&allergies)));
        }
        if let Some(medications) = request.current_medications {
            update_data.insert("current_medications".to_string(), json!(encode_list(&medications)));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        decode_row(row)
    }

    /// Whether a patient has at least one appointment with a doctor; the
    /// relationship fact the access predicate needs for doctor reads.
    pub async fn treated_by(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, PatientError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&doctor_id=eq.{}&select=id&limit=1",
            patient_id, doctor_id
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Patient, PatientError> {
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        decode_row(row)
    }
}

fn decode_row(row: Value) -> Result<Patient, PatientError> {
    let row: PatientRow = serde_json::from_value(row)
        .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;
    Ok(row.into())
}
