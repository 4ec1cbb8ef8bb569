use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{Doctor, DoctorError, DoctorSearchQuery, PatientSummary, UpdateDoctorRequest};

/// Store row for a doctor. The `languages` column is comma-separated text;
/// decoding to the in-memory vector happens here and nowhere else.
#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    specialty: String,
    license_number: Option<String>,
    bio: Option<String>,
    languages: Option<String>,
    consultation_fee: Option<f64>,
    is_available: Option<bool>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DoctorRow> for Doctor {
    fn from(row: DoctorRow) -> Self {
        Doctor {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            specialty: row.specialty,
            license_number: row.license_number,
            bio: row.bio,
            languages: row.languages.as_deref().map(decode_list).unwrap_or_default(),
            consultation_fee: row.consultation_fee,
            is_available: row.is_available.unwrap_or(true),
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

pub struct DoctorService {
    client: PostgrestClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        decode_row(row)
    }

    pub async fn search_doctors(
        &self,
        query: DoctorSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let mut query_parts = Vec::new();

        if let Some(specialty) = &query.specialty {
            query_parts.push(format!(
                "specialty=ilike.{}",
                urlencoding::encode(&format!("*{}*", specialty))
            ));
        }
        if query.available_only.unwrap_or(false) {
            query_parts.push("is_available=eq.true".to_string());
        }
        query_parts.push("order=last_name.asc".to_string());
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(decode_row).collect()
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();
        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(languages) = request.languages {
            // Encoded back to the store's comma-separated form on the way out.
            update_data.insert("languages".to_string(), json!(encode_list(&languages)));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
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
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        decode_row(row)
    }

    /// Every patient with at least one appointment with this doctor.
    pub async fn doctor_patients(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PatientSummary>, DoctorError> {
        let path = format!("/rest/v1/appointments?doctor_id=eq.{}&select=patient_id", doctor_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let patient_ids: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row["patient_id"].as_str())
            .map(str::to_string)
            .collect();

        if patient_ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = patient_ids.into_iter().collect::<Vec<_>>().join(",");
        let path = format!(
            "/rest/v1/patients?id=in.({})&select=id,first_name,last_name,email&order=last_name.asc",
            id_list
        );
        let patients: Vec<PatientSummary> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(patients)
    }
}

fn decode_row(row: Value) -> Result<Doctor, DoctorError> {
    let row: DoctorRow = serde_json::from_value(row)
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
    Ok(row.into())
}
