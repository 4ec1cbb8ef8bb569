use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{
    Appointment, AppointmentFilter, NewAppointment, SchedulingError,
};
use crate::slots::TimeSlot;

/// The record-store capability the scheduling core depends on. Constructed
/// once at startup and handed to the services; tests plug in the in-memory
/// implementation.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError>;

    /// Patient profile row linked to a user account, if any.
    async fn patient_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError>;

    /// Doctor profile row linked to a user account, if any.
    async fn doctor_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError>;

    /// Persist a new appointment. The store assigns id and timestamps.
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, SchedulingError>;

    /// Overwrite an existing appointment row by id.
    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError>;

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// The no-double-booking probe: a non-cancelled appointment occupying the
    /// slot key, optionally excluding one appointment (self-exclusion on
    /// reschedule).
    async fn find_active_in_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

pub struct PostgrestSchedulingStore {
    client: PostgrestClient,
}

impl PostgrestSchedulingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    fn decode_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| SchedulingError::Store(format!("Failed to parse appointment: {}", e)))
            })
            .collect()
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }
}

#[async_trait]
impl SchedulingStore for PostgrestSchedulingStore {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn patient_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError> {
        profile_id(&self.client, "patients", user_id).await
    }

    async fn doctor_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError> {
        profile_id(&self.client, "doctors", user_id).await
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let body = serde_json::to_value(&new)
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                None,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let mut appointments = Self::decode_rows(rows)?;
        appointments
            .pop()
            .ok_or_else(|| SchedulingError::Store("Insert returned no representation".to_string()))
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = serde_json::to_value(appointment)
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        let mut appointments = Self::decode_rows(rows)?;
        appointments.pop().ok_or(SchedulingError::AppointmentNotFound)
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        Ok(Self::decode_rows(rows)?.pop())
    }

    async fn find_active_in_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("appointment_date=eq.{}", date),
            format!("time_slot=eq.{}", urlencoding::encode(&slot.label())),
            "status=neq.cancelled".to_string(),
        ];
        if let Some(exclude_id) = exclude {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }
        query_parts.push("limit=1".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        Ok(Self::decode_rows(rows)?.pop())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=appointment_date.asc,time_slot.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        debug!("Listing appointments: {}", path);

        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::Store(e.to_string()))?;

        Self::decode_rows(rows)
    }
}

async fn profile_id(
    client: &PostgrestClient,
    table: &str,
    user_id: Uuid,
) -> Result<Option<Uuid>, SchedulingError> {
    let path = format!("/rest/v1/{}?user_id=eq.{}&select=id", table, user_id);
    let rows: Vec<Value> = client
        .request(Method::GET, &path, None, None)
        .await
        .map_err(|e| SchedulingError::Store(e.to_string()))?;

    match rows.first().and_then(|row| row["id"].as_str()) {
        Some(id) => Uuid::parse_str(id)
            .map(Some)
            .map_err(|e| SchedulingError::Store(format!("Malformed profile id: {}", e))),
        None => Ok(None),
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Map-backed store used by the test suites, including the booking race
/// tests, where a stateful backend is required. Every operation yields once
/// before touching the maps so callers interleave at store accesses the way
/// they would against the real backend.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    doctors: RwLock<Vec<Uuid>>,
    patient_profiles: RwLock<HashMap<Uuid, Uuid>>,
    doctor_profiles: RwLock<HashMap<Uuid, Uuid>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a doctor profile and return its id.
    pub async fn add_doctor(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.doctors.write().await.push(id);
        id
    }

    /// Register a doctor profile linked to a user account.
    pub async fn add_doctor_for_user(&self, user_id: Uuid) -> Uuid {
        let id = self.add_doctor().await;
        self.doctor_profiles.write().await.insert(user_id, id);
        id
    }

    /// Register a patient profile linked to a user account and return its id.
    pub async fn add_patient_for_user(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.patient_profiles.write().await.insert(user_id, id);
        id
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        tokio::task::yield_now().await;
        Ok(self.doctors.read().await.contains(&doctor_id))
    }

    async fn patient_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError> {
        tokio::task::yield_now().await;
        Ok(self.patient_profiles.read().await.get(&user_id).copied())
    }

    async fn doctor_profile_id(&self, user_id: Uuid) -> Result<Option<Uuid>, SchedulingError> {
        tokio::task::yield_now().await;
        Ok(self.doctor_profiles.read().await.get(&user_id).copied())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        tokio::task::yield_now().await;
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            appointment_date: new.appointment_date,
            time_slot: new.time_slot,
            status: new.status,
            duration_minutes: new.duration_minutes,
            appointment_type: new.appointment_type,
            method: new.method,
            reason: new.reason,
            notes: new.notes,
            symptoms: new.symptoms,
            cancellation_reason: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        tokio::task::yield_now().await;
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.id) {
            return Err(SchedulingError::AppointmentNotFound);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        tokio::task::yield_now().await;
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_active_in_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        tokio::task::yield_now().await;
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .find(|appt| {
                appt.doctor_id == doctor_id
                    && appt.appointment_date == date
                    && appt.time_slot == slot
                    && appt.occupies_slot()
                    && Some(appt.id) != exclude
            })
            .cloned())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        tokio::task::yield_now().await;
        let mut matches: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appt| {
                filter.patient_id.map_or(true, |id| appt.patient_id == id)
                    && filter.doctor_id.map_or(true, |id| appt.doctor_id == id)
                    && filter.date.map_or(true, |date| appt.appointment_date == date)
                    && filter.status.map_or(true, |status| appt.status == status)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|appt| (appt.appointment_date, appt.time_slot));
        Ok(matches)
    }
}
