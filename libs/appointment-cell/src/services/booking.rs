// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{CallerIdentity, Role, User};

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, NewAppointment, RescheduleAppointmentRequest, SchedulingError,
};
use crate::services::locks::SlotLockRegistry;
use crate::store::SchedulingStore;

/// Owns the appointment lifecycle: booking, rescheduling, status changes and
/// cancellation, with the no-double-booking invariant enforced under the
/// slot-lock registry.
pub struct AppointmentBookingService {
    store: Arc<dyn SchedulingStore>,
    slot_locks: SlotLockRegistry,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            store,
            slot_locks: SlotLockRegistry::new(),
        }
    }

    /// Resolve the authenticated user to their role and linked profile.
    pub async fn resolve_identity(&self, user: &User) -> Result<CallerIdentity, SchedulingError> {
        let user_id = Uuid::parse_str(&user.id)
            .map_err(|_| SchedulingError::Identity("token subject is not a user id".to_string()))?;
        let role: Role = user
            .role
            .as_deref()
            .unwrap_or("patient")
            .parse()
            .map_err(SchedulingError::Identity)?;

        let profile_id = match role {
            Role::Patient => self.store.patient_profile_id(user_id).await?,
            Role::Doctor => self.store.doctor_profile_id(user_id).await?,
            Role::Admin => None,
        };

        Ok(CallerIdentity { user_id, role, profile_id })
    }

    /// Book a slot for the caller's own patient profile. Fails if the caller
    /// has no patient profile, the doctor does not exist, or the slot is
    /// already held by a non-cancelled appointment.
    pub async fn book_appointment(
        &self,
        identity: &CallerIdentity,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let patient_id = identity
            .patient_id()
            .ok_or(SchedulingError::PatientProfileNotFound)?;

        info!(
            "Booking {} {} for patient {} with doctor {}",
            request.appointment_date, request.time_slot, patient_id, request.doctor_id
        );

        if !self.store.doctor_exists(request.doctor_id).await? {
            return Err(SchedulingError::DoctorNotFound);
        }

        // Hold the slot key across the conflict check and the insert so
        // concurrent bookings of the same slot serialize here.
        let _guard = self
            .slot_locks
            .acquire(request.doctor_id, request.appointment_date, request.time_slot)
            .await;

        if self
            .store
            .find_active_in_slot(request.doctor_id, request.appointment_date, request.time_slot, None)
            .await?
            .is_some()
        {
            warn!(
                "Slot {} on {} already booked for doctor {}",
                request.time_slot, request.appointment_date, request.doctor_id
            );
            return Err(SchedulingError::SlotTaken {
                date: request.appointment_date,
                slot: request.time_slot,
            });
        }

        let appointment = self
            .store
            .insert_appointment(NewAppointment {
                patient_id,
                doctor_id: request.doctor_id,
                appointment_date: request.appointment_date,
                time_slot: request.time_slot,
                status: AppointmentStatus::Pending,
                duration_minutes: request.duration_minutes,
                appointment_type: request.appointment_type,
                method: request.method,
                reason: request.reason,
                notes: None,
                symptoms: request.symptoms,
            })
            .await?;

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Move an appointment to a new date/slot (and/or update its reason).
    /// The conflict check is re-run against the same doctor only when the
    /// slot key actually changes, excluding the appointment itself.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(appointment_id).await?;

        let new_date = request.appointment_date.unwrap_or(appointment.appointment_date);
        let new_slot = request.time_slot.unwrap_or(appointment.time_slot);
        let moved = (new_date, new_slot) != (appointment.appointment_date, appointment.time_slot);

        let _guard = if moved {
            Some(
                self.slot_locks
                    .acquire(appointment.doctor_id, new_date, new_slot)
                    .await,
            )
        } else {
            None
        };

        if moved
            && self
                .store
                .find_active_in_slot(appointment.doctor_id, new_date, new_slot, Some(appointment_id))
                .await?
                .is_some()
        {
            warn!(
                "Reschedule of {} rejected: slot {} on {} already booked",
                appointment_id, new_slot, new_date
            );
            return Err(SchedulingError::SlotTaken { date: new_date, slot: new_slot });
        }

        appointment.appointment_date = new_date;
        appointment.time_slot = new_slot;
        if let Some(reason) = request.reason {
            appointment.reason = Some(reason);
        }
        appointment.updated_at = Utc::now();

        debug!("Rescheduled appointment {} to {} {}", appointment_id, new_date, new_slot);
        self.store.update_appointment(&appointment).await
    }

    /// Overwrite the status. The value must parse to one of the four
    /// lifecycle states; beyond membership no transition table is enforced,
    /// so any state may replace any other.
    pub async fn set_status(
        &self,
        appointment_id: Uuid,
        status_value: &str,
    ) -> Result<Appointment, SchedulingError> {
        let status: AppointmentStatus = status_value.parse()?;

        let mut appointment = self.get_appointment(appointment_id).await?;
        debug!(
            "Appointment {} status {} -> {}",
            appointment_id, appointment.status, status
        );
        appointment.status = status;
        appointment.updated_at = Utc::now();
        self.store.update_appointment(&appointment).await
    }

    /// Cancel and stamp the cancellation metadata. By the slot invariant a
    /// cancelled appointment no longer occupies its slot.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_appointment(appointment_id).await?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = request.reason;
        appointment.cancelled_by = request.cancelled_by;
        appointment.updated_at = Utc::now();

        let cancelled = self.store.update_appointment(&appointment).await?;
        info!(
            "Appointment {} cancelled; slot {} on {} is free again",
            cancelled.id, cancelled.time_slot, cancelled.appointment_date
        );
        Ok(cancelled)
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .find_appointment(id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    /// List appointments visible to the caller: patients and doctors are
    /// pinned to their own profile id, admins see everything the filter
    /// matches.
    pub async fn list_for_caller(
        &self,
        identity: &CallerIdentity,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let scoped = match identity.role {
            Role::Admin => filter,
            Role::Patient => AppointmentFilter {
                patient_id: Some(
                    identity
                        .patient_id()
                        .ok_or(SchedulingError::PatientProfileNotFound)?,
                ),
                ..filter
            },
            Role::Doctor => AppointmentFilter {
                doctor_id: Some(
                    identity
                        .doctor_id()
                        .ok_or(SchedulingError::DoctorProfileNotFound)?,
                ),
                ..filter
            },
        };
        self.store.list_appointments(&scoped).await
    }
}
