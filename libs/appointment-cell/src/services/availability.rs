use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentFilter, SchedulingError};
use crate::slots::TimeSlot;
use crate::store::SchedulingStore;

pub struct SlotAvailabilityService {
    store: Arc<dyn SchedulingStore>,
}

impl SlotAvailabilityService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Bookable slots for a doctor on a day: the fixed grid minus the slots
    /// held by non-cancelled appointments, in grid order. A day without
    /// appointments yields the whole grid.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        if !self.store.doctor_exists(doctor_id).await? {
            return Err(SchedulingError::DoctorNotFound);
        }

        let filter = AppointmentFilter {
            doctor_id: Some(doctor_id),
            date: Some(date),
            ..Default::default()
        };
        let booked: HashSet<TimeSlot> = self
            .store
            .list_appointments(&filter)
            .await?
            .into_iter()
            .filter(|appt| appt.occupies_slot())
            .map(|appt| appt.time_slot)
            .collect();

        debug!("Doctor {} has {} booked slots on {}", doctor_id, booked.len(), date);

        Ok(TimeSlot::grid()
            .into_iter()
            .filter(|slot| !booked.contains(slot))
            .collect())
    }
}
