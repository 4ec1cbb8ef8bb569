use std::sync::Arc;

use crate::services::{AppointmentBookingService, SlotAvailabilityService};
use crate::store::SchedulingStore;

/// Shared scheduling services, built once at startup over a single store
/// handle so the slot-lock registry spans every request.
pub struct SchedulingState {
    pub booking: AppointmentBookingService,
    pub availability: SlotAvailabilityService,
}

impl SchedulingState {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            booking: AppointmentBookingService::new(Arc::clone(&store)),
            availability: SlotAvailabilityService::new(store),
        }
    }
}
