pub mod availability;
pub mod booking;
pub mod locks;

pub use availability::SlotAvailabilityService;
pub use booking::AppointmentBookingService;
pub use locks::SlotLockRegistry;
