pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod slots;
pub mod state;
pub mod store;

pub use models::*;
pub use slots::TimeSlot;
pub use state::SchedulingState;
pub use store::{InMemorySchedulingStore, PostgrestSchedulingStore, SchedulingStore};
