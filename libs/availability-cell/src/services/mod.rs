pub mod availability;
pub mod slots;
pub mod store;

pub use availability::AvailabilityService;
pub use slots::SlotGeneratorService;
pub use store::{AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore};
