pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod locks;
pub mod query;
pub mod store;

pub use booking::AppointmentBookingService;
pub use conflict::{intervals_overlap, ConflictDetectionService};
pub use lifecycle::{AppointmentAction, AppointmentLifecycleService};
pub use locks::SchedulingLocks;
pub use query::AppointmentQueryService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
