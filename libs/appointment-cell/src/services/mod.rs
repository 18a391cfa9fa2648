pub mod announcement;
pub mod availability;
pub mod board;
pub mod booking;
pub mod capacity;
pub mod consistency;
pub mod lifecycle;
pub mod queue;
pub mod store;

pub use announcement::AnnouncementService;
pub use board::AppointmentBoard;
pub use booking::{AppointmentBookingService, NewBooking};
pub use consistency::SlotLocks;
pub use lifecycle::AppointmentLifecycleService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
