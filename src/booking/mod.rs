pub mod coordinator;
pub mod handlers;
pub mod models;
pub mod store;

pub use coordinator::BookingCoordinator;
pub use models::{Booking, BookingId, BookingRequest, BookingStatus};
pub use store::{BookingFilter, BookingStore};
