pub mod handlers;
pub mod models;
pub mod registry;

pub use models::{NewScreening, Screening, ScreeningId, SeatCoord, SeatStatus, SeatView};
pub use registry::{DeltaSink, ExpectedState, SeatRegistry, SeatSlot, TransitionError};
