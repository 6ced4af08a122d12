use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locks::LockId;
use crate::screening::{ScreeningId, SeatCoord};

pub type BookingId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A booking attempt over one or more held seats. PENDING while the holds are
/// live and payment is outstanding; CONFIRMED atomically with the seats'
/// BOOKED transition; CANCELLED when a hold expires or the commit fails.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: String,
    pub screening_id: ScreeningId,
    /// Coordinate-sorted, duplicate-free
    pub seats: Vec<SeatCoord>,
    pub lock_ids: Vec<LockId>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Creates a PENDING booking; seats are sorted and deduplicated here so
    /// every consumer sees the canonical coordinate order.
    pub fn new_pending(
        user_id: String,
        screening_id: ScreeningId,
        mut seats: Vec<SeatCoord>,
        lock_ids: Vec<LockId>,
    ) -> Self {
        seats.sort();
        seats.dedup();

        Self {
            id: Uuid::new_v4(),
            user_id,
            screening_id,
            seats,
            lock_ids,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

/// A confirm attempt as the engine sees it: which user wants which seats
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: String,
    pub screening_id: ScreeningId,
    pub seats: Vec<SeatCoord>,
}
