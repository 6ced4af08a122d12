use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ScreeningId = Uuid;

/// A screening of a movie in one auditorium. Immutable after creation;
/// the seat grid it owns lives in the SeatRegistry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screening {
    pub id: ScreeningId,
    pub movie_id: String,
    pub movie_name: String,
    pub screen_at: DateTime<Utc>,
    pub rows: u32,
    pub cols: u32,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a screening (admin operation)
#[derive(Debug, Clone, Deserialize)]
pub struct NewScreening {
    pub movie_id: String,
    pub movie_name: String,
    pub screen_at: DateTime<Utc>,
    pub rows: u32,
    pub cols: u32,
}

/// Seat coordinate within a screening's grid.
///
/// Derived `Ord` is row-major (row, then column), which is the order
/// multi-seat commit batches are sorted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SeatCoord {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Free,
    Locked,
    Booked,
}

/// What every viewer sees for one seat: the state, and for a locked seat the
/// time it unlocks. Holder identity is never part of this view - it is the
/// payload of seat-map snapshots and broadcast deltas alike.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatView {
    pub row: u32,
    pub col: u32,
    pub status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
