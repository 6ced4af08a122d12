use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::{NewScreening, Screening, ScreeningId, SeatCoord, SeatStatus, SeatView};
use crate::booking::BookingId;
use crate::locks::LockId;
use crate::shared::AppError;

/// Value state of one seat in a screening's arena. Lock and Booking records
/// live in their own arenas; the slot only carries their ids plus the fields
/// every transition decision needs (holder, timing), so there are no
/// ownership cycles between seats, locks and bookings.
#[derive(Debug, Clone, PartialEq)]
pub enum SeatSlot {
    Free,
    Locked {
        lock_id: LockId,
        user_id: String,
        acquired_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Booked {
        booking_id: BookingId,
        user_id: String,
        booked_at: DateTime<Utc>,
    },
}

/// Prior state a compare-and-swap transition requires. A locked seat is only
/// matched by the exact lock id, so a stale holder can never race a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedState {
    Free,
    LockedBy(LockId),
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("screening not found")]
    ScreeningNotFound,

    #[error("seat not found")]
    SeatOutOfRange,

    /// The seat was not in the expected state; carries what it actually was
    /// so the caller can map the race loss to a user-facing error.
    #[error("seat state changed concurrently")]
    Mismatch { actual: SeatSlot },
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::ScreeningNotFound => {
                AppError::NotFound("screening not found".to_string())
            }
            TransitionError::SeatOutOfRange => AppError::NotFound("seat not found".to_string()),
            TransitionError::Mismatch { .. } => AppError::StateMismatch,
        }
    }
}

/// Largest accepted value for either grid dimension. No auditorium is
/// anywhere near this; the cap exists so the seat arena size cannot overflow.
pub const MAX_GRID_DIM: u32 = 1_000;

/// Sink for committed seat deltas. The registry calls this inside the seat
/// table's critical section, so delivery order equals commit order per
/// screening. The broadcast hub is the production implementation.
pub trait DeltaSink: Send + Sync {
    fn seats_changed(&self, screening_id: ScreeningId, seats: &[SeatView]);
}

/// A locked seat with full metadata, for the seat-details read path.
/// The handler applies the privacy policy before anything leaves the process.
#[derive(Debug, Clone)]
pub struct LockedSeatInfo {
    pub seat: SeatCoord,
    pub lock_id: LockId,
    pub user_id: String,
    pub locked_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BookedSeatInfo {
    pub seat: SeatCoord,
    pub booking_id: BookingId,
    pub user_id: String,
    pub booked_at: DateTime<Utc>,
}

struct ScreeningSlot {
    screening: Screening,
    /// Row-major seat arena; index = row * cols + col
    seats: Mutex<Vec<SeatSlot>>,
}

impl ScreeningSlot {
    fn index_of(&self, coord: SeatCoord) -> Result<usize, TransitionError> {
        if coord.row >= self.screening.rows || coord.col >= self.screening.cols {
            return Err(TransitionError::SeatOutOfRange);
        }
        Ok((coord.row * self.screening.cols + coord.col) as usize)
    }
}

/// Authoritative per-screening seat table. All mutations are compare-and-swap
/// on `(seat, expected state)`; the registry never overwrites a state it did
/// not expect, which makes it the single synchronization point per seat.
/// Unrelated screenings share no lock.
pub struct SeatRegistry {
    screenings: RwLock<HashMap<ScreeningId, Arc<ScreeningSlot>>>,
    sink: Arc<dyn DeltaSink>,
}

impl SeatRegistry {
    pub fn new(sink: Arc<dyn DeltaSink>) -> Self {
        Self {
            screenings: RwLock::new(HashMap::new()),
            sink,
        }
    }

    #[instrument(skip(self, new))]
    pub fn create_screening(&self, new: NewScreening) -> Result<Screening, AppError> {
        if new.rows == 0 || new.cols == 0 {
            return Err(AppError::InvalidRequest(
                "rows and cols must be at least 1".to_string(),
            ));
        }
        // Bounding the dimensions keeps rows * cols inside u32 and the arena
        // allocation sane
        if new.rows > MAX_GRID_DIM || new.cols > MAX_GRID_DIM {
            return Err(AppError::InvalidRequest(format!(
                "rows and cols must be at most {MAX_GRID_DIM}"
            )));
        }

        let screening = Screening {
            id: Uuid::new_v4(),
            movie_id: new.movie_id,
            movie_name: new.movie_name,
            screen_at: new.screen_at,
            rows: new.rows,
            cols: new.cols,
            created_at: Utc::now(),
        };

        let seat_count = (new.rows * new.cols) as usize;
        let slot = ScreeningSlot {
            screening: screening.clone(),
            seats: Mutex::new(vec![SeatSlot::Free; seat_count]),
        };

        let mut screenings = self.screenings.write().unwrap();
        screenings.insert(screening.id, Arc::new(slot));

        info!(
            screening_id = %screening.id,
            movie_name = %screening.movie_name,
            rows = screening.rows,
            cols = screening.cols,
            "Screening created"
        );

        Ok(screening)
    }

    pub fn list_screenings(&self) -> Vec<Screening> {
        let screenings = self.screenings.read().unwrap();
        let mut list: Vec<Screening> = screenings
            .values()
            .map(|slot| slot.screening.clone())
            .collect();
        list.sort_by_key(|s| s.screen_at);
        list
    }

    pub fn get_screening(&self, id: ScreeningId) -> Result<Screening, AppError> {
        self.slot(id)
            .map(|slot| slot.screening.clone())
            .map_err(AppError::from)
    }

    /// Ordered (row-major) seat map snapshot. A lock already past its expiry
    /// reads as FREE here; the sweep is the backstop that flips the slot and
    /// broadcasts the delta.
    pub fn seat_map(&self, id: ScreeningId) -> Result<Vec<SeatView>, AppError> {
        let slot = self.slot(id)?;
        let now = Utc::now();
        let seats = slot.seats.lock().unwrap();
        let cols = slot.screening.cols;

        Ok(seats
            .iter()
            .enumerate()
            .map(|(idx, state)| {
                let coord = SeatCoord {
                    row: idx as u32 / cols,
                    col: idx as u32 % cols,
                };
                view_at(coord, state, now)
            })
            .collect())
    }

    /// Locked and booked seats with timing metadata, skipping lapsed locks
    pub fn seat_details(
        &self,
        id: ScreeningId,
    ) -> Result<(Vec<LockedSeatInfo>, Vec<BookedSeatInfo>), AppError> {
        let slot = self.slot(id)?;
        let now = Utc::now();
        let seats = slot.seats.lock().unwrap();
        let cols = slot.screening.cols;

        let mut locked = Vec::new();
        let mut booked = Vec::new();
        for (idx, state) in seats.iter().enumerate() {
            let seat = SeatCoord {
                row: idx as u32 / cols,
                col: idx as u32 % cols,
            };
            match state {
                SeatSlot::Locked {
                    lock_id,
                    user_id,
                    acquired_at,
                    expires_at,
                } if *expires_at > now => locked.push(LockedSeatInfo {
                    seat,
                    lock_id: *lock_id,
                    user_id: user_id.clone(),
                    locked_at: *acquired_at,
                    unlocks_at: *expires_at,
                }),
                SeatSlot::Booked {
                    booking_id,
                    user_id,
                    booked_at,
                } => booked.push(BookedSeatInfo {
                    seat,
                    booking_id: *booking_id,
                    user_id: user_id.clone(),
                    booked_at: *booked_at,
                }),
                _ => {}
            }
        }
        Ok((locked, booked))
    }

    /// Current state of one seat (clone), for validation reads
    pub fn seat_state(
        &self,
        id: ScreeningId,
        coord: SeatCoord,
    ) -> Result<SeatSlot, TransitionError> {
        let slot = self.slot_raw(id)?;
        let idx = slot.index_of(coord)?;
        let seats = slot.seats.lock().unwrap();
        Ok(seats[idx].clone())
    }

    /// Compare-and-swap one seat. Commits and emits the delta inside the seat
    /// table's critical section, or rejects with the actual state on mismatch.
    #[instrument(skip(self, next))]
    pub fn apply_transition(
        &self,
        id: ScreeningId,
        coord: SeatCoord,
        expected: ExpectedState,
        next: SeatSlot,
    ) -> Result<SeatView, TransitionError> {
        let slot = self.slot_raw(id)?;
        let idx = slot.index_of(coord)?;
        let mut seats = slot.seats.lock().unwrap();

        if !matches_expected(&seats[idx], expected) {
            debug!(screening_id = %id, row = coord.row, col = coord.col, "Transition rejected");
            return Err(TransitionError::Mismatch {
                actual: seats[idx].clone(),
            });
        }

        seats[idx] = next;
        let view = view_at(coord, &seats[idx], Utc::now());
        self.sink.seats_changed(id, std::slice::from_ref(&view));
        debug!(screening_id = %id, row = coord.row, col = coord.col, status = ?view.status, "Transition committed");
        Ok(view)
    }

    /// All-or-nothing multi-seat compare-and-swap under one critical section.
    /// Callers pass transitions pre-sorted by coordinate and free of
    /// duplicates. Emits exactly one delta covering every affected seat, so
    /// no reader or subscriber ever observes a partial commit.
    #[instrument(skip(self, transitions))]
    pub fn apply_batch(
        &self,
        id: ScreeningId,
        transitions: Vec<(SeatCoord, ExpectedState, SeatSlot)>,
    ) -> Result<Vec<SeatView>, TransitionError> {
        let slot = self.slot_raw(id)?;

        let mut indices = Vec::with_capacity(transitions.len());
        for (coord, _, _) in &transitions {
            indices.push(slot.index_of(*coord)?);
        }

        let mut seats = slot.seats.lock().unwrap();

        // Verify every slot before touching any
        for (&idx, (coord, expected, _)) in indices.iter().zip(&transitions) {
            if !matches_expected(&seats[idx], *expected) {
                warn!(
                    screening_id = %id,
                    row = coord.row,
                    col = coord.col,
                    "Batch transition rejected, no seats touched"
                );
                return Err(TransitionError::Mismatch {
                    actual: seats[idx].clone(),
                });
            }
        }

        let now = Utc::now();
        let mut views = Vec::with_capacity(transitions.len());
        for (&idx, (coord, _, next)) in indices.iter().zip(transitions.iter()) {
            seats[idx] = next.clone();
            views.push(view_at(*coord, &seats[idx], now));
        }

        self.sink.seats_changed(id, &views);
        debug!(screening_id = %id, seats = views.len(), "Batch transition committed");
        Ok(views)
    }

    fn slot(&self, id: ScreeningId) -> Result<Arc<ScreeningSlot>, AppError> {
        self.slot_raw(id).map_err(AppError::from)
    }

    fn slot_raw(&self, id: ScreeningId) -> Result<Arc<ScreeningSlot>, TransitionError> {
        let screenings = self.screenings.read().unwrap();
        screenings
            .get(&id)
            .cloned()
            .ok_or(TransitionError::ScreeningNotFound)
    }
}

fn matches_expected(current: &SeatSlot, expected: ExpectedState) -> bool {
    match (current, expected) {
        (SeatSlot::Free, ExpectedState::Free) => true,
        (SeatSlot::Locked { lock_id, .. }, ExpectedState::LockedBy(id)) => *lock_id == id,
        _ => false,
    }
}

fn view_at(coord: SeatCoord, state: &SeatSlot, now: DateTime<Utc>) -> SeatView {
    match state {
        SeatSlot::Free => SeatView {
            row: coord.row,
            col: coord.col,
            status: SeatStatus::Free,
            expires_at: None,
        },
        // Lapsed lock reads as FREE until the sweep flips the slot
        SeatSlot::Locked { expires_at, .. } if *expires_at <= now => SeatView {
            row: coord.row,
            col: coord.col,
            status: SeatStatus::Free,
            expires_at: None,
        },
        SeatSlot::Locked { expires_at, .. } => SeatView {
            row: coord.row,
            col: coord.col,
            status: SeatStatus::Locked,
            expires_at: Some(*expires_at),
        },
        SeatSlot::Booked { .. } => SeatView {
            row: coord.row,
            col: coord.col,
            status: SeatStatus::Booked,
            expires_at: None,
        },
    }
}
