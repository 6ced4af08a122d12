use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{Booking, BookingId, BookingRequest, BookingStatus};
use super::store::BookingStore;
use crate::audit::{AuditEvent, AuditRecorder};
use crate::locks::{LockId, LockManager};
use crate::screening::{ExpectedState, SeatCoord, SeatRegistry, SeatSlot, TransitionError};
use crate::shared::AppError;

/// Converts a set of currently-held locks into a committed booking, or
/// rejects the whole attempt. The core correctness property lives here: a
/// booking can never include a seat its user did not provably hold at commit
/// time, and no reader ever observes a partially committed seat set.
pub struct BookingCoordinator {
    registry: Arc<SeatRegistry>,
    locks: Arc<LockManager>,
    bookings: Arc<BookingStore>,
    audit: Arc<dyn AuditRecorder>,
}

impl BookingCoordinator {
    pub fn new(
        registry: Arc<SeatRegistry>,
        locks: Arc<LockManager>,
        bookings: Arc<BookingStore>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            registry,
            locks,
            bookings,
            audit,
        }
    }

    /// Engine-level confirm: validates the request, creates the booking
    /// PENDING, and commits LOCKED -> BOOKED for every seat as one atomic
    /// batch. On any failure the booking is CANCELLED and no seat is touched.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn confirm_request(&self, request: BookingRequest) -> Result<Booking, AppError> {
        if request.seats.is_empty() {
            return Err(AppError::EmptySelection);
        }
        self.registry.get_screening(request.screening_id)?;

        let booking = Booking::new_pending(
            request.user_id,
            request.screening_id,
            request.seats,
            Vec::new(),
        );
        self.bookings.insert(booking.clone());

        match self.commit(&booking).await {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => {
                self.bookings.cancel_if_pending(booking.id);
                Err(e)
            }
        }
    }

    /// The payment-success path: resolves the caller's PENDING booking and
    /// commits its seat set. If the signal never arrives, there is no rollback
    /// to do - the locks simply expire through the normal sweep.
    #[instrument(skip(self))]
    pub async fn confirm(&self, user_id: &str, booking_id: BookingId) -> Result<Booking, AppError> {
        let booking = self
            .bookings
            .get(booking_id)
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

        if booking.user_id != user_id {
            return Err(AppError::NotHolder);
        }
        match booking.status {
            BookingStatus::Confirmed => return Err(AppError::AlreadyBooked),
            BookingStatus::Cancelled => return Err(AppError::LockExpired),
            BookingStatus::Pending => {}
        }

        match self.commit(&booking).await {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => {
                // The holds backing this booking were the caller's own, so a
                // seat now held by someone else means they lapsed first.
                let e = match e {
                    AppError::NotHolder => AppError::LockExpired,
                    other => other,
                };
                if matches!(e, AppError::LockExpired | AppError::AlreadyBooked) {
                    self.bookings.cancel_if_pending(booking.id);
                }
                Err(e)
            }
        }
    }

    /// Validates every hold, then applies the whole batch through the
    /// registry's compare-and-swap. A race loss between validation and the
    /// batch is retried once with fresh state; the second validation surfaces
    /// the user-facing error.
    async fn commit(&self, booking: &Booking) -> Result<Booking, AppError> {
        for attempt in 0..2 {
            let now = Utc::now();
            let transitions = self.plan_transitions(booking, now)?;
            let lock_ids: Vec<LockId> = transitions
                .iter()
                .map(|(_, expected, _)| match expected {
                    ExpectedState::LockedBy(id) => *id,
                    ExpectedState::Free => unreachable!("plans only target held seats"),
                })
                .collect();

            match self
                .registry
                .apply_batch(booking.screening_id, transitions)
            {
                Ok(_) => {
                    // Holds are consumed by the commit, not released
                    for lock_id in &lock_ids {
                        self.locks.consume(*lock_id);
                    }

                    let confirmed = self
                        .bookings
                        .confirm_if_pending(booking.id, Utc::now())
                        .ok_or(AppError::LockExpired)?;

                    info!(
                        booking_id = %confirmed.id,
                        user_id = %confirmed.user_id,
                        screening_id = %confirmed.screening_id,
                        seats = confirmed.seats.len(),
                        "Booking confirmed"
                    );

                    self.audit
                        .append(
                            AuditEvent::BookingSuccess,
                            json!({
                                "booking_id": confirmed.id,
                                "user_id": confirmed.user_id,
                                "screening_id": confirmed.screening_id,
                                "seats": confirmed.seats,
                            }),
                        )
                        .await;

                    return Ok(confirmed);
                }
                Err(TransitionError::Mismatch { .. }) if attempt == 0 => {
                    debug!(booking_id = %booking.id, "Commit lost a seat race, revalidating once");
                }
                Err(TransitionError::Mismatch { .. }) => {
                    // Losing the race twice means validation and commit keep
                    // disagreeing, which should not happen for a single holder
                    warn!(booking_id = %booking.id, "Commit lost a seat race twice");
                    self.audit
                        .append(
                            AuditEvent::SystemError,
                            json!({
                                "booking_id": booking.id,
                                "screening_id": booking.screening_id,
                                "detail": "commit retry exhausted",
                            }),
                        )
                        .await;
                    return Err(AppError::LockExpired);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::LockExpired)
    }

    /// Builds the LOCKED -> BOOKED transition for every seat, rejecting the
    /// whole attempt if any seat is not a live hold of the booking's user
    fn plan_transitions(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> Result<Vec<(SeatCoord, ExpectedState, SeatSlot)>, AppError> {
        let mut transitions = Vec::with_capacity(booking.seats.len());
        for &coord in &booking.seats {
            let slot = self.registry.seat_state(booking.screening_id, coord)?;
            match slot {
                SeatSlot::Free => return Err(AppError::LockExpired),
                SeatSlot::Booked { .. } => return Err(AppError::AlreadyBooked),
                SeatSlot::Locked { user_id, .. } if user_id != booking.user_id => {
                    return Err(AppError::NotHolder)
                }
                SeatSlot::Locked { expires_at, .. } if expires_at <= now => {
                    return Err(AppError::LockExpired)
                }
                SeatSlot::Locked { lock_id, .. } => transitions.push((
                    coord,
                    ExpectedState::LockedBy(lock_id),
                    SeatSlot::Booked {
                        booking_id: booking.id,
                        user_id: booking.user_id.clone(),
                        booked_at: now,
                    },
                )),
            }
        }
        Ok(transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::NewScreening;
    use crate::shared::test_utils::{test_state, test_state_with_ttl};
    use crate::shared::AppState;
    use uuid::Uuid;

    fn seat(row: u32, col: u32) -> SeatCoord {
        SeatCoord { row, col }
    }

    fn make_screening(state: &AppState) -> crate::screening::ScreeningId {
        state
            .registry
            .create_screening(NewScreening {
                movie_id: "m-1".to_string(),
                movie_name: "Test Movie".to_string(),
                screen_at: Utc::now() + chrono::Duration::hours(1),
                rows: 10,
                cols: 10,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_confirm_request_commits_held_seats() {
        let state = test_state();
        let screening_id = make_screening(&state);

        state
            .locks
            .acquire(screening_id, seat(2, 3), "user-1")
            .await
            .unwrap();
        state
            .locks
            .acquire(screening_id, seat(2, 4), "user-1")
            .await
            .unwrap();

        let booking = state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-1".to_string(),
                screening_id,
                seats: vec![seat(2, 4), seat(2, 3)],
            })
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.confirmed_at.is_some());
        assert_eq!(booking.seats, vec![seat(2, 3), seat(2, 4)]);

        for col in 3..5 {
            let slot = state.registry.seat_state(screening_id, seat(2, col)).unwrap();
            assert!(matches!(slot, SeatSlot::Booked { ref user_id, .. } if user_id == "user-1"));
        }
        // Consumed locks are gone from the arena
        assert_eq!(state.locks.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let state = test_state();
        let screening_id = make_screening(&state);

        let result = state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-1".to_string(),
                screening_id,
                seats: vec![],
            })
            .await;
        assert!(matches!(result, Err(AppError::EmptySelection)));
    }

    #[tokio::test]
    async fn test_confirm_with_expired_lock_fails() {
        let state = test_state_with_ttl(std::time::Duration::from_millis(20));
        let screening_id = make_screening(&state);

        state
            .locks
            .acquire(screening_id, seat(0, 0), "user-1")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;

        let result = state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-1".to_string(),
                screening_id,
                seats: vec![seat(0, 0)],
            })
            .await;
        assert!(matches!(result, Err(AppError::LockExpired)));

        // The seat never became BOOKED
        let slot = state.registry.seat_state(screening_id, seat(0, 0)).unwrap();
        assert!(!matches!(slot, SeatSlot::Booked { .. }));
        state.locks.sweep_expired(Utc::now()).await;
        let slot = state.registry.seat_state(screening_id, seat(0, 0)).unwrap();
        assert!(matches!(slot, SeatSlot::Free));
    }

    #[tokio::test]
    async fn test_partial_holds_reject_whole_attempt() {
        let state = test_state();
        let screening_id = make_screening(&state);

        let lock_a = state
            .locks
            .acquire(screening_id, seat(1, 1), "user-1")
            .await
            .unwrap();
        state
            .locks
            .acquire(screening_id, seat(1, 2), "user-2")
            .await
            .unwrap();

        // user-1 holds A but not B: the whole attempt fails
        let result = state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-1".to_string(),
                screening_id,
                seats: vec![seat(1, 1), seat(1, 2)],
            })
            .await;
        assert!(matches!(result, Err(AppError::NotHolder)));

        // Seat A is still locked by user-1, untouched by the failed commit
        let slot = state.registry.seat_state(screening_id, seat(1, 1)).unwrap();
        assert!(
            matches!(slot, SeatSlot::Locked { lock_id, ref user_id, .. }
                if lock_id == lock_a.id && user_id == "user-1")
        );
    }

    #[tokio::test]
    async fn test_confirm_by_booking_id_flow() {
        let state = test_state();
        let screening_id = make_screening(&state);

        let lock = state
            .locks
            .acquire(screening_id, seat(5, 5), "user-1")
            .await
            .unwrap();
        let pending = Booking::new_pending(
            "user-1".to_string(),
            screening_id,
            vec![seat(5, 5)],
            vec![lock.id],
        );
        state.bookings.insert(pending.clone());

        // Wrong user cannot confirm someone else's booking
        let result = state.coordinator.confirm("user-2", pending.id).await;
        assert!(matches!(result, Err(AppError::NotHolder)));

        let confirmed = state.coordinator.confirm("user-1", pending.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        // Confirming again reports the seats as already booked
        let result = state.coordinator.confirm("user-1", pending.id).await;
        assert!(matches!(result, Err(AppError::AlreadyBooked)));
    }

    #[tokio::test]
    async fn test_confirm_unknown_booking() {
        let state = test_state();
        let result = state.coordinator.confirm("user-1", Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_booked_seat_cannot_be_confirmed_again_by_other_user() {
        let state = test_state();
        let screening_id = make_screening(&state);

        state
            .locks
            .acquire(screening_id, seat(0, 0), "user-1")
            .await
            .unwrap();
        state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-1".to_string(),
                screening_id,
                seats: vec![seat(0, 0)],
            })
            .await
            .unwrap();

        let result = state
            .coordinator
            .confirm_request(BookingRequest {
                user_id: "user-2".to_string(),
                screening_id,
                seats: vec![seat(0, 0)],
            })
            .await;
        assert!(matches!(result, Err(AppError::AlreadyBooked)));
    }
}
