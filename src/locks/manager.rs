use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditRecorder};
use crate::booking::BookingStore;
use crate::screening::{
    ExpectedState, ScreeningId, SeatCoord, SeatRegistry, SeatSlot, TransitionError,
};
use crate::shared::AppError;

pub type LockId = Uuid;

/// A time-bounded provisional hold on one seat by one user. Destroyed on
/// expiry, explicit release, or booking commit - never silently extended.
#[derive(Debug, Clone, Serialize)]
pub struct Lock {
    pub id: LockId,
    pub screening_id: ScreeningId,
    pub seat: SeatCoord,
    pub user_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Acquires, releases and expires seat holds. The seat slot in the registry
/// is the synchronization point; the lock arena here only holds the full
/// records, keyed by id.
pub struct LockManager {
    registry: Arc<SeatRegistry>,
    bookings: Arc<BookingStore>,
    audit: Arc<dyn AuditRecorder>,
    locks: Mutex<HashMap<LockId, Lock>>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(
        registry: Arc<SeatRegistry>,
        bookings: Arc<BookingStore>,
        audit: Arc<dyn AuditRecorder>,
        ttl: std::time::Duration,
    ) -> Self {
        Self {
            registry,
            bookings,
            audit,
            locks: Mutex::new(HashMap::new()),
            ttl: Duration::milliseconds(ttl.as_millis() as i64),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Atomically acquires a hold on a FREE seat. Exactly one of two racing
    /// acquires succeeds; the loser observes AlreadyLocked (or AlreadyBooked).
    /// A seat carrying a lapsed lock is expired inline and the acquire is
    /// retried once. Re-acquiring a seat the same user already holds is also
    /// AlreadyLocked: the TTL is reset only by release plus fresh acquire.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
        screening_id: ScreeningId,
        seat: SeatCoord,
        user_id: &str,
    ) -> Result<Lock, AppError> {
        for attempt in 0..2 {
            let now = Utc::now();
            let lock = Lock {
                id: Uuid::new_v4(),
                screening_id,
                seat,
                user_id: user_id.to_string(),
                acquired_at: now,
                expires_at: now + self.ttl,
            };

            let slot = SeatSlot::Locked {
                lock_id: lock.id,
                user_id: lock.user_id.clone(),
                acquired_at: lock.acquired_at,
                expires_at: lock.expires_at,
            };

            match self
                .registry
                .apply_transition(screening_id, seat, ExpectedState::Free, slot)
            {
                Ok(_) => {
                    self.locks.lock().unwrap().insert(lock.id, lock.clone());
                    info!(
                        screening_id = %screening_id,
                        row = seat.row,
                        col = seat.col,
                        user_id = %user_id,
                        lock_id = %lock.id,
                        "Seat lock acquired"
                    );
                    return Ok(lock);
                }
                Err(TransitionError::Mismatch { actual }) => match actual {
                    SeatSlot::Booked { .. } => return Err(AppError::AlreadyBooked),
                    SeatSlot::Locked {
                        lock_id,
                        expires_at,
                        ..
                    } if expires_at <= now && attempt == 0 => {
                        // Lapsed hold still occupying the slot; free it and retry
                        self.expire_seat(screening_id, seat, lock_id).await;
                    }
                    SeatSlot::Locked { .. } => return Err(AppError::AlreadyLocked),
                    // A free seat always matches an expected-free transition
                    SeatSlot::Free => unreachable!("free seat cannot mismatch"),
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::AlreadyLocked)
    }

    /// Returns the seat to FREE if this lock is still its current hold.
    /// Idempotent: releasing twice, or releasing an expired or consumed lock,
    /// is a no-op. A release that wins the seat also cancels the lock's
    /// pending booking; one that loses leaves the booking to the path that
    /// owns the seat now.
    #[instrument(skip(self))]
    pub async fn release(&self, lock_id: LockId) -> Result<(), AppError> {
        let lock = match self.locks.lock().unwrap().get(&lock_id) {
            Some(lock) => lock.clone(),
            None => return Ok(()),
        };

        match self.registry.apply_transition(
            lock.screening_id,
            lock.seat,
            ExpectedState::LockedBy(lock_id),
            SeatSlot::Free,
        ) {
            Ok(_) => {
                debug!(lock_id = %lock_id, user_id = %lock.user_id, "Seat lock released");
                self.locks.lock().unwrap().remove(&lock_id);
                self.bookings.cancel_for_lock(lock_id);
            }
            Err(TransitionError::Mismatch { .. }) => {
                // Seat already moved on: a commit in flight owns this seat
                // now, so the pending booking must stay untouched. Only the
                // stale record goes.
                debug!(lock_id = %lock_id, "Release was a no-op, lock no longer current");
                self.locks.lock().unwrap().remove(&lock_id);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Discards a lock record consumed by a booking commit
    pub fn consume(&self, lock_id: LockId) -> Option<Lock> {
        self.locks.lock().unwrap().remove(&lock_id)
    }

    pub fn get(&self, lock_id: LockId) -> Option<Lock> {
        self.locks.lock().unwrap().get(&lock_id).cloned()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Frees every seat whose lock has lapsed at `now`. CAS losses are
    /// skipped silently: expiry is idempotent and the losing seat was already
    /// handled by a commit, release or re-acquire. Returns the number of
    /// seats freed.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Lock> = {
            let locks = self.locks.lock().unwrap();
            locks
                .values()
                .filter(|lock| lock.expires_at <= now)
                .cloned()
                .collect()
        };

        let mut freed = 0;
        for lock in expired {
            if self
                .expire_seat(lock.screening_id, lock.seat, lock.id)
                .await
            {
                freed += 1;
            }
        }
        freed
    }

    /// CAS the seat back to FREE for one lapsed lock, cancel its pending
    /// booking and record the audit trail. The delta emitted is identical in
    /// shape to an explicit release.
    async fn expire_seat(
        &self,
        screening_id: ScreeningId,
        seat: SeatCoord,
        lock_id: LockId,
    ) -> bool {
        match self.registry.apply_transition(
            screening_id,
            seat,
            ExpectedState::LockedBy(lock_id),
            SeatSlot::Free,
        ) {
            Ok(_) => {}
            Err(_) => return false, // lost the race; another path owns this seat now
        }

        self.locks.lock().unwrap().remove(&lock_id);

        let cancelled = self.bookings.cancel_for_lock(lock_id);

        info!(
            screening_id = %screening_id,
            row = seat.row,
            col = seat.col,
            lock_id = %lock_id,
            "Expired seat lock freed"
        );

        self.audit
            .append(
                AuditEvent::SeatReleased,
                json!({
                    "screening_id": screening_id,
                    "row": seat.row,
                    "col": seat.col,
                    "lock_id": lock_id,
                }),
            )
            .await;

        if let Some(booking) = cancelled {
            self.audit
                .append(
                    AuditEvent::BookingTimeout,
                    json!({
                        "booking_id": booking.id,
                        "screening_id": screening_id,
                        "user_id": booking.user_id,
                    }),
                )
                .await;
        }

        true
    }
}
