use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::models::{Booking, BookingId, BookingStatus};
use crate::locks::LockId;
use crate::screening::ScreeningId;

/// Filter for the admin booking listing
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub screening_id: Option<ScreeningId>,
}

/// In-memory booking arena. Status transitions are guarded: a booking only
/// moves out of PENDING once, so a confirm and an expiry sweep racing on the
/// same booking cannot overwrite each other's outcome.
pub struct BookingStore {
    bookings: Mutex<HashMap<BookingId, Booking>>,
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingStore {
    pub fn new() -> Self {
        Self {
            bookings: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, booking: Booking) {
        debug!(booking_id = %booking.id, user_id = %booking.user_id, "Booking created");
        self.bookings.lock().unwrap().insert(booking.id, booking);
    }

    pub fn get(&self, id: BookingId) -> Option<Booking> {
        self.bookings.lock().unwrap().get(&id).cloned()
    }

    /// Moves the booking to CONFIRMED only if it is still PENDING
    pub fn confirm_if_pending(&self, id: BookingId, at: DateTime<Utc>) -> Option<Booking> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings.get_mut(&id)?;
        if booking.status != BookingStatus::Pending {
            return None;
        }
        booking.status = BookingStatus::Confirmed;
        booking.confirmed_at = Some(at);
        Some(booking.clone())
    }

    /// Moves the booking to CANCELLED only if it is still PENDING
    pub fn cancel_if_pending(&self, id: BookingId) -> Option<Booking> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings.get_mut(&id)?;
        if booking.status != BookingStatus::Pending {
            return None;
        }
        booking.status = BookingStatus::Cancelled;
        Some(booking.clone())
    }

    /// Cancels the PENDING booking that holds the given lock, if any.
    /// Used by release and the expiry sweep.
    pub fn cancel_for_lock(&self, lock_id: LockId) -> Option<Booking> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings
            .values_mut()
            .find(|b| b.status == BookingStatus::Pending && b.lock_ids.contains(&lock_id))?;
        booking.status = BookingStatus::Cancelled;
        Some(booking.clone())
    }

    /// The PENDING booking holding the given lock, if any (seat-details read)
    pub fn find_pending_by_lock(&self, lock_id: LockId) -> Option<Booking> {
        let bookings = self.bookings.lock().unwrap();
        bookings
            .values()
            .find(|b| b.status == BookingStatus::Pending && b.lock_ids.contains(&lock_id))
            .cloned()
    }

    /// Filtered listing, newest first
    pub fn list(&self, filter: &BookingFilter) -> Vec<Booking> {
        let bookings = self.bookings.lock().unwrap();
        let mut list: Vec<Booking> = bookings
            .values()
            .filter(|b| {
                filter
                    .user_id
                    .as_ref()
                    .map_or(true, |user_id| &b.user_id == user_id)
            })
            .filter(|b| {
                filter
                    .screening_id
                    .map_or(true, |screening_id| b.screening_id == screening_id)
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::SeatCoord;
    use uuid::Uuid;

    fn pending(user: &str, screening_id: ScreeningId, lock_id: LockId) -> Booking {
        Booking::new_pending(
            user.to_string(),
            screening_id,
            vec![SeatCoord { row: 0, col: 0 }],
            vec![lock_id],
        )
    }

    #[test]
    fn test_confirm_if_pending_only_fires_once() {
        let store = BookingStore::new();
        let booking = pending("user-1", Uuid::new_v4(), Uuid::new_v4());
        let id = booking.id;
        store.insert(booking);

        let confirmed = store.confirm_if_pending(id, Utc::now()).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());

        // Neither a second confirm nor a late cancel can overwrite it
        assert!(store.confirm_if_pending(id, Utc::now()).is_none());
        assert!(store.cancel_if_pending(id).is_none());
        assert_eq!(store.get(id).unwrap().status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_cancel_for_lock_targets_the_right_booking() {
        let store = BookingStore::new();
        let screening_id = Uuid::new_v4();
        let lock_a = Uuid::new_v4();
        let lock_b = Uuid::new_v4();
        let a = pending("user-1", screening_id, lock_a);
        let b = pending("user-2", screening_id, lock_b);
        let (id_a, id_b) = (a.id, b.id);
        store.insert(a);
        store.insert(b);

        let cancelled = store.cancel_for_lock(lock_a).unwrap();
        assert_eq!(cancelled.id, id_a);
        assert_eq!(store.get(id_a).unwrap().status, BookingStatus::Cancelled);
        assert_eq!(store.get(id_b).unwrap().status, BookingStatus::Pending);

        assert!(store.cancel_for_lock(lock_a).is_none());
        assert!(store.cancel_for_lock(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_list_filters() {
        let store = BookingStore::new();
        let screening_a = Uuid::new_v4();
        let screening_b = Uuid::new_v4();
        store.insert(pending("user-1", screening_a, Uuid::new_v4()));
        store.insert(pending("user-1", screening_b, Uuid::new_v4()));
        store.insert(pending("user-2", screening_a, Uuid::new_v4()));

        assert_eq!(store.list(&BookingFilter::default()).len(), 3);

        let by_user = store.list(&BookingFilter {
            user_id: Some("user-1".to_string()),
            ..Default::default()
        });
        assert_eq!(by_user.len(), 2);

        let by_both = store.list(&BookingFilter {
            user_id: Some("user-1".to_string()),
            screening_id: Some(screening_a),
        });
        assert_eq!(by_both.len(), 1);
    }
}
