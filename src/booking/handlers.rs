use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use super::models::{Booking, BookingId};
use super::store::BookingFilter;
use crate::audit::AuditEvent;
use crate::auth::AuthClaims;
use crate::locks::LockId;
use crate::screening::{ScreeningId, SeatCoord};
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct LockSeatRequest {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Serialize)]
pub struct LockSeatResponse {
    pub lock_id: LockId,
    pub booking_id: BookingId,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    pub booking_id: BookingId,
}

#[derive(Debug, Serialize)]
pub struct ConfirmBookingResponse {
    pub status: String,
    pub booking: Booking,
}

/// HTTP handler for acquiring a temporary hold on a seat
///
/// POST /api/screenings/:id/lock
/// Returns the lock plus the PENDING booking that a later confirm resolves
#[instrument(name = "lock_seat", skip(state, claims))]
pub async fn lock_seat(
    State(state): State<AppState>,
    Path(screening_id): Path<ScreeningId>,
    Extension(claims): Extension<AuthClaims>,
    Json(request): Json<LockSeatRequest>,
) -> Result<(StatusCode, Json<LockSeatResponse>), AppError> {
    let seat = SeatCoord {
        row: request.row,
        col: request.col,
    };

    let lock = match state.locks.acquire(screening_id, seat, &claims.sub).await {
        Ok(lock) => lock,
        Err(e @ (AppError::AlreadyLocked | AppError::AlreadyBooked)) => {
            // Contention is part of the story an operator wants to see
            state
                .audit
                .append(
                    AuditEvent::LockFail,
                    json!({
                        "screening_id": screening_id,
                        "row": seat.row,
                        "col": seat.col,
                        "user_id": claims.sub,
                        "reason": e.to_string(),
                    }),
                )
                .await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let booking = Booking::new_pending(claims.sub, screening_id, vec![seat], vec![lock.id]);
    state.bookings.insert(booking.clone());

    let expires_in_seconds = (lock.expires_at - Utc::now()).num_seconds();
    Ok((
        StatusCode::CREATED,
        Json(LockSeatResponse {
            lock_id: lock.id,
            booking_id: booking.id,
            expires_at: lock.expires_at,
            expires_in_seconds,
        }),
    ))
}

/// HTTP handler for confirming a booking after payment succeeds
///
/// POST /api/bookings/confirm
#[instrument(name = "confirm_booking", skip(state, claims))]
pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<Json<ConfirmBookingResponse>, AppError> {
    let booking = state
        .coordinator
        .confirm(&claims.sub, request.booking_id)
        .await?;

    Ok(Json(ConfirmBookingResponse {
        status: "confirmed".to_string(),
        booking,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub user_id: Option<String>,
    pub screening_id: Option<ScreeningId>,
    pub movie_id: Option<String>,
    pub movie_name: Option<String>,
}

/// A booking enriched with the movie it belongs to, for the admin listing
#[derive(Debug, Serialize)]
pub struct AdminBookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub movie_id: Option<String>,
    pub movie_name: Option<String>,
}

/// HTTP handler for the admin booking listing
///
/// GET /admin/bookings?user_id=&screening_id=&movie_id=&movie_name=
#[instrument(name = "admin_list_bookings", skip(state))]
pub async fn admin_list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<AdminBookingView>>, AppError> {
    let filter = BookingFilter {
        user_id: query.user_id.clone(),
        screening_id: query.screening_id,
    };

    let views: Vec<AdminBookingView> = state
        .bookings
        .list(&filter)
        .into_iter()
        .map(|booking| {
            let screening = state.registry.get_screening(booking.screening_id).ok();
            AdminBookingView {
                booking,
                movie_id: screening.as_ref().map(|s| s.movie_id.clone()),
                movie_name: screening.map(|s| s.movie_name),
            }
        })
        .filter(|view| match (&query.movie_id, &view.movie_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .filter(|view| match (&query.movie_name, &view.movie_name) {
            (Some(wanted), Some(actual)) => {
                actual.to_lowercase().contains(&wanted.to_lowercase())
            }
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect();

    info!(booking_count = views.len(), "Bookings listed");
    Ok(Json(views))
}
