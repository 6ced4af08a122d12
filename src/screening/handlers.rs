use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use super::models::{NewScreening, Screening, ScreeningId, SeatCoord, SeatView};
use crate::auth::AuthClaims;
use crate::booking::BookingId;
use crate::shared::{AppError, AppState};

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub screening: Screening,
    pub seats: Vec<SeatView>,
}

/// A locked seat as shown to a client. The holder's identity never leaves the
/// process; callers only learn whether the hold is their own.
#[derive(Debug, Serialize)]
pub struct LockedSeatView {
    pub seat: SeatCoord,
    pub locked_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
    pub mine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

#[derive(Debug, Serialize)]
pub struct BookedSeatView {
    pub seat: SeatCoord,
    pub booked_at: DateTime<Utc>,
    pub mine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

#[derive(Debug, Serialize)]
pub struct SeatDetailsResponse {
    pub screening: Screening,
    pub locked: Vec<LockedSeatView>,
    pub booked: Vec<BookedSeatView>,
}

/// HTTP handler for listing screenings, soonest first
///
/// GET /api/screenings
#[instrument(name = "list_screenings", skip(state))]
pub async fn list_screenings(State(state): State<AppState>) -> Json<Vec<Screening>> {
    Json(state.registry.list_screenings())
}

/// HTTP handler for a single screening's metadata
///
/// GET /api/screenings/:id
#[instrument(name = "get_screening", skip(state))]
pub async fn get_screening(
    State(state): State<AppState>,
    Path(id): Path<ScreeningId>,
) -> Result<Json<Screening>, AppError> {
    Ok(Json(state.registry.get_screening(id)?))
}

/// HTTP handler for the full seat map snapshot
///
/// GET /api/screenings/:id/seats
#[instrument(name = "get_seat_map", skip(state))]
pub async fn get_seat_map(
    State(state): State<AppState>,
    Path(id): Path<ScreeningId>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let screening = state.registry.get_screening(id)?;
    let seats = state.registry.seat_map(id)?;
    Ok(Json(SeatMapResponse { screening, seats }))
}

/// HTTP handler for lock and booking timing detail on a screening. Holder
/// identity is reduced to a `mine` flag, and the pending booking id is
/// attached only to the caller's own holds.
///
/// GET /api/screenings/:id/seat-details
#[instrument(name = "get_seat_details", skip(state, claims))]
pub async fn get_seat_details(
    State(state): State<AppState>,
    Path(id): Path<ScreeningId>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<SeatDetailsResponse>, AppError> {
    let screening = state.registry.get_screening(id)?;
    let (locked, booked) = state.registry.seat_details(id)?;

    let locked = locked
        .into_iter()
        .map(|info| {
            let mine = info.user_id == claims.sub;
            let booking_id = if mine {
                state
                    .bookings
                    .find_pending_by_lock(info.lock_id)
                    .map(|b| b.id)
            } else {
                None
            };
            LockedSeatView {
                seat: info.seat,
                locked_at: info.locked_at,
                unlocks_at: info.unlocks_at,
                mine,
                booking_id,
            }
        })
        .collect();

    let booked = booked
        .into_iter()
        .map(|info| {
            let mine = info.user_id == claims.sub;
            BookedSeatView {
                seat: info.seat,
                booked_at: info.booked_at,
                mine,
                booking_id: mine.then_some(info.booking_id),
            }
        })
        .collect();

    Ok(Json(SeatDetailsResponse {
        screening,
        locked,
        booked,
    }))
}

/// HTTP handler for creating a screening with an all-FREE seat grid
///
/// POST /admin/screenings
#[instrument(name = "create_screening", skip(state, request))]
pub async fn create_screening(
    State(state): State<AppState>,
    Json(request): Json<NewScreening>,
) -> Result<(StatusCode, Json<Screening>), AppError> {
    let screening = state.registry.create_screening(request)?;
    info!(screening_id = %screening.id, "Screening created via admin API");
    Ok((StatusCode::CREATED, Json(screening)))
}
