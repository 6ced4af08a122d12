use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::audit::{AuditRecorder, InMemoryAuditRecorder};
use crate::auth::TokenConfig;
use crate::booking::{BookingCoordinator, BookingStore};
use crate::broadcast::Hub;
use crate::config::Config;
use crate::locks::LockManager;
use crate::screening::SeatRegistry;

/// Shared application state containing all engine components
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: TokenConfig,
    pub hub: Arc<Hub>,
    pub registry: Arc<SeatRegistry>,
    pub bookings: Arc<BookingStore>,
    pub locks: Arc<LockManager>,
    pub coordinator: Arc<BookingCoordinator>,
    pub audit: Arc<dyn AuditRecorder>,
}

impl AppState {
    /// Wires the engine together. The hub is the delta sink for the registry,
    /// so every committed seat transition fans out without extra plumbing.
    pub fn new(config: Config) -> Self {
        let tokens = TokenConfig::new(config.jwt_secret.clone());
        let hub = Arc::new(Hub::new());
        let audit: Arc<dyn AuditRecorder> = Arc::new(InMemoryAuditRecorder::new(hub.clone()));
        let registry = Arc::new(SeatRegistry::new(hub.clone()));
        let bookings = Arc::new(BookingStore::new());
        let locks = Arc::new(LockManager::new(
            registry.clone(),
            bookings.clone(),
            audit.clone(),
            config.lock_ttl,
        ));
        let coordinator = Arc::new(BookingCoordinator::new(
            registry.clone(),
            locks.clone(),
            bookings.clone(),
            audit.clone(),
        ));

        Self {
            config,
            tokens,
            hub,
            registry,
            bookings,
            locks,
            coordinator,
            audit,
        }
    }
}

/// Request-local error taxonomy. No variant here is fatal to the process:
/// a failed lock or confirm always leaves the registry in its prior state.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("seat already locked")]
    AlreadyLocked,

    #[error("seat already booked")]
    AlreadyBooked,

    #[error("lock expired")]
    LockExpired,

    #[error("not the holder of this seat")]
    NotHolder,

    #[error("empty seat selection")]
    EmptySelection,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("admin only")]
    Forbidden,

    // Compare-and-swap race loss. Owning operations retry once before
    // surfacing a user-facing error, so callers should rarely see this.
    #[error("seat state changed concurrently")]
    StateMismatch,

    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyLocked
            | AppError::AlreadyBooked
            | AppError::LockExpired
            | AppError::StateMismatch => StatusCode::CONFLICT,
            AppError::NotHolder | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::EmptySelection | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use std::time::Duration;

    /// State with the default 300 s TTL, for tests that never let locks expire
    pub fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    /// State with a short TTL so expiry paths can be exercised with sleeps
    pub fn test_state_with_ttl(lock_ttl: Duration) -> AppState {
        AppState::new(Config {
            lock_ttl,
            sweep_interval: Duration::from_millis(10),
            ..Config::default()
        })
    }

    #[rstest::rstest]
    #[case(AppError::AlreadyLocked, StatusCode::CONFLICT)]
    #[case(AppError::AlreadyBooked, StatusCode::CONFLICT)]
    #[case(AppError::LockExpired, StatusCode::CONFLICT)]
    #[case(AppError::StateMismatch, StatusCode::CONFLICT)]
    #[case(AppError::NotHolder, StatusCode::FORBIDDEN)]
    #[case(AppError::Forbidden, StatusCode::FORBIDDEN)]
    #[case(AppError::EmptySelection, StatusCode::BAD_REQUEST)]
    #[case(AppError::Unauthorized("missing token".to_string()), StatusCode::UNAUTHORIZED)]
    #[case(AppError::NotFound("screening not found".to_string()), StatusCode::NOT_FOUND)]
    #[case(AppError::Internal, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_error_status_codes(#[case] error: AppError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }
}
