use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use cineseat::auth::Role;
use cineseat::{build_router, AppState, Config};

/// A router plus pre-issued tokens, for driving the full HTTP surface
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub user_token: String,
    pub admin_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Short TTL and sweep interval for tests that exercise expiry
    pub fn with_ttl(lock_ttl: Duration) -> Self {
        Self::with_config(Config {
            lock_ttl,
            sweep_interval: Duration::from_millis(10),
            ..Config::default()
        })
    }

    fn with_config(config: Config) -> Self {
        let state = AppState::new(config);
        let router = build_router(state.clone());
        let user_token = state.tokens.issue("user-1", Role::User).unwrap();
        let admin_token = state.tokens.issue("admin-1", Role::Admin).unwrap();
        Self {
            state,
            router,
            user_token,
            admin_token,
        }
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.state.tokens.issue(user_id, Role::User).unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn create_screening(&self, rows: u32, cols: u32) -> Uuid {
        let (status, body) = self
            .request(
                "POST",
                "/admin/screenings",
                Some(&self.admin_token),
                Some(json!({
                    "movie_id": "m-1",
                    "movie_name": "Integration Movie",
                    "screen_at": Utc::now() + chrono::Duration::hours(2),
                    "rows": rows,
                    "cols": cols,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create screening: {body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn lock_seat(
        &self,
        token: &str,
        screening_id: Uuid,
        row: u32,
        col: u32,
    ) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/screenings/{screening_id}/lock"),
            Some(token),
            Some(json!({ "row": row, "col": col })),
        )
        .await
    }

    pub async fn confirm_booking(&self, token: &str, booking_id: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/api/bookings/confirm",
            Some(token),
            Some(json!({ "booking_id": booking_id })),
        )
        .await
    }

    pub async fn seat_map(&self, screening_id: Uuid) -> Value {
        let (status, body) = self
            .request(
                "GET",
                &format!("/api/screenings/{screening_id}/seats"),
                Some(&self.user_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "seat map: {body}");
        body
    }
}

/// Status of seat (row, col) in a seat map response
pub fn seat_status(map: &Value, row: u64, col: u64) -> &str {
    map["seats"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["row"].as_u64() == Some(row) && s["col"].as_u64() == Some(col))
        .and_then(|s| s["status"].as_str())
        .unwrap_or_else(|| panic!("seat ({row},{col}) missing from map"))
}
