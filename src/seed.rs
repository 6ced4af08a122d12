use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use crate::screening::{NewScreening, SeatRegistry};

/// Inserts demo screenings on first run, when the registry is empty.
/// Rerunning against a populated registry is a no-op.
#[instrument(skip(registry))]
pub fn run(registry: &SeatRegistry) {
    if !registry.list_screenings().is_empty() {
        return;
    }

    info!("First run, inserting seed screenings");

    let now = Utc::now();
    let screenings = [
        ("mv-001", "The Matrix", 24, 5, 8),
        ("mv-002", "Inception", 48, 6, 10),
        ("mv-003", "Interstellar", 72, 5, 8),
    ];

    for (movie_id, movie_name, hours, rows, cols) in screenings {
        match registry.create_screening(NewScreening {
            movie_id: movie_id.to_string(),
            movie_name: movie_name.to_string(),
            screen_at: now + Duration::hours(hours),
            rows,
            cols,
        }) {
            Ok(screening) => {
                info!(screening_id = %screening.id, movie_name, "Seed screening created")
            }
            Err(e) => warn!(movie_name, error = %e, "Seed screening failed"),
        }
    }
}
