pub mod audit;
pub mod auth;
pub mod booking;
pub mod broadcast;
pub mod config;
pub mod locks;
pub mod routes;
pub mod screening;
pub mod seed;
pub mod shared;

pub use config::Config;
pub use routes::build_router;
pub use shared::{AppError, AppState};
