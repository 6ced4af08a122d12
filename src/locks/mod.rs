pub mod expiry;
pub mod manager;

pub use expiry::{start_expiry_task, ExpiryConfig};
pub use manager::{Lock, LockId, LockManager};
