pub mod middleware;
pub mod token;

pub use middleware::{admin_only, bearer_auth};
pub use token::{AuthClaims, Role, TokenConfig};
