//! REST handlers for the marketplace: auth, listings, conversations,
//! messages and profile.

pub mod auth;
pub mod conversations;
pub mod error;
pub mod listings;
pub mod messages;
pub mod middleware;
pub mod profile;
pub mod router;
mod views;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use router::build_router;
