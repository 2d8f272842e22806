//! HTTP API for the planner.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use extract::StrictJson;
pub use routes::create_router;
