//! HTTP API layer for honk-rs.
//!
//! - **Endpoints**: honking version reads and vote mutations
//! - **Extractors**: bearer-token authentication
//! - **Middleware**: application state, token resolution
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
