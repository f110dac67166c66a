//! API endpoints.

mod honking_versions;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new().nest("/honking-versions", honking_versions::router())
}
