//! Health check endpoints
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use kabinet_link::health::liveness;
//!
//! let app: Router = Router::new().route("/health/live", get(liveness));
//! ```

use axum::{http::StatusCode, response::IntoResponse};

/// Liveness probe handler
///
/// Returns 200 OK while the process is serving requests. Upstream servers are
/// not contacted.
#[allow(clippy::unused_async)]
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
