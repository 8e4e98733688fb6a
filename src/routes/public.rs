use crate::{AppState, handlers::account};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: liveness, organization signup and
/// the token exchange.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /signup
        // Creates a user together with the organization it owns.
        .route("/signup", post(account::signup))
        // POST /login
        .route("/login", post(account::login))
}
