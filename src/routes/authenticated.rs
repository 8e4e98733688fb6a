use crate::{
    AppState,
    handlers::{account, categories, leads},
};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Routes shared by both roles. What each caller sees is decided by its
/// principal: an agent reaches only the leads assigned to it.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(account::get_me))
        // --- Leads ---
        // GET /leads
        // Organizations also receive the unassigned collection.
        .route("/leads", get(leads::list_leads))
        .route("/leads/{id}", get(leads::get_lead))
        // PUT /leads/{id}/category
        // The only lead mutation an agent may perform.
        .route("/leads/{id}/category", put(leads::update_lead_category))
        // --- Categories ---
        .route("/categories", get(categories::list_categories))
        .route("/categories/{id}", get(categories::get_category))
}
