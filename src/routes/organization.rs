use crate::{
    AppState,
    handlers::{agents, categories, leads},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Organization Router Module
///
/// Management routes for the tenant owner. Agents are turned away with 403 by
/// `organization_middleware` before any handler runs.
pub fn organization_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Leads ---
        // POST /leads/create
        // Sends the lead notification after the insert.
        .route("/leads/create", post(leads::create_lead))
        .route("/leads/{id}/update", put(leads::update_lead))
        .route("/leads/{id}/delete", delete(leads::delete_lead))
        // PUT /leads/{id}/assign-agent
        // The agent must belong to the caller's organization.
        .route("/leads/{id}/assign-agent", put(leads::assign_agent))
        // --- Agents ---
        .route("/agents", get(agents::list_agents))
        // POST /agents/create
        // Generates the agent's secret and mails the invitation.
        .route("/agents/create", post(agents::create_agent))
        .route("/agents/{id}", get(agents::get_agent))
        .route("/agents/{id}/update", put(agents::update_agent))
        .route("/agents/{id}/delete", delete(agents::delete_agent))
        // --- Categories ---
        .route("/categories/create", post(categories::create_category))
}
