use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use validator::Validate;

use super::notify;
use crate::{
    AppState,
    auth::{AuthUser, OrgUser},
    error::AppError,
    mailer::MailMessage,
    models::{
        AssignAgentRequest, CreateLeadRequest, Lead, LeadCategoryUpdateRequest, LeadListResponse,
        UpdateLeadRequest,
    },
    scope::LeadScope,
};

/// Rejects an agent id that does not belong to the organization. Reported as a
/// field error, the same way an invalid form choice is.
async fn ensure_agent_in_org(state: &AppState, org_id: i64, agent_id: i64) -> Result<(), AppError> {
    match state.repo.get_agent(org_id, agent_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::invalid_field(
            "agent_id",
            "invalid_choice",
            "Select a valid agent.",
        )),
    }
}

/// list_leads
///
/// [Authenticated Route] Organizations receive their assigned leads plus the
/// unassigned ones in `unassigned_leads`; agents receive their own leads only.
#[utoipa::path(
    get,
    path = "/leads",
    responses(
        (status = 200, description = "Scoped lead list", body = LeadListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_leads(
    AuthUser { principal, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LeadListResponse>, AppError> {
    let listing = principal.lead_list();

    let leads = state.repo.list_leads(&listing.primary).await?;
    let unassigned_leads = match &listing.unassigned {
        Some(query) => Some(state.repo.list_leads(query).await?),
        None => None,
    };

    Ok(Json(LeadListResponse {
        leads,
        unassigned_leads,
    }))
}

/// get_lead
///
/// [Authenticated Route] A lead outside the caller's scope is reported as 404.
#[utoipa::path(
    get,
    path = "/leads/{id}",
    params(("id" = i64, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Found", body = Lead),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_lead(
    AuthUser { principal, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Lead>, AppError> {
    state
        .repo
        .get_lead(&principal.lead_scope(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Lead"))
}

/// update_lead_category
///
/// [Authenticated Route] Sets or clears the category of a lead. Open to the
/// organization and to the agent the lead is assigned to.
#[utoipa::path(
    put,
    path = "/leads/{id}/category",
    params(("id" = i64, Path, description = "Lead ID")),
    request_body = LeadCategoryUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = Lead),
        (status = 400, description = "Category not in the organization"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_lead_category(
    AuthUser { principal, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LeadCategoryUpdateRequest>,
) -> Result<Json<Lead>, AppError> {
    let scope = principal.lead_scope();

    if state.repo.get_lead(&scope, id).await?.is_none() {
        return Err(AppError::not_found("Lead"));
    }

    if let Some(category_id) = payload.category_id {
        if state
            .repo
            .get_category(principal.category_scope(), category_id)
            .await?
            .is_none()
        {
            return Err(AppError::invalid_field(
                "category_id",
                "invalid_choice",
                "Select a valid category.",
            ));
        }
    }

    state
        .repo
        .set_lead_category(&scope, id, payload.category_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Lead"))
}

/// create_lead
///
/// [Organization Route] The lead always belongs to the caller's organization.
/// A fixed notification goes out once the lead is stored.
#[utoipa::path(
    post,
    path = "/leads/create",
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not an organization")
    )
)]
pub async fn create_lead(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    payload.validate()?;
    if let Some(agent_id) = payload.agent_id {
        ensure_agent_in_org(&state, org_id, agent_id).await?;
    }

    let lead = state.repo.create_lead(org_id, payload).await?;
    info!(org_id, lead_id = lead.id, "lead created");

    notify(&state.mailer, MailMessage::lead_created(&state.config.mail)).await;

    Ok((StatusCode::CREATED, Json(lead)))
}

/// update_lead
///
/// [Organization Route] Partial update of any lead in the organization.
/// `"agent_id": null` returns the lead to the unassigned pool.
#[utoipa::path(
    put,
    path = "/leads/{id}/update",
    params(("id" = i64, Path, description = "Lead ID")),
    request_body = UpdateLeadRequest,
    responses(
        (status = 200, description = "Updated", body = Lead),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_lead(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, AppError> {
    payload.validate()?;
    if let Some(Some(agent_id)) = payload.agent_id {
        ensure_agent_in_org(&state, org_id, agent_id).await?;
    }

    state
        .repo
        .update_lead(&LeadScope::organization(org_id), id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Lead"))
}

/// delete_lead
///
/// [Organization Route]
#[utoipa::path(
    delete,
    path = "/leads/{id}/delete",
    params(("id" = i64, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_lead(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state
        .repo
        .delete_lead(&LeadScope::organization(org_id), id)
        .await?
    {
        info!(org_id, lead_id = id, "lead deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Lead"))
    }
}

/// assign_agent
///
/// [Organization Route] Hands a lead to one of the organization's agents.
/// Both the lead and the agent are looked up inside the caller's organization.
#[utoipa::path(
    put,
    path = "/leads/{id}/assign-agent",
    params(("id" = i64, Path, description = "Lead ID")),
    request_body = AssignAgentRequest,
    responses(
        (status = 200, description = "Assigned", body = Lead),
        (status = 400, description = "Agent not in the organization"),
        (status = 404, description = "Not found")
    )
)]
pub async fn assign_agent(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignAgentRequest>,
) -> Result<Json<Lead>, AppError> {
    let scope = LeadScope::organization(org_id);

    if state.repo.get_lead(&scope, id).await?.is_none() {
        return Err(AppError::not_found("Lead"));
    }
    ensure_agent_in_org(&state, org_id, payload.agent_id).await?;

    let lead = state
        .repo
        .assign_agent(&scope, id, payload.agent_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lead"))?;

    info!(org_id, lead_id = id, agent_id = payload.agent_id, "agent assigned");
    Ok(Json(lead))
}
