use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, info};
use validator::Validate;

use crate::{
    AppState,
    auth::OrgUser,
    credentials::{generate_agent_secret, hash_password},
    error::AppError,
    mailer::MailMessage,
    models::{Agent, CreateAgentRequest, NewUser, UpdateAgentRequest},
};

/// list_agents
///
/// [Organization Route] The caller's agents, ordered by id.
#[utoipa::path(
    get,
    path = "/agents",
    responses(
        (status = 200, description = "Agents of the organization", body = [Agent]),
        (status = 403, description = "Not an organization")
    )
)]
pub async fn list_agents(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Agent>>, AppError> {
    Ok(Json(state.repo.list_agents(org_id).await?))
}

/// create_agent
///
/// [Organization Route] Creates the agent's login with a generated secret and
/// mails the secret to the agent. Agents cannot sign up on their own.
///
/// The secret exists only in the invitation, so an undelivered invitation
/// removes the agent again and fails with 502.
#[utoipa::path(
    post,
    path = "/agents/create",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Agent created", body = Agent),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username taken"),
        (status = 502, description = "Invitation could not be delivered")
    )
)]
pub async fn create_agent(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    payload.validate()?;

    let secret = generate_agent_secret();
    let password_hash = hash_password(&secret)?;

    let agent = state
        .repo
        .create_agent(
            org_id,
            NewUser {
                username: payload.username,
                email: payload.email,
                first_name: payload.first_name,
                last_name: payload.last_name,
                password_hash,
            },
        )
        .await?;
    info!(org_id, agent_id = agent.id, "agent created");

    let invitation = MailMessage::agent_invitation(&state.config.mail, &agent, &secret);
    if let Err(e) = state.mailer.send(&invitation).await {
        error!(org_id, agent_id = agent.id, "invitation failed, removing agent: {e}");
        state.repo.delete_agent(org_id, agent.id).await?;
        return Err(e);
    }
    info!(org_id, agent_id = agent.id, to = ?invitation.recipients, "invitation sent");

    Ok((StatusCode::CREATED, Json(agent)))
}

/// get_agent
///
/// [Organization Route]
#[utoipa::path(
    get,
    path = "/agents/{id}",
    params(("id" = i64, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Found", body = Agent),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_agent(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Agent>, AppError> {
    state
        .repo
        .get_agent(org_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Agent"))
}

/// update_agent
///
/// [Organization Route] Partial update of the agent's user details.
#[utoipa::path(
    put,
    path = "/agents/{id}/update",
    params(("id" = i64, Path, description = "Agent ID")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "Updated", body = Agent),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_agent(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAgentRequest>,
) -> Result<Json<Agent>, AppError> {
    payload.validate()?;

    state
        .repo
        .update_agent(org_id, id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Agent"))
}

/// delete_agent
///
/// [Organization Route] Removes the agent and its login. Its leads stay in the
/// organization, unassigned.
#[utoipa::path(
    delete,
    path = "/agents/{id}/delete",
    params(("id" = i64, Path, description = "Agent ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_agent(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_agent(org_id, id).await? {
        info!(org_id, agent_id = id, "agent deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Agent"))
    }
}
