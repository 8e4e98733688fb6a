use axum::{Json, extract::State, http::StatusCode};
use tracing::info;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, issue_token},
    credentials::{hash_password, reject_unknown_user, verify_password},
    error::AppError,
    models::{LoginRequest, MeResponse, NewUser, Organization, SignupRequest, TokenResponse},
};

/// signup
///
/// [Public Route] Creates a user and the organization it owns. The new account
/// starts with an empty tenant: no agents, leads or categories.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let organization = state
        .repo
        .create_organization(NewUser {
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash,
        })
        .await?;

    info!(org_id = organization.id, "organization signed up");
    Ok((StatusCode::CREATED, Json(organization)))
}

/// login
///
/// [Public Route] Exchanges a username and password for an access token.
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let Some(credentials) = state.repo.find_credentials(&payload.username).await? else {
        reject_unknown_user(&payload.password);
        return Err(AppError::Unauthorized);
    };

    if !verify_password(&payload.password, &credentials.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(credentials.id, &state.config)?;
    Ok(Json(token))
}

/// get_me
///
/// [Authenticated Route] The caller's user record and the role it resolved to.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    AuthUser { id, principal }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(MeResponse { user, principal }))
}
