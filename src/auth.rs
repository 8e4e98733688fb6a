use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::TokenResponse,
    repository::RepositoryState,
    scope::Principal,
};

/// Claims
///
/// Payload of the HS256 access token issued by `POST /login` and `POST /signup`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user.
    pub sub: Uuid,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: the user and the role
/// it acts in. Handlers derive every scope from `principal`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub principal: Principal,
}

/// AuthUser Extractor Implementation
///
/// The entire process involves:
/// 1. Reuse: an identity already resolved by `auth_middleware` is taken from
///    the request extensions.
/// 2. Local Bypass: in `Env::Local` the `x-user-id` header names the user.
/// 3. Token Validation: `Authorization: Bearer <jwt>`, signature and expiry.
/// 4. Role Resolution: the repository maps the user to exactly one principal.
///    A user that is neither an organization nor an agent is rejected, as is a
///    user deleted after the token was issued.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let header_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());

            if let Some(user_id) = header_id {
                if let Some(principal) = repo.resolve_principal(user_id).await? {
                    return Ok(AuthUser {
                        id: user_id,
                        principal,
                    });
                }
            }
            // Unknown header user: fall through to the token check.
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let user_id = decode_token(token, &config)?;

        let principal = repo
            .resolve_principal(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: user_id,
            principal,
        })
    }
}

/// OrgUser Extractor
///
/// An authenticated caller acting as an organization. Agents are rejected
/// with 403 before any data is read.
#[derive(Debug, Clone, Copy)]
pub struct OrgUser {
    pub id: Uuid,
    pub org_id: i64,
}

impl<S> FromRequestParts<S> for OrgUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        match user.principal {
            Principal::Organization { org_id } => Ok(OrgUser {
                id: user.id,
                org_id,
            }),
            Principal::Agent { .. } => Err(AppError::Forbidden(
                "This action requires an organization account".to_string(),
            )),
        }
    }
}

/// auth_middleware
///
/// requireAuthenticated. Rejects the request with 401 unless `AuthUser`
/// resolves, then caches the identity in the request extensions for the
/// extractors further down.
pub async fn auth_middleware(user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// organization_middleware
///
/// requireRole(Organization). Must sit inside `auth_middleware`.
pub async fn organization_middleware(_org: OrgUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Signs an access token for the user, valid for `token_ttl_seconds`.
pub fn issue_token(user_id: Uuid, config: &AppConfig) -> Result<TokenResponse, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + config.token_ttl_seconds) as usize,
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.token_ttl_seconds,
    })
}

/// Validates signature and expiry and returns the token's subject.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Uuid, AppError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.sub)
    .map_err(|e| {
        tracing::debug!("rejected access token: {:?}", e.kind());
        AppError::Unauthorized
    })
}
