use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod repository;
pub mod scope;

// Routers segregated by access gate (Public, Authenticated, Organization).
pub mod routes;
use auth::{auth_middleware, organization_middleware};
use routes::{authenticated, organization, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use mailer::{MailerState, MockMailer};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use scope::Principal;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::account::signup, handlers::account::login, handlers::account::get_me,
        handlers::leads::list_leads, handlers::leads::get_lead,
        handlers::leads::update_lead_category, handlers::leads::create_lead,
        handlers::leads::update_lead, handlers::leads::delete_lead,
        handlers::leads::assign_agent,
        handlers::agents::list_agents, handlers::agents::create_agent,
        handlers::agents::get_agent, handlers::agents::update_agent,
        handlers::agents::delete_agent,
        handlers::categories::list_categories, handlers::categories::get_category,
        handlers::categories::create_category
    ),
    components(
        schemas(
            models::User, models::Organization, models::Agent, models::Lead, models::Category,
            models::SignupRequest, models::LoginRequest, models::TokenResponse,
            models::MeResponse, Principal,
            models::CreateAgentRequest, models::UpdateAgentRequest,
            models::CreateLeadRequest, models::UpdateLeadRequest, models::AssignAgentRequest,
            models::LeadCategoryUpdateRequest, models::LeadListResponse,
            models::CreateCategoryRequest, models::CategoryListResponse,
            models::CategoryDetailResponse,
        )
    ),
    tags(
        (name = "crm-portal", description = "Multi-tenant CRM API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared application state: persistence, notifications and configuration.
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub mailer: MailerState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, their access gates, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // requireAuthenticated
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // guard(requireAuthenticated, requireRole(Organization)).
        // The layer added last runs first, so authentication precedes the role check.
        .merge(
            organization::organization_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    organization_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the request id, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
