use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Agent, Category, CreateLeadRequest, Lead, NewUser, Organization, UpdateAgentRequest,
        UpdateLeadRequest, User, UserCredentials,
    },
    scope::{LeadQuery, LeadScope, Principal},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// The persistence contract. Every lead, agent and category method takes its
/// scope as an explicit argument; a record outside the scope behaves exactly
/// like a missing one (`None`, `false` or absent from the list).
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    // Resolves a user to its organization or agent role. `None` for unknown
    // users and for users that are neither.
    async fn resolve_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, AppError>;
    // Inserts the user and its organization together.
    async fn create_organization(&self, user: NewUser) -> Result<Organization, AppError>;

    // --- Agents (organization scope) ---
    async fn list_agents(&self, org_id: i64) -> Result<Vec<Agent>, AppError>;
    async fn get_agent(&self, org_id: i64, id: i64) -> Result<Option<Agent>, AppError>;
    // Inserts the user and its agent row together.
    async fn create_agent(&self, org_id: i64, user: NewUser) -> Result<Agent, AppError>;
    async fn update_agent(
        &self,
        org_id: i64,
        id: i64,
        req: UpdateAgentRequest,
    ) -> Result<Option<Agent>, AppError>;
    // Removes the agent together with its login; its leads become unassigned.
    async fn delete_agent(&self, org_id: i64, id: i64) -> Result<bool, AppError>;

    // --- Leads ---
    async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError>;
    async fn get_lead(&self, scope: &LeadScope, id: i64) -> Result<Option<Lead>, AppError>;
    // The organization always comes from the caller, never from the payload.
    async fn create_lead(&self, org_id: i64, req: CreateLeadRequest) -> Result<Lead, AppError>;
    async fn update_lead(
        &self,
        scope: &LeadScope,
        id: i64,
        req: UpdateLeadRequest,
    ) -> Result<Option<Lead>, AppError>;
    async fn delete_lead(&self, scope: &LeadScope, id: i64) -> Result<bool, AppError>;
    // Single-statement write: concurrent assignments resolve as last write wins.
    async fn assign_agent(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        agent_id: i64,
    ) -> Result<Option<Lead>, AppError>;
    async fn set_lead_category(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        category_id: Option<i64>,
    ) -> Result<Option<Lead>, AppError>;

    // --- Categories (organization scope) ---
    async fn list_categories(&self, org_id: i64) -> Result<Vec<Category>, AppError>;
    async fn get_category(&self, org_id: i64, id: i64) -> Result<Option<Category>, AppError>;
    async fn create_category(&self, org_id: i64, name: String) -> Result<Category, AppError>;
    async fn count_uncategorized_leads(&self, org_id: i64) -> Result<i64, AppError>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;
