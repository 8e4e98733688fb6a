use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::scope::Principal;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A login identity from the `users` table. Whether it acts as an organization
/// or an agent is decided by the row that references it, never by a flag here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal projection used by login only. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

/// NewUser
///
/// Everything the repository needs to insert a login identity. The password
/// has already been hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Organization
///
/// The tenant-owning account, joined with its user for display.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Organization {
    pub id: i64,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Agent
///
/// A staff account of exactly one organization, joined with its user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Agent {
    pub id: i64,
    pub organization_id: i64,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Lead
///
/// A prospective customer. `agent_id` and `category_id`, when set, point into
/// the same organization as the lead itself.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Lead {
    pub id: i64,
    pub organization_id: i64,
    pub agent_id: Option<i64>,
    pub category_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub description: String,
    pub phone_number: String,
    pub email: String,
    #[ts(type = "string")]
    pub date_added: DateTime<Utc>,
}

/// Category
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for POST /signup. Creates a user and the organization it owns.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 150, message = "Enter a username of at most 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must contain at least 8 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// CreateAgentRequest
///
/// Input payload for POST /agents/create. No password: the initial credential
/// is generated by the server and mailed to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 150, message = "Enter a username of at most 150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

/// UpdateAgentRequest
///
/// Partial update for PUT /agents/{id}/update. Omitted fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateAgentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
}

/// CreateLeadRequest
///
/// Input payload for POST /leads/create. There is deliberately no organization
/// field: the lead always lands in the creator's organization, and unknown
/// keys in the JSON body are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateLeadRequest {
    #[validate(length(min = 1, max = 20, message = "Enter a first name of at most 20 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 20, message = "Enter a last name of at most 20 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150."))]
    pub age: i32,
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 20, message = "Enter a phone number of at most 20 characters."))]
    pub phone_number: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

/// UpdateLeadRequest
///
/// Partial update for PUT /leads/{id}/update. An absent field is left as is;
/// `"agent_id": null` unassigns the lead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateLeadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20, message = "Enter a first name of at most 20 characters."))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20, message = "Enter a last name of at most 20 characters."))]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150."))]
    pub age: Option<i32>,

    /// `None` = unchanged, `Some(None)` = unassign, `Some(Some(id))` = assign.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_field",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    #[schema(value_type = Option<i64>)]
    pub agent_id: Option<Option<i64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20, message = "Enter a phone number of at most 20 characters."))]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
}

/// Deserializes a field that can be:
/// - absent (None) - leave unchanged
/// - null (Some(None)) - clear the value
/// - present (Some(Some(value))) - set to value
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// AssignAgentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignAgentRequest {
    pub agent_id: i64,
}

/// LeadCategoryUpdateRequest
///
/// `null` clears the lead's category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LeadCategoryUpdateRequest {
    pub category_id: Option<i64>,
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 30, message = "Enter a name of at most 30 characters."))]
    pub name: String,
}

// --- Output Schemas ---

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// MeResponse
///
/// The caller's identity and the principal it resolved to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub principal: Principal,
}

/// LeadListResponse
///
/// `unassigned_leads` is only present for organization principals.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LeadListResponse {
    pub leads: Vec<Lead>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_leads: Option<Vec<Lead>>,
}

/// CategoryListResponse
///
/// `unassigned_lead_count` counts the organization's leads without a category
/// and is only present for organization principals.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_lead_count: Option<i64>,
}

/// CategoryDetailResponse
///
/// A category and the leads in it that the caller is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryDetailResponse {
    pub category: Category,
    pub leads: Vec<Lead>,
}
