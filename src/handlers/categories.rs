use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OrgUser},
    error::AppError,
    models::{Category, CategoryDetailResponse, CategoryListResponse, CreateCategoryRequest},
};

/// list_categories
///
/// [Authenticated Route] Categories are visible to the whole organization.
/// Organizations additionally get the number of leads without a category.
#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "Categories of the organization", body = CategoryListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_categories(
    AuthUser { principal, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, AppError> {
    let org_id = principal.category_scope();
    let categories = state.repo.list_categories(org_id).await?;

    let unassigned_lead_count = if principal.counts_uncategorized() {
        Some(state.repo.count_uncategorized_leads(org_id).await?)
    } else {
        None
    };

    Ok(Json(CategoryListResponse {
        categories,
        unassigned_lead_count,
    }))
}

/// get_category
///
/// [Authenticated Route] The category and those of its leads the caller may see.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = CategoryDetailResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_category(
    AuthUser { principal, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CategoryDetailResponse>, AppError> {
    let category = state
        .repo
        .get_category(principal.category_scope(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let leads = state.repo.list_leads(&principal.category_leads(id)).await?;

    Ok(Json(CategoryDetailResponse { category, leads }))
}

/// create_category
///
/// [Organization Route] Names are unique within an organization.
#[utoipa::path(
    post,
    path = "/categories/create",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn create_category(
    OrgUser { org_id, .. }: OrgUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    payload.validate()?;

    let category = state.repo.create_category(org_id, payload.name).await?;
    info!(org_id, category_id = category.id, "category created");

    Ok((StatusCode::CREATED, Json(category)))
}
