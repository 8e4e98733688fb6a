use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{
        Agent, Category, CreateLeadRequest, Lead, NewUser, Organization, UpdateAgentRequest,
        UpdateLeadRequest, User, UserCredentials,
    },
    scope::{Assignment, LeadQuery, LeadScope, Principal},
};

const LEAD_COLUMNS: &str = "id, organization_id, agent_id, category_id, first_name, last_name, \
                            age, description, phone_number, email, date_added";

const AGENT_SELECT: &str = "SELECT a.id, a.organization_id, a.user_id, u.username, u.email, \
                            u.first_name, u.last_name, a.created_at \
                            FROM agents a JOIN users u ON u.id = a.user_id";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape of the principal lookup: at most one of the two ids is set.
#[derive(FromRow)]
struct PrincipalRow {
    organization_id: Option<i64>,
    agent_id: Option<i64>,
    agent_organization_id: Option<i64>,
}

impl PrincipalRow {
    fn into_principal(self) -> Option<Principal> {
        match (self.organization_id, self.agent_id, self.agent_organization_id) {
            (Some(org_id), None, _) => Some(Principal::Organization { org_id }),
            (None, Some(agent_id), Some(org_id)) => Some(Principal::Agent { agent_id, org_id }),
            _ => None,
        }
    }
}

/// Appends the scope restriction to a lead query whose WHERE clause is already open.
fn push_lead_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: &LeadScope) {
    builder.push(" AND organization_id = ");
    builder.push_bind(scope.org_id);
    if let Some(agent_id) = scope.agent_id {
        builder.push(" AND agent_id = ");
        builder.push_bind(agent_id);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn resolve_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT o.id AS organization_id, a.id AS agent_id, a.organization_id AS agent_organization_id
            FROM users u
            LEFT JOIN organizations o ON o.user_id = u.id
            LEFT JOIN agents a ON a.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(PrincipalRow::into_principal))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, AppError> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(creds)
    }

    /// create_organization
    ///
    /// Inserts the user and the organization in one transaction so a signup never
    /// leaves a user without a role.
    async fn create_organization(&self, user: NewUser) -> Result<Organization, AppError> {
        let mut tx = self.pool.begin().await?;
        let user_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, username, email, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .execute(&mut *tx)
        .await?;

        let org = sqlx::query_as::<_, Organization>(
            r#"
            WITH inserted AS (
                INSERT INTO organizations (user_id) VALUES ($1) RETURNING id, user_id, created_at
            )
            SELECT i.id, i.user_id, u.username, u.email, i.created_at
            FROM inserted i JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(org)
    }

    // --- AGENTS ---

    async fn list_agents(&self, org_id: i64) -> Result<Vec<Agent>, AppError> {
        let agents = sqlx::query_as::<_, Agent>(&format!(
            "{AGENT_SELECT} WHERE a.organization_id = $1 ORDER BY a.id"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(agents)
    }

    async fn get_agent(&self, org_id: i64, id: i64) -> Result<Option<Agent>, AppError> {
        let agent = sqlx::query_as::<_, Agent>(&format!(
            "{AGENT_SELECT} WHERE a.id = $1 AND a.organization_id = $2"
        ))
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    /// create_agent
    ///
    /// Inserts the agent's login and the agent row in one transaction.
    async fn create_agent(&self, org_id: i64, user: NewUser) -> Result<Agent, AppError> {
        let mut tx = self.pool.begin().await?;
        let user_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, username, email, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .execute(&mut *tx)
        .await?;

        let agent = sqlx::query_as::<_, Agent>(
            r#"
            WITH inserted AS (
                INSERT INTO agents (user_id, organization_id) VALUES ($1, $2)
                RETURNING id, organization_id, user_id, created_at
            )
            SELECT i.id, i.organization_id, i.user_id, u.username, u.email,
                   u.first_name, u.last_name, i.created_at
            FROM inserted i JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(agent)
    }

    /// update_agent
    ///
    /// Updates the agent's user record only if the agent belongs to `org_id`.
    /// COALESCE keeps columns whose field was omitted.
    async fn update_agent(
        &self,
        org_id: i64,
        id: i64,
        req: UpdateAgentRequest,
    ) -> Result<Option<Agent>, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($3, username),
                email = COALESCE($4, email),
                first_name = COALESCE($5, first_name),
                last_name = COALESCE($6, last_name)
            WHERE id = (SELECT user_id FROM agents WHERE id = $1 AND organization_id = $2)
            "#,
        )
        .bind(id)
        .bind(org_id)
        .bind(req.username)
        .bind(req.email)
        .bind(req.first_name)
        .bind(req.last_name)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_agent(org_id, id).await
    }

    async fn delete_agent(&self, org_id: i64, id: i64) -> Result<bool, AppError> {
        // Cascades to the agent row; leads keep their organization and lose the agent.
        let res = sqlx::query(
            "DELETE FROM users WHERE id = (SELECT user_id FROM agents WHERE id = $1 AND organization_id = $2)",
        )
        .bind(id)
        .bind(org_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- LEADS ---

    /// list_leads
    ///
    /// Renders the scoped query with QueryBuilder so every value is a bound parameter.
    async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LEAD_COLUMNS} FROM leads WHERE TRUE"));

        push_lead_scope(&mut builder, &query.scope);

        match query.assignment {
            Assignment::Any => {}
            Assignment::Assigned => {
                builder.push(" AND agent_id IS NOT NULL");
            }
            Assignment::Unassigned => {
                builder.push(" AND agent_id IS NULL");
            }
        }

        if let Some(category_id) = query.category {
            builder.push(" AND category_id = ");
            builder.push_bind(category_id);
        }

        builder.push(" ORDER BY id");

        let leads = builder.build_query_as::<Lead>().fetch_all(&self.pool).await?;
        Ok(leads)
    }

    async fn get_lead(&self, scope: &LeadScope, id: i64) -> Result<Option<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = "));
        builder.push_bind(id);
        push_lead_scope(&mut builder, scope);

        let lead = builder
            .build_query_as::<Lead>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn create_lead(&self, org_id: i64, req: CreateLeadRequest) -> Result<Lead, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "INSERT INTO leads (organization_id, agent_id, first_name, last_name, age, description, phone_number, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {LEAD_COLUMNS}"
        ))
        .bind(org_id)
        .bind(req.agent_id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.age)
        .bind(req.description)
        .bind(req.phone_number)
        .bind(req.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(lead)
    }

    /// update_lead
    ///
    /// Partial update restricted to `scope`. COALESCE keeps omitted fields.
    async fn update_lead(
        &self,
        scope: &LeadScope,
        id: i64,
        req: UpdateLeadRequest,
    ) -> Result<Option<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE leads SET first_name = COALESCE(");
        builder.push_bind(req.first_name);
        builder.push(", first_name), last_name = COALESCE(");
        builder.push_bind(req.last_name);
        builder.push(", last_name), age = COALESCE(");
        builder.push_bind(req.age);
        builder.push(", age), description = COALESCE(");
        builder.push_bind(req.description);
        builder.push(", description), phone_number = COALESCE(");
        builder.push_bind(req.phone_number);
        builder.push(", phone_number), email = COALESCE(");
        builder.push_bind(req.email);
        builder.push(", email)");
        // Present agent_id is written as is, so an explicit null unassigns.
        if let Some(agent_id) = req.agent_id {
            builder.push(", agent_id = ");
            builder.push_bind(agent_id);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        push_lead_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {LEAD_COLUMNS}"));

        let lead = builder
            .build_query_as::<Lead>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn delete_lead(&self, scope: &LeadScope, id: i64) -> Result<bool, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("DELETE FROM leads WHERE id = ");
        builder.push_bind(id);
        push_lead_scope(&mut builder, scope);

        let res = builder.build().execute(&self.pool).await?;
        Ok(res.rows_affected() > 0)
    }

    async fn assign_agent(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        agent_id: i64,
    ) -> Result<Option<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE leads SET agent_id = ");
        builder.push_bind(agent_id);
        builder.push(" WHERE id = ");
        builder.push_bind(lead_id);
        push_lead_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {LEAD_COLUMNS}"));

        let lead = builder
            .build_query_as::<Lead>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    async fn set_lead_category(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        category_id: Option<i64>,
    ) -> Result<Option<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE leads SET category_id = ");
        builder.push_bind(category_id);
        builder.push(" WHERE id = ");
        builder.push_bind(lead_id);
        push_lead_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {LEAD_COLUMNS}"));

        let lead = builder
            .build_query_as::<Lead>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self, org_id: i64) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, organization_id, name FROM categories WHERE organization_id = $1 ORDER BY id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, org_id: i64, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, organization_id, name FROM categories WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, org_id: i64, name: String) -> Result<Category, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (organization_id, name) VALUES ($1, $2) RETURNING id, organization_id, name",
        )
        .bind(org_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn count_uncategorized_leads(&self, org_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM leads WHERE organization_id = $1 AND category_id IS NULL",
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(org: Option<i64>, agent: Option<i64>, agent_org: Option<i64>) -> PrincipalRow {
        PrincipalRow {
            organization_id: org,
            agent_id: agent,
            agent_organization_id: agent_org,
        }
    }

    #[test]
    fn principal_row_maps_to_exactly_one_role() {
        assert_eq!(
            row(Some(3), None, None).into_principal(),
            Some(Principal::Organization { org_id: 3 })
        );
        assert_eq!(
            row(None, Some(9), Some(3)).into_principal(),
            Some(Principal::Agent { agent_id: 9, org_id: 3 })
        );
        assert_eq!(row(None, None, None).into_principal(), None);
        // A user referenced by both tables is treated as having no usable role.
        assert_eq!(row(Some(3), Some(9), Some(3)).into_principal(), None);
    }

    #[test]
    fn agent_scope_renders_both_filters() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM leads WHERE TRUE");
        push_lead_scope(&mut builder, &LeadScope { org_id: 1, agent_id: Some(2) });
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM leads WHERE TRUE AND organization_id = $1 AND agent_id = $2"
        );
    }

    #[test]
    fn organization_scope_renders_only_the_tenant_filter() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM leads WHERE TRUE");
        push_lead_scope(&mut builder, &LeadScope::organization(1));
        assert_eq!(builder.sql(), "SELECT 1 FROM leads WHERE TRUE AND organization_id = $1");
    }
}
