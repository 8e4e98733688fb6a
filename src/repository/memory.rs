use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{
        Agent, Category, CreateLeadRequest, Lead, NewUser, Organization, UpdateAgentRequest,
        UpdateLeadRequest, User, UserCredentials,
    },
    scope::{LeadQuery, LeadScope, Principal},
};

struct StoredUser {
    user: User,
    password_hash: String,
}

struct StoredOrganization {
    id: i64,
    user_id: Uuid,
    created_at: chrono::DateTime<Utc>,
}

struct StoredAgent {
    id: i64,
    user_id: Uuid,
    organization_id: i64,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: Vec<StoredUser>,
    organizations: Vec<StoredOrganization>,
    agents: Vec<StoredAgent>,
    leads: Vec<Lead>,
    categories: Vec<Category>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: Uuid) -> Option<&StoredUser> {
        self.users.iter().find(|u| u.user.id == id)
    }

    fn insert_user(&mut self, new: NewUser) -> Result<Uuid, AppError> {
        if self.users.iter().any(|u| u.user.username == new.username) {
            return Err(AppError::Conflict("Resource already exists (duplicate entry)".to_string()));
        }
        let id = Uuid::new_v4();
        self.users.push(StoredUser {
            user: User {
                id,
                username: new.username,
                email: new.email,
                first_name: new.first_name,
                last_name: new.last_name,
                created_at: Utc::now(),
            },
            password_hash: new.password_hash,
        });
        Ok(id)
    }

    fn agent_view(&self, agent: &StoredAgent) -> Option<Agent> {
        let user = &self.user(agent.user_id)?.user;
        Some(Agent {
            id: agent.id,
            organization_id: agent.organization_id,
            user_id: agent.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: agent.created_at,
        })
    }

    fn scoped_agent(&self, org_id: i64, id: i64) -> Option<&StoredAgent> {
        self.agents
            .iter()
            .find(|a| a.id == id && a.organization_id == org_id)
    }

    fn scoped_lead_mut(&mut self, scope: &LeadScope, id: i64) -> Option<&mut Lead> {
        self.leads
            .iter_mut()
            .find(|l| l.id == id && scope.admits(l))
    }

    /// Mirrors the composite foreign keys: references must stay inside the lead's organization.
    fn check_references(
        &self,
        org_id: i64,
        agent_id: Option<i64>,
        category_id: Option<i64>,
    ) -> Result<(), AppError> {
        if let Some(agent_id) = agent_id {
            if self.scoped_agent(org_id, agent_id).is_none() {
                return Err(AppError::invalid_field(
                    "agent_id",
                    "foreign_key",
                    "Referenced record does not exist",
                ));
            }
        }
        if let Some(category_id) = category_id {
            if !self
                .categories
                .iter()
                .any(|c| c.id == category_id && c.organization_id == org_id)
            {
                return Err(AppError::invalid_field(
                    "category_id",
                    "foreign_key",
                    "Referenced record does not exist",
                ));
            }
        }
        Ok(())
    }
}

/// MemoryRepository
///
/// A `Repository` held entirely in process memory. Applies the same scope
/// predicates the Postgres queries are built from; used by the test suites.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn resolve_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError> {
        let store = self.store.lock().await;
        let org = store.organizations.iter().find(|o| o.user_id == user_id);
        let agent = store.agents.iter().find(|a| a.user_id == user_id);

        Ok(match (org, agent) {
            (Some(org), None) => Some(Principal::Organization { org_id: org.id }),
            (None, Some(agent)) => Some(Principal::Agent {
                agent_id: agent.id,
                org_id: agent.organization_id,
            }),
            _ => None,
        })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let store = self.store.lock().await;
        Ok(store.user(id).map(|u| u.user.clone()))
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .users
            .iter()
            .find(|u| u.user.username == username)
            .map(|u| UserCredentials {
                id: u.user.id,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn create_organization(&self, user: NewUser) -> Result<Organization, AppError> {
        let mut store = self.store.lock().await;
        let user_id = store.insert_user(user)?;
        let id = store.next_id();
        let created_at = Utc::now();
        store.organizations.push(StoredOrganization {
            id,
            user_id,
            created_at,
        });

        let user = &store
            .user(user_id)
            .ok_or_else(|| AppError::Internal("inserted user vanished".to_string()))?
            .user;
        Ok(Organization {
            id,
            user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at,
        })
    }

    async fn list_agents(&self, org_id: i64) -> Result<Vec<Agent>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .agents
            .iter()
            .filter(|a| a.organization_id == org_id)
            .filter_map(|a| store.agent_view(a))
            .collect())
    }

    async fn get_agent(&self, org_id: i64, id: i64) -> Result<Option<Agent>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .scoped_agent(org_id, id)
            .and_then(|a| store.agent_view(a)))
    }

    async fn create_agent(&self, org_id: i64, user: NewUser) -> Result<Agent, AppError> {
        let mut store = self.store.lock().await;
        if !store.organizations.iter().any(|o| o.id == org_id) {
            return Err(AppError::invalid_field(
                "organization_id",
                "foreign_key",
                "Referenced record does not exist",
            ));
        }
        let user_id = store.insert_user(user)?;
        let id = store.next_id();
        let agent = StoredAgent {
            id,
            user_id,
            organization_id: org_id,
            created_at: Utc::now(),
        };
        let view = store
            .agent_view(&agent)
            .ok_or_else(|| AppError::Internal("inserted user vanished".to_string()))?;
        store.agents.push(agent);
        Ok(view)
    }

    async fn update_agent(
        &self,
        org_id: i64,
        id: i64,
        req: UpdateAgentRequest,
    ) -> Result<Option<Agent>, AppError> {
        let mut store = self.store.lock().await;
        let Some(user_id) = store.scoped_agent(org_id, id).map(|a| a.user_id) else {
            return Ok(None);
        };

        if let Some(username) = &req.username {
            if store
                .users
                .iter()
                .any(|u| u.user.id != user_id && &u.user.username == username)
            {
                return Err(AppError::Conflict("Resource already exists (duplicate entry)".to_string()));
            }
        }

        if let Some(stored) = store.users.iter_mut().find(|u| u.user.id == user_id) {
            let user = &mut stored.user;
            if let Some(username) = req.username {
                user.username = username;
            }
            if let Some(email) = req.email {
                user.email = email;
            }
            if let Some(first_name) = req.first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = req.last_name {
                user.last_name = last_name;
            }
        }

        Ok(store
            .scoped_agent(org_id, id)
            .and_then(|a| store.agent_view(a)))
    }

    async fn delete_agent(&self, org_id: i64, id: i64) -> Result<bool, AppError> {
        let mut store = self.store.lock().await;
        let Some(user_id) = store.scoped_agent(org_id, id).map(|a| a.user_id) else {
            return Ok(false);
        };

        store.agents.retain(|a| a.id != id);
        store.users.retain(|u| u.user.id != user_id);
        for lead in store.leads.iter_mut().filter(|l| l.agent_id == Some(id)) {
            lead.agent_id = None;
        }
        Ok(true)
    }

    async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let store = self.store.lock().await;
        let mut leads: Vec<Lead> = store
            .leads
            .iter()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();
        leads.sort_by_key(|l| l.id);
        Ok(leads)
    }

    async fn get_lead(&self, scope: &LeadScope, id: i64) -> Result<Option<Lead>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .leads
            .iter()
            .find(|l| l.id == id && scope.admits(l))
            .cloned())
    }

    async fn create_lead(&self, org_id: i64, req: CreateLeadRequest) -> Result<Lead, AppError> {
        let mut store = self.store.lock().await;
        store.check_references(org_id, req.agent_id, None)?;

        let lead = Lead {
            id: store.next_id(),
            organization_id: org_id,
            agent_id: req.agent_id,
            category_id: None,
            first_name: req.first_name,
            last_name: req.last_name,
            age: req.age,
            description: req.description,
            phone_number: req.phone_number,
            email: req.email,
            date_added: Utc::now(),
        };
        store.leads.push(lead.clone());
        Ok(lead)
    }

    async fn update_lead(
        &self,
        scope: &LeadScope,
        id: i64,
        req: UpdateLeadRequest,
    ) -> Result<Option<Lead>, AppError> {
        let mut store = self.store.lock().await;
        store.check_references(scope.org_id, req.agent_id.flatten(), None)?;

        let Some(lead) = store.scoped_lead_mut(scope, id) else {
            return Ok(None);
        };
        if let Some(first_name) = req.first_name {
            lead.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            lead.last_name = last_name;
        }
        if let Some(age) = req.age {
            lead.age = age;
        }
        if let Some(agent_id) = req.agent_id {
            lead.agent_id = agent_id;
        }
        if let Some(description) = req.description {
            lead.description = description;
        }
        if let Some(phone_number) = req.phone_number {
            lead.phone_number = phone_number;
        }
        if let Some(email) = req.email {
            lead.email = email;
        }
        Ok(Some(lead.clone()))
    }

    async fn delete_lead(&self, scope: &LeadScope, id: i64) -> Result<bool, AppError> {
        let mut store = self.store.lock().await;
        let before = store.leads.len();
        store.leads.retain(|l| !(l.id == id && scope.admits(l)));
        Ok(store.leads.len() < before)
    }

    async fn assign_agent(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        agent_id: i64,
    ) -> Result<Option<Lead>, AppError> {
        let mut store = self.store.lock().await;
        store.check_references(scope.org_id, Some(agent_id), None)?;

        Ok(store.scoped_lead_mut(scope, lead_id).map(|lead| {
            lead.agent_id = Some(agent_id);
            lead.clone()
        }))
    }

    async fn set_lead_category(
        &self,
        scope: &LeadScope,
        lead_id: i64,
        category_id: Option<i64>,
    ) -> Result<Option<Lead>, AppError> {
        let mut store = self.store.lock().await;
        store.check_references(scope.org_id, None, category_id)?;

        Ok(store.scoped_lead_mut(scope, lead_id).map(|lead| {
            lead.category_id = category_id;
            lead.clone()
        }))
    }

    async fn list_categories(&self, org_id: i64) -> Result<Vec<Category>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .categories
            .iter()
            .filter(|c| c.organization_id == org_id)
            .cloned()
            .collect())
    }

    async fn get_category(&self, org_id: i64, id: i64) -> Result<Option<Category>, AppError> {
        let store = self.store.lock().await;
        Ok(store
            .categories
            .iter()
            .find(|c| c.id == id && c.organization_id == org_id)
            .cloned())
    }

    async fn create_category(&self, org_id: i64, name: String) -> Result<Category, AppError> {
        let mut store = self.store.lock().await;
        if store
            .categories
            .iter()
            .any(|c| c.organization_id == org_id && c.name == name)
        {
            return Err(AppError::Conflict("Resource already exists (duplicate entry)".to_string()));
        }
        let category = Category {
            id: store.next_id(),
            organization_id: org_id,
            name,
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn count_uncategorized_leads(&self, org_id: i64) -> Result<i64, AppError> {
        let store = self.store.lock().await;
        let count = store
            .leads
            .iter()
            .filter(|l| l.organization_id == org_id && l.category_id.is_none())
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "hash".to_string(),
        }
    }

    fn lead_request(agent_id: Option<i64>) -> CreateLeadRequest {
        CreateLeadRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            agent_id,
            phone_number: "555-0100".to_string(),
            email: "ada@example.com".to_string(),
            ..CreateLeadRequest::default()
        }
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let repo = MemoryRepository::new();
        repo.create_organization(new_user("acme")).await.unwrap();
        let err = repo.create_organization(new_user("acme")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn lead_cannot_reference_another_tenants_agent() {
        let repo = MemoryRepository::new();
        let acme = repo.create_organization(new_user("acme")).await.unwrap();
        let globex = repo.create_organization(new_user("globex")).await.unwrap();
        let globex_agent = repo.create_agent(globex.id, new_user("hank")).await.unwrap();

        let err = repo
            .create_lead(acme.id, lead_request(Some(globex_agent.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn deleting_an_agent_unassigns_its_leads_and_drops_its_login() {
        let repo = MemoryRepository::new();
        let acme = repo.create_organization(new_user("acme")).await.unwrap();
        let agent = repo.create_agent(acme.id, new_user("jim")).await.unwrap();
        let lead = repo.create_lead(acme.id, lead_request(Some(agent.id))).await.unwrap();

        assert!(repo.delete_agent(acme.id, agent.id).await.unwrap());

        let scope = LeadScope::organization(acme.id);
        let lead = repo.get_lead(&scope, lead.id).await.unwrap().unwrap();
        assert_eq!(lead.agent_id, None);
        assert!(repo.resolve_principal(agent.user_id).await.unwrap().is_none());
        assert!(repo.find_credentials("jim").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn agent_deletion_is_scoped_to_the_organization() {
        let repo = MemoryRepository::new();
        let acme = repo.create_organization(new_user("acme")).await.unwrap();
        let globex = repo.create_organization(new_user("globex")).await.unwrap();
        let agent = repo.create_agent(acme.id, new_user("jim")).await.unwrap();

        assert!(!repo.delete_agent(globex.id, agent.id).await.unwrap());
        assert!(repo.get_agent(acme.id, agent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn explicit_null_agent_unassigns_on_update() {
        let repo = MemoryRepository::new();
        let acme = repo.create_organization(new_user("acme")).await.unwrap();
        let agent = repo.create_agent(acme.id, new_user("jim")).await.unwrap();
        let lead = repo.create_lead(acme.id, lead_request(Some(agent.id))).await.unwrap();
        let scope = LeadScope::organization(acme.id);

        let untouched = repo
            .update_lead(&scope, lead.id, UpdateLeadRequest::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.agent_id, Some(agent.id));

        let cleared = UpdateLeadRequest {
            agent_id: Some(None),
            ..UpdateLeadRequest::default()
        };
        let lead = repo.update_lead(&scope, lead.id, cleared).await.unwrap().unwrap();
        assert_eq!(lead.agent_id, None);
    }
}
