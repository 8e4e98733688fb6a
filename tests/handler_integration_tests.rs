use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use crm_portal::{
    AppState, MemoryRepository, MockMailer, Principal,
    auth::{AuthUser, OrgUser},
    config::AppConfig,
    error::AppError,
    handlers::{account, agents, categories, leads},
    mailer::MailerState,
    models::{
        AssignAgentRequest, CreateAgentRequest, CreateCategoryRequest, CreateLeadRequest,
        LeadCategoryUpdateRequest, NewUser, SignupRequest, UpdateAgentRequest,
    },
    repository::{Repository, RepositoryState},
};
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;

// --- FIXTURES ---

struct Fixture {
    state: AppState,
    repo: Arc<MemoryRepository>,
    mailer: Arc<MockMailer>,
}

fn fixture_with(mailer: MockMailer) -> Fixture {
    let repo = Arc::new(MemoryRepository::new());
    let mailer = Arc::new(mailer);
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        mailer: mailer.clone() as MailerState,
        config: AppConfig::default(),
    };
    Fixture {
        state,
        repo,
        mailer,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockMailer::new())
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: "unused".to_string(),
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

impl Fixture {
    async fn org(&self, username: &str) -> OrgUser {
        let org = self.repo.create_organization(new_user(username)).await.unwrap();
        OrgUser {
            id: org.user_id,
            org_id: org.id,
        }
    }
}

fn as_auth(org: OrgUser) -> AuthUser {
    AuthUser {
        id: org.id,
        principal: Principal::Organization { org_id: org.org_id },
    }
}

// --- TESTS ---

#[test]
async fn test_create_lead_sends_notification_and_returns_created() {
    let f = fixture();
    let org = f.org("acme").await;

    let (status, Json(lead)) =
        leads::create_lead(org, State(f.state.clone()), Json(lead_request(None)))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lead.organization_id, org.org_id);
    assert_eq!(f.mailer.sent().await.len(), 1);
}

#[test]
async fn test_create_lead_survives_mail_failure() {
    let f = fixture_with(MockMailer::new_failing());
    let org = f.org("acme").await;

    let result = leads::create_lead(org, State(f.state.clone()), Json(lead_request(None))).await;

    assert!(result.is_ok());
    let stored = f
        .repo
        .list_leads(&Principal::Organization { org_id: org.org_id }.lead_list().unassigned.unwrap())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[test]
async fn test_invalid_payload_never_reaches_the_repository() {
    let f = fixture();
    let org = f.org("acme").await;

    let mut request = lead_request(None);
    request.first_name = String::new();
    let err = leads::create_lead(org, State(f.state.clone()), Json(request))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(f.repo.count_uncategorized_leads(org.org_id).await.unwrap(), 0);
    assert!(f.mailer.sent().await.is_empty());
}

#[test]
async fn test_assign_agent_checks_lead_before_agent() {
    let f = fixture();
    let acme = f.org("acme").await;
    let globex = f.org("globex").await;
    let lead = f.repo.create_lead(globex.org_id, lead_request(None)).await.unwrap();
    let agent = f.repo.create_agent(acme.org_id, new_user("jim")).await.unwrap();

    // Another tenant's lead is a 404 even with a valid agent.
    let err = leads::assign_agent(
        acme,
        State(f.state.clone()),
        Path(lead.id),
        Json(AssignAgentRequest { agent_id: agent.id }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
async fn test_category_update_rejects_unknown_category() {
    let f = fixture();
    let org = f.org("acme").await;
    let lead = f.repo.create_lead(org.org_id, lead_request(None)).await.unwrap();

    let err = leads::update_lead_category(
        as_auth(org),
        State(f.state.clone()),
        Path(lead.id),
        Json(LeadCategoryUpdateRequest {
            category_id: Some(9_999),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_create_agent_hashes_the_mailed_secret() {
    let f = fixture();
    let org = f.org("acme").await;

    let (status, Json(agent)) = agents::create_agent(
        org,
        State(f.state.clone()),
        Json(CreateAgentRequest {
            username: "jim".to_string(),
            email: "jim@example.com".to_string(),
            ..CreateAgentRequest::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let sent = f.mailer.sent().await;
    let secret = sent[0]
        .body
        .lines()
        .find_map(|line| line.strip_prefix("Temporary password: "))
        .unwrap();

    let credentials = f.repo.find_credentials("jim").await.unwrap().unwrap();
    assert_eq!(credentials.id, agent.user_id);
    assert_ne!(credentials.password_hash, secret);
    assert!(crm_portal::credentials::verify_password(secret, &credentials.password_hash).unwrap());

    let principal = f.repo.resolve_principal(agent.user_id).await.unwrap();
    assert_eq!(
        principal,
        Some(Principal::Agent {
            agent_id: agent.id,
            org_id: org.org_id
        })
    );
}

#[test]
async fn test_create_agent_rolls_back_when_the_invitation_fails() {
    let f = fixture_with(MockMailer::new_failing());
    let org = f.org("acme").await;

    let err = agents::create_agent(
        org,
        State(f.state.clone()),
        Json(CreateAgentRequest {
            username: "jim".to_string(),
            email: "jim@example.com".to_string(),
            ..CreateAgentRequest::default()
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Mail(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    assert!(f.repo.list_agents(org.org_id).await.unwrap().is_empty());
    assert!(f.repo.find_credentials("jim").await.unwrap().is_none());
}

#[test]
async fn test_update_agent_is_scoped_to_the_organization() {
    let f = fixture();
    let acme = f.org("acme").await;
    let globex = f.org("globex").await;
    let agent = f.repo.create_agent(acme.org_id, new_user("jim")).await.unwrap();

    let update = UpdateAgentRequest {
        first_name: Some("James".to_string()),
        ..UpdateAgentRequest::default()
    };

    let err = agents::update_agent(globex, State(f.state.clone()), Path(agent.id), Json(update.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let Json(updated) = agents::update_agent(acme, State(f.state.clone()), Path(agent.id), Json(update))
        .await
        .unwrap();
    assert_eq!(updated.first_name, "James");
    assert_eq!(updated.username, "jim");
}

#[test]
async fn test_duplicate_category_name_conflicts_within_organization_only() {
    let f = fixture();
    let acme = f.org("acme").await;
    let globex = f.org("globex").await;
    let request = || CreateCategoryRequest {
        name: "new".to_string(),
    };

    categories::create_category(acme, State(f.state.clone()), Json(request()))
        .await
        .unwrap();
    categories::create_category(globex, State(f.state.clone()), Json(request()))
        .await
        .unwrap();

    let err = categories::create_category(acme, State(f.state.clone()), Json(request()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[test]
async fn test_me_reports_the_principal() {
    let f = fixture();
    let org = f.org("acme").await;

    let Json(me) = account::get_me(as_auth(org), State(f.state.clone())).await.unwrap();
    assert_eq!(me.user.username, "acme");
    assert_eq!(me.principal, Principal::Organization { org_id: org.org_id });
}

#[test]
async fn test_me_for_a_vanished_user_is_unauthorized() {
    let f = fixture();
    let ghost = AuthUser {
        id: Uuid::new_v4(),
        principal: Principal::Organization { org_id: 1 },
    };

    let err = account::get_me(ghost, State(f.state.clone())).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[test]
async fn test_signup_rejects_short_password() {
    let f = fixture();

    let err = account::signup(
        State(f.state.clone()),
        Json(SignupRequest {
            username: "acme".to_string(),
            email: "acme@example.com".to_string(),
            password: "short".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(f.repo.find_credentials("acme").await.unwrap().is_none());
}
