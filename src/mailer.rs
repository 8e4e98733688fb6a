use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    config::MailConfig,
    error::AppError,
    models::Agent,
};

/// MailMessage
///
/// A plain-text notification: subject, body, sender and recipients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub recipients: Vec<String>,
}

pub const LEAD_CREATED_SUBJECT: &str = "A lead has been created";
pub const LEAD_CREATED_BODY: &str = "Go to the site to see the new lead";
pub const AGENT_INVITE_SUBJECT: &str = "You are invited to become an agent.";

impl MailMessage {
    /// Fixed notification sent after a lead is created.
    pub fn lead_created(config: &MailConfig) -> Self {
        Self {
            subject: LEAD_CREATED_SUBJECT.to_string(),
            body: LEAD_CREATED_BODY.to_string(),
            from: config.lead_notification_from.clone(),
            recipients: config.lead_notification_recipients.clone(),
        }
    }

    /// Invitation sent to a newly created agent. Carries the generated secret,
    /// which is the only way the agent can log in.
    pub fn agent_invitation(config: &MailConfig, agent: &Agent, secret: &str) -> Self {
        Self {
            subject: AGENT_INVITE_SUBJECT.to_string(),
            body: format!(
                "You were added as an agent on {}. Please come login to start working.\n\n\
                 Username: {}\nTemporary password: {}",
                config.site_name, agent.username, secret
            ),
            from: config.agent_invite_from.clone(),
            recipients: vec![agent.email.clone()],
        }
    }
}

// 1. Mailer Contract
/// Mailer
///
/// Outbound notification sender. Handlers only decide when a message is sent
/// and what it says; delivery belongs to the implementation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError>;
}

// 2. The Real Implementation (HTTP mail relay)
/// HttpMailer
///
/// Posts each message as JSON to a mail relay, authenticated with a bearer token.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text_body: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        let payload = RelayPayload {
            from: &message.from,
            to: &message.recipients,
            subject: &message.subject,
            text_body: &message.body,
        };

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("mail relay connection error: {e}")))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!(
                "mail relay rejected message. Status: {status}, Body: {text}"
            )));
        }

        Ok(())
    }
}

/// LogMailer
///
/// Local default when no relay is configured: the message goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        tracing::info!(
            from = %message.from,
            to = ?message.recipients,
            subject = %message.subject,
            "mail (not delivered):\n{}",
            message.body
        );
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMailer
///
/// Records every message instead of delivering it.
#[derive(Default)]
pub struct MockMailer {
    /// When true, every send fails after recording nothing.
    pub should_fail: bool,
    sent: Mutex<Vec<MailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Mail("Mock Mailer Error: Simulation requested".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// MailerState
///
/// The shared handle to the mailer stored in the application state.
pub type MailerState = Arc<dyn Mailer>;

/// Picks the relay when one is configured, otherwise the log-only mailer.
pub fn mailer_from_config(config: &MailConfig) -> MailerState {
    match &config.service_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone(), config.service_token.clone())),
        None => Arc::new(LogMailer),
    }
}
