//! HTTP handlers, grouped by resource.
//!
//! Every handler derives its scope from the resolved `Principal` and never
//! from the request body.

pub mod account;
pub mod agents;
pub mod categories;
pub mod leads;

use tracing::{error, info};

use crate::mailer::{MailMessage, MailerState};

/// Sends a notification after a write has been committed. Delivery failures
/// are logged and the write stands.
pub(crate) async fn notify(mailer: &MailerState, message: MailMessage) {
    match mailer.send(&message).await {
        Ok(()) => info!(subject = %message.subject, to = ?message.recipients, "notification sent"),
        Err(e) => error!(subject = %message.subject, "notification failed: {e}"),
    }
}
