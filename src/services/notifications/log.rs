use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{render_cancellation, render_confirmation, NotificationPort};
use crate::models::Contact;

/// Dev mode: writes the message to the log instead of sending it.
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn notify_confirmation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
        treatment_type: &str,
    ) -> anyhow::Result<()> {
        let message = render_confirmation(contact, &scheduled_at, treatment_type);
        tracing::info!(to = %contact.email, subject = %message.subject, body = %message.body, "mail (not sent)");
        Ok(())
    }

    async fn notify_cancellation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let message = render_cancellation(contact, &scheduled_at);
        tracing::info!(to = %contact.email, subject = %message.subject, body = %message.body, "mail (not sent)");
        Ok(())
    }
}
