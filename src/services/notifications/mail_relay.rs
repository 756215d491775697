use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::json;

use super::{render_cancellation, render_confirmation, NotificationPort, RenderedMessage};
use crate::models::Contact;

/// Posts rendered emails as JSON to an HTTP mail relay.
pub struct MailRelayNotifier {
    url: String,
    api_key: String,
    sender: String,
    client: reqwest::Client,
}

impl MailRelayNotifier {
    pub fn new(url: String, api_key: String, sender: String) -> Self {
        Self {
            url,
            api_key,
            sender,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, to: &str, message: RenderedMessage) -> anyhow::Result<()> {
        let body = json!({
            "from": self.sender,
            "to": to,
            "subject": message.subject,
            "text": message.body,
        });

        self.client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach mail relay")?
            .error_for_status()
            .context("mail relay returned error")?;

        Ok(())
    }
}

#[async_trait]
impl NotificationPort for MailRelayNotifier {
    async fn notify_confirmation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
        treatment_type: &str,
    ) -> anyhow::Result<()> {
        let message = render_confirmation(contact, &scheduled_at, treatment_type);
        self.send(&contact.email, message).await
    }

    async fn notify_cancellation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        let message = render_cancellation(contact, &scheduled_at);
        self.send(&contact.email, message).await
    }
}
