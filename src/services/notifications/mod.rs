pub mod log;
pub mod mail_relay;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::Contact;

#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn notify_confirmation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
        treatment_type: &str,
    ) -> anyhow::Result<()>;

    async fn notify_cancellation(
        &self,
        contact: &Contact,
        scheduled_at: NaiveDateTime,
    ) -> anyhow::Result<()>;
}

/// Something the patient should be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Confirmation {
        contact: Contact,
        scheduled_at: NaiveDateTime,
        treatment_type: String,
    },
    Cancellation {
        contact: Contact,
        scheduled_at: NaiveDateTime,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Confirmation { .. } => "confirmation",
            Notification::Cancellation { .. } => "cancellation",
        }
    }

    pub async fn deliver(&self, port: &dyn NotificationPort) -> anyhow::Result<()> {
        match self {
            Notification::Confirmation {
                contact,
                scheduled_at,
                treatment_type,
            } => {
                port.notify_confirmation(contact, *scheduled_at, treatment_type)
                    .await
            }
            Notification::Cancellation {
                contact,
                scheduled_at,
            } => port.notify_cancellation(contact, *scheduled_at).await,
        }
    }
}

/// Sending half of the notification queue. Never blocks and never fails the
/// caller.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        let kind = notification.kind();
        if self.tx.send(notification).is_err() {
            tracing::warn!(kind, "notification dispatcher stopped, dropping message");
        }
    }
}

/// Drains the queue into `port` until every `Notifier` is dropped.
pub fn spawn_dispatcher(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    port: Arc<dyn NotificationPort>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match notification.deliver(port.as_ref()).await {
                Ok(()) => tracing::debug!(kind = notification.kind(), "notification delivered"),
                Err(e) => tracing::error!(
                    error = %e,
                    kind = notification.kind(),
                    "failed to deliver notification"
                ),
            }
        }
        tracing::info!("notification dispatcher stopped");
    })
}

pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

pub fn render_confirmation(
    contact: &Contact,
    scheduled_at: &NaiveDateTime,
    treatment_type: &str,
) -> RenderedMessage {
    RenderedMessage {
        subject: "Confirmación de Cita Dental".to_string(),
        body: format!(
            "Hola {},\n\n\
             Tu cita ha sido confirmada para el {} a las {}.\n\
             Tipo de tratamiento: {treatment_type}\n\n\
             Por favor, llega 10 minutos antes de tu cita.\n\
             Si necesitas cancelar o reprogramar, hazlo con al menos 24 horas de anticipación.",
            contact.name,
            scheduled_at.format("%d/%m/%Y"),
            scheduled_at.format("%H:%M"),
        ),
    }
}

pub fn render_cancellation(contact: &Contact, scheduled_at: &NaiveDateTime) -> RenderedMessage {
    RenderedMessage {
        subject: "Cancelación de Cita Dental".to_string(),
        body: format!(
            "Hola {},\n\n\
             Tu cita programada para el {} a las {} ha sido cancelada.\n\n\
             Si deseas programar una nueva cita, puedes hacerlo a través de nuestra plataforma.",
            contact.name,
            scheduled_at.format("%d/%m/%Y"),
            scheduled_at.format("%H:%M"),
        ),
    }
}
