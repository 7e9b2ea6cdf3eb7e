//! Notificaciones
//!
//! Sumidero fire-and-forget de avisos a la contraparte de una negociación.
//! Por defecto se registran en el log; si hay webhook configurado se envían
//! por HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

/// Destinatario del aviso
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Audience {
    Client(Uuid),
    Staff,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub audience: Audience,
    pub request_id: Uuid,
    pub vehicle_id: Uuid,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> AppResult<()>;
}

/// Sumidero que solo deja constancia en el log
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        info!(
            "📨 Notificación para {:?} (solicitud {}): {}",
            notification.audience, notification.request_id, notification.subject
        );
        Ok(())
    }
}

/// Sumidero que publica cada aviso como JSON en un webhook
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    client: Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::SideEffect(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::SideEffect(format!(
                "webhook answered {}",
                response.status()
            )));
        }

        debug!("📨 Webhook entregado para solicitud {}", notification.request_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_serializes_with_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Audience::Client(id)).unwrap();
        assert_eq!(json["type"], "client");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(serde_json::to_value(Audience::Staff).unwrap()["type"], "staff");
    }
}
