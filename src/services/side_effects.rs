//! Efectos secundarios post-commit
//!
//! Tras confirmar una transición el orquestador publica un mensaje y sigue
//! adelante. El proyector consume los mensajes en su propia tarea y
//! actualiza el estado visible del vehículo, el timeline y las
//! notificaciones. Un fallo aquí se registra pero nunca deshace la
//! transición ya confirmada.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::VehicleHistoryEntry;
use crate::repositories::VehicleProjectionWriter;
use crate::services::notifications::{Notification, NotificationSink};
use crate::utils::errors::{AppError, AppResult};

/// Mensaje emitido por cada transición confirmada
#[derive(Debug, Clone, PartialEq)]
pub struct SideEffect {
    pub request_id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_status: &'static str,
    pub timeline: String,
    pub notification: Option<Notification>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SideEffectPublisher {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl SideEffectPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SideEffect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Encola sin esperar; solo falla si el proyector ya no escucha
    pub fn publish(&self, effect: SideEffect) -> AppResult<()> {
        self.tx
            .send(effect)
            .map_err(|e| AppError::SideEffect(format!("projector is not running: request {}", e.0.request_id)))
    }
}

pub struct SideEffectProjector {
    vehicles: Arc<dyn VehicleProjectionWriter>,
    notifier: Arc<dyn NotificationSink>,
}

impl SideEffectProjector {
    pub fn new(vehicles: Arc<dyn VehicleProjectionWriter>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { vehicles, notifier }
    }

    /// Aplica un mensaje. Cada escritura es independiente: si una falla,
    /// las demás se intentan igualmente. Devuelve los fallos.
    pub async fn apply(&self, effect: &SideEffect) -> Vec<AppError> {
        let mut failures = Vec::new();

        if let Err(e) = self
            .vehicles
            .set_status(effect.vehicle_id, effect.vehicle_status)
            .await
        {
            failures.push(e);
        }

        let entry = VehicleHistoryEntry {
            id: Uuid::new_v4(),
            vehicle_id: effect.vehicle_id,
            request_id: effect.request_id,
            status_label: effect.vehicle_status.to_string(),
            description: effect.timeline.clone(),
            created_at: effect.occurred_at,
        };
        if let Err(e) = self.vehicles.append_history(&entry).await {
            failures.push(e);
        }

        if let Some(notification) = &effect.notification {
            if let Err(e) = self.notifier.notify(notification).await {
                failures.push(e);
            }
        }

        for failure in &failures {
            warn!(
                "⚠️ [SIDE_EFFECT_FAILURE] Efecto secundario fallido para solicitud {}: {}",
                effect.request_id,
                failure
            );
        }

        failures
    }

    /// Consume mensajes hasta que se cierre el canal
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<SideEffect>) {
        info!("📽️ Proyector de efectos secundarios iniciado");
        while let Some(effect) = rx.recv().await {
            let failures = self.apply(&effect).await;
            if failures.is_empty() {
                debug!(
                    "✅ Vehículo {} proyectado como '{}'",
                    effect.vehicle_id, effect.vehicle_status
                );
            }
        }
        info!("📽️ Proyector de efectos secundarios detenido");
    }

    pub fn spawn(self, rx: mpsc::UnboundedReceiver<SideEffect>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
