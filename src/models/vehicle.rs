//! Proyección del vehículo
//!
//! El esquema de `vehicles` no es nuestro: aquí solo viven la etiqueta de
//! estado visible derivada del ciclo de vida, la entrada de historial
//! (timeline) y los datos de visualización para las listas de trabajo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::delivery_request::{DeliveryStatus, RequestKind};

/// Etiqueta visible del vehículo como función pura de (tipo, estado)
pub fn vehicle_status_label(kind: RequestKind, status: DeliveryStatus) -> &'static str {
    match (kind, status) {
        (RequestKind::Pickup, DeliveryStatus::Requested | DeliveryStatus::Approved) => {
            "Pickup Pending Confirmation"
        }
        (RequestKind::Pickup, DeliveryStatus::Scheduled) => "Awaiting Pickup",
        (RequestKind::Pickup, DeliveryStatus::InTransit) => "Pickup In Progress",
        (RequestKind::Pickup, DeliveryStatus::Delivered) => "Vehicle Picked Up",
        (RequestKind::Pickup, DeliveryStatus::Rejected) => "Awaiting Pickup Proposal",
        (RequestKind::Pickup, DeliveryStatus::Canceled) => "Pickup Canceled",

        (RequestKind::Delivery, DeliveryStatus::Requested | DeliveryStatus::Approved) => {
            "Delivery Pending Confirmation"
        }
        (RequestKind::Delivery, DeliveryStatus::Scheduled) => "Awaiting Delivery",
        (RequestKind::Delivery, DeliveryStatus::InTransit) => "Out for Delivery",
        (RequestKind::Delivery, DeliveryStatus::Delivered) => "Vehicle Delivered",
        (RequestKind::Delivery, DeliveryStatus::Rejected) => "Awaiting Delivery Proposal",
        (RequestKind::Delivery, DeliveryStatus::Canceled) => "Delivery Canceled",
    }
}

/// Entrada del historial del vehículo - mapea a la tabla vehicle_history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct VehicleHistoryEntry {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub request_id: Uuid,
    pub status_label: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Datos de vehículo y cliente para las listas de especialistas
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct VehicleDisplay {
    pub vehicle_id: Uuid,
    pub license_plate: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_label_depends_on_kind() {
        assert_eq!(
            vehicle_status_label(RequestKind::Pickup, DeliveryStatus::Delivered),
            "Vehicle Picked Up"
        );
        assert_eq!(
            vehicle_status_label(RequestKind::Delivery, DeliveryStatus::Delivered),
            "Vehicle Delivered"
        );
    }

    #[test]
    fn scheduled_pickup_is_awaiting_pickup() {
        assert_eq!(
            vehicle_status_label(RequestKind::Pickup, DeliveryStatus::Scheduled),
            "Awaiting Pickup"
        );
        assert_eq!(
            vehicle_status_label(RequestKind::Delivery, DeliveryStatus::InTransit),
            "Out for Delivery"
        );
    }

    #[test]
    fn every_state_has_a_distinct_label_per_kind() {
        for kind in [RequestKind::Pickup, RequestKind::Delivery] {
            let mut labels: Vec<_> = DeliveryStatus::ALL
                .iter()
                .map(|s| vehicle_status_label(kind, *s))
                .collect();
            labels.dedup();
            // Requested y Approved comparten etiqueta
            assert_eq!(labels.len(), DeliveryStatus::ALL.len() - 1);
        }
    }
}
