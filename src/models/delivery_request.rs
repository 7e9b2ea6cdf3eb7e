//! Modelo de DeliveryRequest
//!
//! Una solicitud abierta para mover un vehículo: recogida en casa del
//! cliente (pickup, `address_id` nulo) o entrega en una dirección del
//! cliente (delivery, `address_id` no nulo). Mapea a la tabla
//! `delivery_requests`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Estado de la solicitud - mapea al ENUM delivery_request_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "delivery_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Requested,
    Approved,
    Scheduled,
    InTransit,
    Delivered,
    Rejected,
    Canceled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 7] = [
        DeliveryStatus::Requested,
        DeliveryStatus::Approved,
        DeliveryStatus::Scheduled,
        DeliveryStatus::InTransit,
        DeliveryStatus::Delivered,
        DeliveryStatus::Rejected,
        DeliveryStatus::Canceled,
    ];

    /// Estados que cuentan como solicitud "activa" para un vehículo
    pub const ACTIVE: [DeliveryStatus; 3] = [
        DeliveryStatus::Requested,
        DeliveryStatus::Approved,
        DeliveryStatus::Scheduled,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Rejected | DeliveryStatus::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Requested => "requested",
            DeliveryStatus::Approved => "approved",
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Rejected => "rejected",
            DeliveryStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de movimiento, derivado de si la solicitud tiene dirección destino
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Pickup,
    Delivery,
}

impl RequestKind {
    pub fn from_address(address_id: Option<Uuid>) -> Self {
        match address_id {
            Some(_) => RequestKind::Delivery,
            None => RequestKind::Pickup,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Pickup => "pickup",
            RequestKind::Delivery => "delivery",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quién propuso la fecha vigente
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProposedBy {
    Client,
    Admin,
}

/// Franja horaria `[start, end)` fijada al programar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// DeliveryRequest principal - mapea exactamente a la tabla delivery_requests
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Uuid,
    /// Dirección destino. Nula para recogidas, inmutable tras la creación.
    pub address_id: Option<Uuid>,
    /// Dirección del cliente donde se recoge el vehículo (solo pickups).
    pub collection_address_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub desired_date: NaiveDate,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Actor que propuso la `desired_date` vigente.
    pub created_by: Uuid,
    pub fee_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRequest {
    pub fn kind(&self) -> RequestKind {
        RequestKind::from_address(self.address_id)
    }

    pub fn proposed_by(&self) -> ProposedBy {
        if self.created_by == self.client_id {
            ProposedBy::Client
        } else {
            ProposedBy::Admin
        }
    }

    pub fn window(&self) -> Option<DeliveryWindow> {
        match (self.window_start, self.window_end) {
            (Some(start), Some(end)) => Some(DeliveryWindow { start, end }),
            _ => None,
        }
    }

    /// Dirección del cliente con la que se agrupa y se tarifa la solicitud
    pub fn client_address_id(&self) -> Option<Uuid> {
        self.address_id.or(self.collection_address_id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn request(status: DeliveryStatus, address_id: Option<Uuid>) -> DeliveryRequest {
        let client_id = Uuid::new_v4();
        let now = Utc::now();
        DeliveryRequest {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            client_id,
            address_id,
            collection_address_id: if address_id.is_none() { Some(Uuid::new_v4()) } else { None },
            status,
            desired_date: date(2025, 9, 10),
            window_start: None,
            window_end: None,
            scheduled_at: None,
            created_by: client_id,
            fee_amount: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::request;
    use super::*;

    #[test]
    fn kind_follows_address_nullness() {
        assert_eq!(request(DeliveryStatus::Requested, None).kind(), RequestKind::Pickup);
        assert_eq!(
            request(DeliveryStatus::Requested, Some(Uuid::new_v4())).kind(),
            RequestKind::Delivery
        );
    }

    #[test]
    fn proposed_by_compares_creator_with_client() {
        let mut req = request(DeliveryStatus::Requested, None);
        assert_eq!(req.proposed_by(), ProposedBy::Client);
        req.created_by = Uuid::new_v4();
        assert_eq!(req.proposed_by(), ProposedBy::Admin);
    }

    #[test]
    fn active_and_terminal_sets_are_disjoint() {
        for status in DeliveryStatus::ALL {
            assert!(!(status.is_active() && status.is_terminal()), "{}", status);
        }
        assert!(!DeliveryStatus::InTransit.is_active());
        assert!(!DeliveryStatus::InTransit.is_terminal());
    }
}
