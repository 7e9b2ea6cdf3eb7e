//! Modelo de DeliveryRequestEvent
//!
//! Registro de auditoría inmutable: se inserta uno por cada transición y
//! nunca se actualiza ni se borra. Mapea a la tabla `delivery_request_events`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

use super::delivery_request::{DeliveryStatus, ProposedBy};

/// Rol del actor - mapea al ENUM actor_role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "actor_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Admin,
    Client,
    Specialist,
}

impl ActorRole {
    /// Admin y especialista operan en nombre del taller
    pub fn is_staff(self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Specialist)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Client => "client",
            ActorRole::Specialist => "specialist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(ActorRole::Admin),
            "client" => Some(ActorRole::Client),
            "specialist" => Some(ActorRole::Specialist),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identidad de quien ejecuta la operación, provista por la capa de auth
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn client(id: Uuid) -> Self {
        Self::new(id, ActorRole::Client)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, ActorRole::Admin)
    }

    pub fn specialist(id: Uuid) -> Self {
        Self::new(id, ActorRole::Specialist)
    }

    /// Parte de la negociación a la que pertenece: el cliente o el taller
    pub fn party(&self) -> ProposedBy {
        match self.role {
            ActorRole::Client => ProposedBy::Client,
            ActorRole::Admin | ActorRole::Specialist => ProposedBy::Admin,
        }
    }
}

/// Tipo de evento - mapea al ENUM delivery_event_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "delivery_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventType {
    Proposed,
    Approved,
    Rejected,
    Scheduled,
    InTransit,
    Delivered,
    Canceled,
}

impl DeliveryEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryEventType::Proposed => "proposed",
            DeliveryEventType::Approved => "approved",
            DeliveryEventType::Rejected => "rejected",
            DeliveryEventType::Scheduled => "scheduled",
            DeliveryEventType::InTransit => "in_transit",
            DeliveryEventType::Delivered => "delivered",
            DeliveryEventType::Canceled => "canceled",
        }
    }
}

/// Evento de auditoría tal como se guarda
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DeliveryRequestEvent {
    pub id: Uuid,
    pub request_id: Uuid,
    pub event_type: DeliveryEventType,
    /// Nulo solo en el evento que crea la solicitud.
    pub status_from: Option<DeliveryStatus>,
    pub status_to: DeliveryStatus,
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRequestEvent {
    pub fn new(
        request_id: Uuid,
        event_type: DeliveryEventType,
        status_from: Option<DeliveryStatus>,
        status_to: DeliveryStatus,
        actor: &Actor,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            event_type,
            status_from,
            status_to,
            actor_id: actor.id,
            actor_role: actor.role,
            notes,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(ActorRole::parse("Admin"), Some(ActorRole::Admin));
        assert_eq!(ActorRole::parse(" specialist "), Some(ActorRole::Specialist));
        assert_eq!(ActorRole::parse("driver"), None);
    }

    #[test]
    fn only_admin_and_specialist_are_staff() {
        assert!(ActorRole::Admin.is_staff());
        assert!(ActorRole::Specialist.is_staff());
        assert!(!ActorRole::Client.is_staff());
    }

    #[test]
    fn specialists_negotiate_on_the_admin_side() {
        assert_eq!(Actor::client(Uuid::new_v4()).party(), ProposedBy::Client);
        assert_eq!(Actor::admin(Uuid::new_v4()).party(), ProposedBy::Admin);
        assert_eq!(Actor::specialist(Uuid::new_v4()).party(), ProposedBy::Admin);
    }

    #[test]
    fn event_types_serialize_as_snake_case() {
        let json = serde_json::to_string(&DeliveryEventType::InTransit).unwrap();
        assert_eq!(json, "\"in_transit\"");
    }
}
