use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{
    vehicle_status_label, ActorRole, DeliveryEventType, DeliveryRequest, DeliveryRequestEvent,
    DeliveryStatus, DeliveryWindow, ProposedBy, RequestKind,
};
use crate::services::{ProposalTarget, ProposeDateCommand, TransitionOutcome};
use crate::utils::errors::{validation_error, AppResult};
use crate::utils::validation::{
    parse_date_field, parse_optional_datetime_field, validate_date, validate_fee_amount,
};

fn validate_desired_date(value: &str) -> Result<(), ValidationError> {
    validate_date(value).map(|_| ())
}

// Request para proponer una fecha (nueva solicitud o contrapropuesta)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProposeDateRequest {
    pub request_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub address_id: Option<Uuid>,
    pub collection_address_id: Option<Uuid>,
    #[validate(custom = "validate_desired_date")]
    pub desired_date: String,
    #[validate(custom = "validate_fee_amount")]
    pub fee_amount: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl ProposeDateRequest {
    /// Validar y convertir al comando del orquestador. `default_client`
    /// se usa cuando el propio cliente omite `clientId`.
    pub fn into_command(self, default_client: Option<Uuid>) -> AppResult<ProposeDateCommand> {
        self.validate()?;
        let desired_date = parse_date_field("desired_date", &self.desired_date)?;

        let target = match (self.request_id, self.vehicle_id) {
            (Some(request_id), _) => ProposalTarget::Existing(request_id),
            (None, Some(vehicle_id)) => {
                let client_id = self.client_id.or(default_client).ok_or_else(|| {
                    validation_error("client_id", "clientId is required for a new proposal")
                })?;
                ProposalTarget::Vehicle {
                    vehicle_id,
                    client_id,
                    address_id: self.address_id,
                    collection_address_id: self.collection_address_id,
                }
            }
            (None, None) => {
                return Err(validation_error(
                    "vehicle_id",
                    "either requestId or vehicleId is required",
                ))
            }
        };

        Ok(ProposeDateCommand {
            target,
            desired_date,
            fee_amount: self.fee_amount,
            notes: self.notes,
        })
    }
}

// Request para aprobar, rechazar o cancelar
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

// Request para programar con ventana opcional
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl ScheduleRequest {
    /// Ventana explícita: ambos extremos o ninguno
    pub fn window(&self) -> AppResult<Option<DeliveryWindow>> {
        self.validate()?;
        let start = parse_optional_datetime_field("window_start", self.window_start.as_deref())?;
        let end = parse_optional_datetime_field("window_end", self.window_end.as_deref())?;

        match (start, end) {
            (Some(start), Some(end)) => Ok(Some(DeliveryWindow { start, end })),
            (None, None) => Ok(None),
            _ => Err(validation_error(
                "window",
                "windowStart and windowEnd must be provided together",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFilterQuery {
    pub client_id: Option<Uuid>,
}

// Response de propuesta
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeDateResponse {
    pub request_id: Uuid,
    pub status: DeliveryStatus,
    pub desired_date: NaiveDate,
    pub proposed_by: ProposedBy,
    pub vehicle_status: &'static str,
    pub warnings: Vec<String>,
}

impl From<TransitionOutcome> for ProposeDateResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            request_id: outcome.request.id,
            status: outcome.request.status,
            desired_date: outcome.request.desired_date,
            proposed_by: outcome.request.proposed_by(),
            vehicle_status: outcome.vehicle_status,
            warnings: outcome.warnings,
        }
    }
}

// Response de aprobar / rechazar / cancelar
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub success: bool,
    pub request_id: Uuid,
    pub new_status: DeliveryStatus,
    pub warnings: Vec<String>,
}

impl From<TransitionOutcome> for DecisionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            success: true,
            request_id: outcome.request.id,
            new_status: outcome.request.status,
            warnings: outcome.warnings,
        }
    }
}

// Response de programación
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub request_id: Uuid,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl From<TransitionOutcome> for ScheduleResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            request_id: outcome.request.id,
            window_start: outcome.request.window_start,
            window_end: outcome.request.window_end,
            scheduled_at: outcome.request.scheduled_at,
            warnings: outcome.warnings,
        }
    }
}

// Response de ejecución (en tránsito / entregado)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub success: bool,
    pub request_id: Uuid,
    pub new_status: DeliveryStatus,
    /// Etiqueta aplicada al vehículo, p.ej. "Vehicle Picked Up"
    pub vehicle_status: &'static str,
    pub warnings: Vec<String>,
}

impl From<TransitionOutcome> for ExecutionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            success: true,
            request_id: outcome.request.id,
            new_status: outcome.request.status,
            vehicle_status: outcome.vehicle_status,
            warnings: outcome.warnings,
        }
    }
}

// Response de detalle
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequestResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Uuid,
    pub address_id: Option<Uuid>,
    pub collection_address_id: Option<Uuid>,
    pub kind: RequestKind,
    pub status: DeliveryStatus,
    pub desired_date: NaiveDate,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub proposed_by: ProposedBy,
    pub vehicle_status: &'static str,
    pub fee_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeliveryRequest> for DeliveryRequestResponse {
    fn from(request: DeliveryRequest) -> Self {
        let kind = request.kind();
        Self {
            proposed_by: request.proposed_by(),
            vehicle_status: vehicle_status_label(kind, request.status),
            kind,
            id: request.id,
            vehicle_id: request.vehicle_id,
            client_id: request.client_id,
            address_id: request.address_id,
            collection_address_id: request.collection_address_id,
            status: request.status,
            desired_date: request.desired_date,
            window_start: request.window_start,
            window_end: request.window_end,
            scheduled_at: request.scheduled_at,
            created_by: request.created_by,
            fee_amount: request.fee_amount,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

// Response de evento de auditoría
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEventResponse {
    pub id: Uuid,
    pub event_type: DeliveryEventType,
    pub status_from: Option<DeliveryStatus>,
    pub status_to: DeliveryStatus,
    pub actor_id: Uuid,
    pub actor_role: ActorRole,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DeliveryRequestEvent> for DeliveryEventResponse {
    fn from(event: DeliveryRequestEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            status_from: event.status_from,
            status_to: event.status_to,
            actor_id: event.actor_id,
            actor_role: event.actor_role,
            notes: event.notes,
            created_at: event.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::AppError;

    fn proposal(desired_date: &str) -> ProposeDateRequest {
        ProposeDateRequest {
            vehicle_id: Some(Uuid::new_v4()),
            client_id: Some(Uuid::new_v4()),
            desired_date: desired_date.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn proposal_body_uses_camel_case() {
        let body = serde_json::json!({
            "vehicleId": Uuid::nil(),
            "clientId": Uuid::nil(),
            "addressId": null,
            "collectionAddressId": Uuid::nil(),
            "desiredDate": "2025-09-10"
        });
        let request: ProposeDateRequest = serde_json::from_value(body).unwrap();
        let command = request.into_command(None).unwrap();
        assert!(matches!(command.target, ProposalTarget::Vehicle { address_id: None, .. }));
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        let result = proposal("10/09/2025").into_command(None);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn negative_fee_is_a_validation_error() {
        let mut request = proposal("2025-09-10");
        request.fee_amount = Some(Decimal::new(-100, 2));
        assert!(matches!(request.into_command(None), Err(AppError::Validation(_))));
    }

    #[test]
    fn missing_target_is_a_validation_error() {
        let request = ProposeDateRequest {
            desired_date: "2025-09-10".to_string(),
            ..Default::default()
        };
        assert!(matches!(request.into_command(None), Err(AppError::Validation(_))));
    }

    #[test]
    fn request_id_takes_precedence() {
        let id = Uuid::new_v4();
        let mut request = proposal("2025-09-10");
        request.request_id = Some(id);
        assert_eq!(request.into_command(None).unwrap().target, ProposalTarget::Existing(id));
    }

    #[test]
    fn schedule_needs_both_bounds_or_none() {
        let only_start = ScheduleRequest {
            window_start: Some("2025-09-17T09:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(matches!(only_start.window(), Err(AppError::Validation(_))));

        assert_eq!(ScheduleRequest::default().window().unwrap(), None);

        let both = ScheduleRequest {
            window_start: Some("2025-09-17T10:00:00Z".to_string()),
            window_end: Some("2025-09-17T12:00:00+00:00".to_string()),
            notes: None,
        };
        let window = both.window().unwrap().unwrap();
        assert!(window.start < window.end);
    }
}
