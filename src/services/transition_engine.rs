//! Motor de transiciones
//!
//! Lógica pura del ciclo de vida: valida una operación contra el estado
//! actual y el rol del actor, y calcula la fila siguiente junto con el
//! evento de auditoría, la etiqueta del vehículo y el texto del timeline.
//! No toca el store.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    vehicle_status_label, Actor, ActorRole, DeliveryEventType, DeliveryRequest,
    DeliveryRequestEvent, DeliveryStatus, DeliveryWindow, RequestKind,
};
use crate::utils::errors::{
    forbidden_error, invalid_transition_error, validation_error, AppError, AppResult,
};

/// Franja laboral usada para derivar la ventana cuando no se indica una
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset: FixedOffset,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            utc_offset: Utc.fix(),
        }
    }
}

impl BusinessHours {
    pub fn new(start: NaiveTime, end: NaiveTime, utc_offset: FixedOffset) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::Internal(format!(
                "business window start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end, utc_offset })
    }

    /// Ventana `[start, end)` del día indicado, en UTC
    pub fn window_for(&self, date: NaiveDate) -> AppResult<DeliveryWindow> {
        Ok(DeliveryWindow {
            start: self.at(date, self.start)?,
            end: self.at(date, self.end)?,
        })
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> AppResult<DateTime<Utc>> {
        date.and_time(time)
            .and_local_timezone(self.utc_offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| AppError::Internal(format!("ambiguous local time {} {}", date, time)))
    }
}

/// Operaciones que un actor puede pedir sobre una solicitud existente
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `fee_amount` reemplaza la tarifa guardada cuando viene informada
    Propose {
        desired_date: NaiveDate,
        fee_amount: Option<Decimal>,
    },
    Approve,
    Reject,
    Schedule { window: Option<DeliveryWindow> },
    MarkInTransit,
    MarkDelivered,
    Cancel,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Propose { .. } => "propose a date for",
            Operation::Approve => "approve",
            Operation::Reject => "reject",
            Operation::Schedule { .. } => "schedule",
            Operation::MarkInTransit => "mark in transit",
            Operation::MarkDelivered => "mark delivered",
            Operation::Cancel => "cancel",
        }
    }

    /// Estados de origen desde los que la operación es legal
    pub fn allowed_from(&self) -> &'static [DeliveryStatus] {
        use DeliveryStatus::*;
        match self {
            Operation::Propose { .. } => &[Requested, Approved, Scheduled],
            Operation::Approve => &[Requested],
            Operation::Reject => &[Requested, Approved],
            Operation::Schedule { .. } => &[Requested, Approved],
            Operation::MarkInTransit => &[Scheduled],
            Operation::MarkDelivered => &[Scheduled, InTransit],
            Operation::Cancel => &[Requested, Approved, Scheduled, InTransit],
        }
    }

    pub fn target(&self) -> DeliveryStatus {
        match self {
            Operation::Propose { .. } => DeliveryStatus::Requested,
            Operation::Approve => DeliveryStatus::Approved,
            Operation::Reject => DeliveryStatus::Rejected,
            Operation::Schedule { .. } => DeliveryStatus::Scheduled,
            Operation::MarkInTransit => DeliveryStatus::InTransit,
            Operation::MarkDelivered => DeliveryStatus::Delivered,
            Operation::Cancel => DeliveryStatus::Canceled,
        }
    }

    pub fn event_type(&self) -> DeliveryEventType {
        match self {
            Operation::Propose { .. } => DeliveryEventType::Proposed,
            Operation::Approve => DeliveryEventType::Approved,
            Operation::Reject => DeliveryEventType::Rejected,
            Operation::Schedule { .. } => DeliveryEventType::Scheduled,
            Operation::MarkInTransit => DeliveryEventType::InTransit,
            Operation::MarkDelivered => DeliveryEventType::Delivered,
            Operation::Cancel => DeliveryEventType::Canceled,
        }
    }

    fn requires_staff(&self) -> bool {
        matches!(
            self,
            Operation::Schedule { .. } | Operation::MarkInTransit | Operation::MarkDelivered
        )
    }
}

/// Datos para abrir una solicitud nueva en estado `Requested`
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequestDraft {
    pub vehicle_id: Uuid,
    pub client_id: Uuid,
    pub address_id: Option<Uuid>,
    pub collection_address_id: Option<Uuid>,
    pub desired_date: NaiveDate,
    pub fee_amount: Option<Decimal>,
}

/// Resultado de validar una transición: todo lo que hay que persistir y publicar
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    /// Estado esperado en la escritura condicional. `None` al crear.
    pub from: Option<DeliveryStatus>,
    pub next: DeliveryRequest,
    pub event: DeliveryRequestEvent,
    pub vehicle_status: &'static str,
    pub timeline: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionEngine {
    hours: BusinessHours,
}

impl TransitionEngine {
    pub fn new(hours: BusinessHours) -> Self {
        Self { hours }
    }

    pub fn business_hours(&self) -> &BusinessHours {
        &self.hours
    }

    /// Plan de creación de una solicitud nueva (primera propuesta)
    pub fn plan_creation(
        &self,
        draft: NewRequestDraft,
        actor: &Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionPlan> {
        if actor.role == ActorRole::Client && actor.id != draft.client_id {
            return Err(forbidden_error(
                "propose a date",
                "clients can only open requests for themselves",
            ));
        }

        let kind = RequestKind::from_address(draft.address_id);
        if kind == RequestKind::Pickup && draft.collection_address_id.is_none() {
            return Err(validation_error(
                "collection_address_id",
                "a pickup needs the client address the vehicle is collected from",
            ));
        }

        let next = DeliveryRequest {
            id: Uuid::new_v4(),
            vehicle_id: draft.vehicle_id,
            client_id: draft.client_id,
            address_id: draft.address_id,
            collection_address_id: match kind {
                RequestKind::Pickup => draft.collection_address_id,
                RequestKind::Delivery => None,
            },
            status: DeliveryStatus::Requested,
            desired_date: draft.desired_date,
            window_start: None,
            window_end: None,
            scheduled_at: None,
            created_by: actor.id,
            fee_amount: draft.fee_amount,
            created_at: now,
            updated_at: now,
        };

        let event = DeliveryRequestEvent::new(
            next.id,
            DeliveryEventType::Proposed,
            None,
            DeliveryStatus::Requested,
            actor,
            notes,
            now,
        );

        Ok(TransitionPlan {
            from: None,
            vehicle_status: vehicle_status_label(kind, next.status),
            timeline: format!(
                "{} requested for {} by {}",
                kind_title(kind),
                next.desired_date,
                actor.role
            ),
            next,
            event,
        })
    }

    /// Valida `operation` sobre `current` y calcula la fila siguiente
    pub fn plan(
        &self,
        current: &DeliveryRequest,
        actor: &Actor,
        operation: &Operation,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionPlan> {
        self.authorize(current, actor, operation)?;

        if !operation.allowed_from().contains(&current.status) {
            return Err(invalid_transition_error(operation.name(), current.status));
        }

        let mut next = current.clone();
        next.status = operation.target();
        next.updated_at = now;

        match operation {
            Operation::Propose {
                desired_date,
                fee_amount,
            } => {
                if *desired_date == current.desired_date {
                    return Err(AppError::InvalidTransition(format!(
                        "{} is already the proposed date; approve it instead",
                        desired_date
                    )));
                }
                if let Some(fee) = fee_amount {
                    if fee.is_sign_negative() {
                        return Err(validation_error("fee_amount", "fee amount cannot be negative"));
                    }
                    next.fee_amount = Some(*fee);
                }
                next.desired_date = *desired_date;
                next.created_by = actor.id;
                next.window_start = None;
                next.window_end = None;
                next.scheduled_at = None;
            }
            Operation::Approve => {
                // Cada parte aprueba solo lo que propuso la otra
                if actor.id == current.created_by || actor.party() == current.proposed_by() {
                    return Err(AppError::SelfApproval);
                }
            }
            Operation::Schedule { window } => {
                let window = match window {
                    Some(explicit) => {
                        if explicit.start >= explicit.end {
                            return Err(validation_error(
                                "window",
                                "window_start must be before window_end",
                            ));
                        }
                        *explicit
                    }
                    None => self.hours.window_for(current.desired_date)?,
                };
                next.window_start = Some(window.start);
                next.window_end = Some(window.end);
                next.scheduled_at = Some(now);
            }
            Operation::Reject
            | Operation::MarkInTransit
            | Operation::MarkDelivered
            | Operation::Cancel => {}
        }

        let event = DeliveryRequestEvent::new(
            current.id,
            operation.event_type(),
            Some(current.status),
            next.status,
            actor,
            notes,
            now,
        );

        let kind = current.kind();
        Ok(TransitionPlan {
            from: Some(current.status),
            vehicle_status: vehicle_status_label(kind, next.status),
            timeline: describe(kind, operation, &next, actor),
            next,
            event,
        })
    }

    fn authorize(
        &self,
        current: &DeliveryRequest,
        actor: &Actor,
        operation: &Operation,
    ) -> AppResult<()> {
        if actor.role != ActorRole::Client {
            return Ok(());
        }
        if actor.id != current.client_id {
            return Err(forbidden_error(
                operation.name(),
                "the request belongs to another client",
            ));
        }
        if operation.requires_staff() {
            return Err(forbidden_error(
                operation.name(),
                "only admins and specialists can perform this operation",
            ));
        }
        Ok(())
    }
}

fn kind_title(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Pickup => "Pickup",
        RequestKind::Delivery => "Delivery",
    }
}

/// Texto legible para el historial del vehículo
fn describe(
    kind: RequestKind,
    operation: &Operation,
    next: &DeliveryRequest,
    actor: &Actor,
) -> String {
    let title = kind_title(kind);
    match operation {
        Operation::Propose { desired_date, .. } => {
            format!("{} date proposed for {} by {}", title, desired_date, actor.role)
        }
        Operation::Approve => format!(
            "{} date {} approved by {}",
            title, next.desired_date, actor.role
        ),
        Operation::Reject => format!(
            "{} proposal for {} rejected by {}",
            title, next.desired_date, actor.role
        ),
        Operation::Schedule { .. } => match next.window() {
            Some(window) => format!(
                "{} scheduled between {} and {}",
                title,
                window.start.format("%Y-%m-%d %H:%M UTC"),
                window.end.format("%Y-%m-%d %H:%M UTC")
            ),
            None => format!("{} scheduled for {}", title, next.desired_date),
        },
        Operation::MarkInTransit => format!("{} in progress", title),
        Operation::MarkDelivered => match kind {
            RequestKind::Pickup => "Vehicle picked up from client".to_string(),
            RequestKind::Delivery => "Vehicle delivered to client address".to_string(),
        },
        Operation::Cancel => format!("{} request canceled by {}", title, actor.role),
    }
}
