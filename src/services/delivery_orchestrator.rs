//! Orquestador de recogidas y entregas
//!
//! Único componente que modifica filas de `delivery_requests`. Para cada
//! operación: carga la fila, pide el plan al motor de transiciones, escribe
//! condicionado al estado leído junto con el evento de auditoría y después
//! publica los efectos secundarios sin esperar por ellos.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Actor, ActorRole, DeliveryRequest, DeliveryRequestEvent, DeliveryWindow, RequestKind,
};
use crate::repositories::DeliveryRequestStore;
use crate::services::fee_resolver::FeeResolver;
use crate::services::notifications::{Audience, Notification};
use crate::services::side_effects::{SideEffect, SideEffectPublisher};
use crate::services::transition_engine::{
    NewRequestDraft, Operation, TransitionEngine, TransitionPlan,
};
use crate::utils::errors::{
    forbidden_error, not_found_error, validation_error, AppError, AppResult,
};

/// Sobre qué solicitud se propone la fecha
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalTarget {
    /// Contrapropuesta sobre una solicitud conocida
    Existing(Uuid),
    /// Solicitud activa del vehículo si la hay, si no una nueva
    Vehicle {
        vehicle_id: Uuid,
        client_id: Uuid,
        address_id: Option<Uuid>,
        collection_address_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposeDateCommand {
    pub target: ProposalTarget,
    pub desired_date: NaiveDate,
    /// Solo para entregas; las recogidas toman la tarifa resuelta.
    pub fee_amount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Resultado visible de una transición confirmada
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub request: DeliveryRequest,
    pub event: DeliveryRequestEvent,
    pub vehicle_status: &'static str,
    /// Avisos no fatales (efectos secundarios que no se pudieron encolar)
    pub warnings: Vec<String>,
}

pub struct DeliveryOrchestrator {
    requests: Arc<dyn DeliveryRequestStore>,
    fees: FeeResolver,
    engine: TransitionEngine,
    publisher: SideEffectPublisher,
    max_conflict_retries: u32,
}

impl DeliveryOrchestrator {
    pub fn new(
        requests: Arc<dyn DeliveryRequestStore>,
        fees: FeeResolver,
        engine: TransitionEngine,
        publisher: SideEffectPublisher,
    ) -> Self {
        Self {
            requests,
            fees,
            engine,
            publisher,
            max_conflict_retries: 1,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub async fn propose_date(
        &self,
        actor: &Actor,
        command: ProposeDateCommand,
    ) -> AppResult<TransitionOutcome> {
        match command.target {
            ProposalTarget::Existing(request_id) => {
                let current = self.load(request_id).await?;
                ensure_client_owns(actor, current.client_id, "propose a date for")?;
                let fee_amount = self.proposal_fee(&current, command.fee_amount).await?;
                let operation = Operation::Propose {
                    desired_date: command.desired_date,
                    fee_amount,
                };
                self.transition(actor, request_id, operation, command.notes).await
            }
            ProposalTarget::Vehicle {
                vehicle_id,
                client_id,
                address_id,
                collection_address_id,
            } => {
                ensure_client_owns(actor, client_id, "propose a date")?;

                let kind = RequestKind::from_address(address_id);
                if kind == RequestKind::Pickup {
                    if collection_address_id.is_none() {
                        return Err(validation_error(
                            "collection_address_id",
                            "a pickup needs the client address the vehicle is collected from",
                        ));
                    }
                    if command.fee_amount.is_some() {
                        return Err(pickup_fee_error());
                    }
                }

                if let Some(active) = self.requests.find_active_for_vehicle(vehicle_id, kind).await? {
                    if active.client_id != client_id {
                        return Err(AppError::BadRequest(format!(
                            "vehicle {} has an active {} request for another client",
                            vehicle_id, kind
                        )));
                    }
                    // La dirección no cambia tras crear la solicitud
                    let same_address = match kind {
                        RequestKind::Pickup => active.collection_address_id == collection_address_id,
                        RequestKind::Delivery => active.address_id == address_id,
                    };
                    if !same_address {
                        return Err(AppError::ActiveRequestExists(format!(
                            "vehicle {} already has an active {} request {} for another address",
                            vehicle_id, kind, active.id
                        )));
                    }
                    let fee_amount = self.proposal_fee(&active, command.fee_amount).await?;
                    let operation = Operation::Propose {
                        desired_date: command.desired_date,
                        fee_amount,
                    };
                    return self.transition(actor, active.id, operation, command.notes).await;
                }

                let fee_amount = match kind {
                    RequestKind::Pickup => {
                        Some(self.require_fee(client_id, collection_address_id).await?)
                    }
                    RequestKind::Delivery => command.fee_amount,
                };

                let draft = NewRequestDraft {
                    vehicle_id,
                    client_id,
                    address_id,
                    collection_address_id,
                    desired_date: command.desired_date,
                    fee_amount,
                };
                let plan = self
                    .engine
                    .plan_creation(draft, actor, command.notes, Utc::now())?;
                let saved = self.requests.insert_with_event(&plan.next, &plan.event).await?;

                Ok(self.after_commit(saved, plan, actor))
            }
        }
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        request_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::Approve, notes).await
    }

    /// Rechazo terminal: la negociación continúa con una nueva solicitud
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::Reject, notes).await
    }

    pub async fn schedule(
        &self,
        actor: &Actor,
        request_id: Uuid,
        window: Option<DeliveryWindow>,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::Schedule { window }, notes)
            .await
    }

    pub async fn mark_in_transit(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::MarkInTransit, None)
            .await
    }

    pub async fn mark_delivered(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::MarkDelivered, None)
            .await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        request_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        self.transition(actor, request_id, Operation::Cancel, notes).await
    }

    /// Lectura de una solicitud respetando la propiedad del cliente
    pub async fn get(&self, actor: &Actor, request_id: Uuid) -> AppResult<DeliveryRequest> {
        let request = self.load(request_id).await?;
        ensure_can_read(actor, &request)?;
        Ok(request)
    }

    /// Historial de auditoría ordenado
    pub async fn history(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> AppResult<Vec<DeliveryRequestEvent>> {
        let request = self.load(request_id).await?;
        ensure_can_read(actor, &request)?;
        self.requests.list_events(request_id).await
    }

    async fn load(&self, request_id: Uuid) -> AppResult<DeliveryRequest> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| not_found_error("Delivery request", &request_id.to_string()))
    }

    /// Tarifa que acompaña una contrapropuesta. Las recogidas vuelven a
    /// resolver la tarifa acordada; las entregas usan la indicada, si la hay.
    async fn proposal_fee(
        &self,
        request: &DeliveryRequest,
        requested: Option<Decimal>,
    ) -> AppResult<Option<Decimal>> {
        match request.kind() {
            RequestKind::Pickup => {
                if requested.is_some() {
                    return Err(pickup_fee_error());
                }
                let fee = self
                    .require_fee(request.client_id, request.collection_address_id)
                    .await?;
                Ok(Some(fee))
            }
            RequestKind::Delivery => Ok(requested),
        }
    }

    async fn require_fee(
        &self,
        client_id: Uuid,
        collection_address_id: Option<Uuid>,
    ) -> AppResult<Decimal> {
        let Some(address_id) = collection_address_id else {
            return Err(AppError::PricingRequired);
        };
        self.fees
            .resolve_fee(client_id, address_id)
            .await?
            .ok_or(AppError::PricingRequired)
    }

    /// Carga, valida y escribe condicionado al estado leído. Un conflicto se
    /// reintenta desde la carga hasta `max_conflict_retries` veces.
    async fn transition(
        &self,
        actor: &Actor,
        request_id: Uuid,
        operation: Operation,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        let mut attempt = 0;

        loop {
            let current = self.load(request_id).await?;
            let plan = self
                .engine
                .plan(&current, actor, &operation, notes.clone(), Utc::now())
                .map_err(|e| {
                    warn!(
                        "🚫 {} rechazado sobre solicitud {} ({}): {}",
                        operation.name(),
                        request_id,
                        current.status,
                        e
                    );
                    e
                })?;

            match self
                .requests
                .update_if_status(current.status, &plan.next, &plan.event)
                .await?
            {
                Some(saved) => return Ok(self.after_commit(saved, plan, actor)),
                None if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "🔁 Conflicto al escribir solicitud {} (esperado {}), reintento {}/{}",
                        request_id, current.status, attempt, self.max_conflict_retries
                    );
                }
                None => {
                    return Err(AppError::ConcurrentModification(format!(
                        "delivery request {} changed while trying to {} it",
                        request_id,
                        operation.name()
                    )));
                }
            }
        }
    }

    fn after_commit(
        &self,
        saved: DeliveryRequest,
        plan: TransitionPlan,
        actor: &Actor,
    ) -> TransitionOutcome {
        info!(
            "✅ Solicitud {} ({}) {} → {} por {} {}",
            saved.id,
            saved.kind(),
            plan.from.map(|s| s.as_str()).unwrap_or("new"),
            saved.status,
            actor.role,
            actor.id
        );

        let effect = SideEffect {
            request_id: saved.id,
            vehicle_id: saved.vehicle_id,
            vehicle_status: plan.vehicle_status,
            timeline: plan.timeline.clone(),
            notification: Some(notification_for(&saved, &plan, actor)),
            occurred_at: plan.event.created_at,
        };

        let mut warnings = Vec::new();
        if let Err(e) = self.publisher.publish(effect) {
            warn!("⚠️ [SIDE_EFFECT_FAILURE] {}", e);
            warnings.push(e.to_string());
        }

        TransitionOutcome {
            request: saved,
            event: plan.event,
            vehicle_status: plan.vehicle_status,
            warnings,
        }
    }
}

fn ensure_can_read(actor: &Actor, request: &DeliveryRequest) -> AppResult<()> {
    ensure_client_owns(actor, request.client_id, "read delivery request")
}

/// Un cliente solo opera sobre sus propias solicitudes
fn ensure_client_owns(actor: &Actor, client_id: Uuid, operation: &str) -> AppResult<()> {
    if actor.role == ActorRole::Client && actor.id != client_id {
        return Err(forbidden_error(
            operation,
            "the request belongs to another client",
        ));
    }
    Ok(())
}

fn pickup_fee_error() -> AppError {
    validation_error(
        "fee_amount",
        "pickups use the agreed collection fee and do not accept a fee amount",
    )
}

/// Aviso a la contraparte de quien ejecutó la operación
fn notification_for(request: &DeliveryRequest, plan: &TransitionPlan, actor: &Actor) -> Notification {
    let audience = match actor.role {
        ActorRole::Client => Audience::Staff,
        ActorRole::Admin | ActorRole::Specialist => Audience::Client(request.client_id),
    };

    Notification {
        audience,
        request_id: request.id,
        vehicle_id: request.vehicle_id,
        subject: format!("{} request {}", request.kind(), plan.event.event_type.as_str()),
        body: plan.timeline.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delivery_request::fixtures::{date, request};
    use crate::models::{CollectionFee, CollectionFeeStatus, DeliveryEventType, DeliveryStatus};
    use crate::repositories::{DeliveryRequestStore, InMemoryStore};
    use crate::services::side_effects::SideEffect;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Store que cambia el estado de la fila justo antes de la primera
    /// escritura condicional, como haría otro actor concurrente.
    struct RacingStore {
        inner: Arc<InMemoryStore>,
        race_to: Mutex<Option<DeliveryStatus>>,
    }

    #[async_trait]
    impl DeliveryRequestStore for RacingStore {
        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DeliveryRequest>> {
            self.inner.find_by_id(id).await
        }

        async fn find_active_for_vehicle(
            &self,
            vehicle_id: Uuid,
            kind: RequestKind,
        ) -> AppResult<Option<DeliveryRequest>> {
            self.inner.find_active_for_vehicle(vehicle_id, kind).await
        }

        async fn insert_with_event(
            &self,
            request: &DeliveryRequest,
            event: &DeliveryRequestEvent,
        ) -> AppResult<DeliveryRequest> {
            self.inner.insert_with_event(request, event).await
        }

        async fn update_if_status(
            &self,
            expected: DeliveryStatus,
            request: &DeliveryRequest,
            event: &DeliveryRequestEvent,
        ) -> AppResult<Option<DeliveryRequest>> {
            let raced = self.race_to.lock().unwrap().take();
            if let Some(status) = raced {
                let mut row = self.inner.find_by_id(request.id).await?.unwrap();
                row.status = status;
                self.inner.put_request(row).await;
            }
            self.inner.update_if_status(expected, request, event).await
        }

        async fn list_events(&self, request_id: Uuid) -> AppResult<Vec<DeliveryRequestEvent>> {
            self.inner.list_events(request_id).await
        }

        async fn list_by_status(
            &self,
            statuses: &[DeliveryStatus],
            client_id: Option<Uuid>,
        ) -> AppResult<Vec<DeliveryRequest>> {
            self.inner.list_by_status(statuses, client_id).await
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        orchestrator: DeliveryOrchestrator,
        effects: UnboundedReceiver<SideEffect>,
        client: Actor,
        admin: Actor,
        vehicle_id: Uuid,
        address_id: Uuid,
    }

    fn harness_with(
        requests: Option<Arc<dyn DeliveryRequestStore>>,
        store: Arc<InMemoryStore>,
        max_conflict_retries: u32,
    ) -> Harness {
        let (publisher, effects) = SideEffectPublisher::channel();
        let requests = requests.unwrap_or_else(|| store.clone() as Arc<dyn DeliveryRequestStore>);
        let orchestrator = DeliveryOrchestrator::new(
            requests,
            FeeResolver::new(store.clone()),
            TransitionEngine::default(),
            publisher,
        )
        .with_max_conflict_retries(max_conflict_retries);
        Harness {
            store,
            orchestrator,
            effects,
            client: Actor::client(Uuid::new_v4()),
            admin: Actor::admin(Uuid::new_v4()),
            vehicle_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
        }
    }

    fn harness() -> Harness {
        harness_with(None, Arc::new(InMemoryStore::new()), 1)
    }

    impl Harness {
        async fn price_address(&self, cents: i64) {
            self.store
                .add_fee(CollectionFee {
                    id: Uuid::new_v4(),
                    client_id: self.client.id,
                    address_id: self.address_id,
                    status: CollectionFeeStatus::Approved,
                    fee_amount: Some(Decimal::new(cents, 2)),
                    updated_at: Utc::now(),
                })
                .await;
        }

        fn delivery(
            &self,
            address_id: Uuid,
            desired_date: NaiveDate,
            fee_amount: Option<Decimal>,
        ) -> ProposeDateCommand {
            ProposeDateCommand {
                target: ProposalTarget::Vehicle {
                    vehicle_id: self.vehicle_id,
                    client_id: self.client.id,
                    address_id: Some(address_id),
                    collection_address_id: None,
                },
                desired_date,
                fee_amount,
                notes: None,
            }
        }

        fn pickup(&self, desired_date: NaiveDate) -> ProposeDateCommand {
            ProposeDateCommand {
                target: ProposalTarget::Vehicle {
                    vehicle_id: self.vehicle_id,
                    client_id: self.client.id,
                    address_id: None,
                    collection_address_id: Some(self.address_id),
                },
                desired_date,
                fee_amount: None,
                notes: None,
            }
        }
    }

    #[tokio::test]
    async fn pickup_without_fee_is_rejected_and_nothing_is_written() {
        let h = harness();

        let result = h.orchestrator.propose_date(&h.client, h.pickup(date(2025, 9, 10))).await;

        assert!(matches!(result, Err(AppError::PricingRequired)));
        assert!(h.store.requests().await.is_empty());
        assert!(h.store.events().await.is_empty());
    }

    #[tokio::test]
    async fn zero_fee_counts_as_unpriced() {
        let h = harness();
        h.price_address(0).await;

        let result = h.orchestrator.propose_date(&h.client, h.pickup(date(2025, 9, 10))).await;
        assert!(matches!(result, Err(AppError::PricingRequired)));
    }

    #[tokio::test]
    async fn priced_pickup_opens_request_and_publishes_projection() {
        let mut h = harness();
        h.price_address(5000).await;

        let outcome = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        assert_eq!(outcome.request.status, DeliveryStatus::Requested);
        assert_eq!(outcome.request.created_by, h.client.id);
        assert_eq!(outcome.request.fee_amount, Some(Decimal::new(5000, 2)));
        assert_eq!(outcome.event.event_type, DeliveryEventType::Proposed);
        assert!(outcome.warnings.is_empty());

        let effect = h.effects.try_recv().unwrap();
        assert_eq!(effect.vehicle_id, h.vehicle_id);
        assert_eq!(effect.vehicle_status, "Pickup Pending Confirmation");
        assert_eq!(
            effect.notification.map(|n| n.audience),
            Some(Audience::Staff)
        );
    }

    #[tokio::test]
    async fn proposing_again_for_the_vehicle_counter_proposes_on_the_active_request() {
        let h = harness();
        h.price_address(5000).await;
        let first = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        let counter = h
            .orchestrator
            .propose_date(&h.admin, h.pickup(date(2025, 9, 12)))
            .await
            .unwrap();

        assert_eq!(counter.request.id, first.request.id);
        assert_eq!(counter.request.created_by, h.admin.id);
        assert_eq!(counter.request.proposed_by(), crate::models::ProposedBy::Admin);
        assert_eq!(h.store.requests().await.len(), 1);
        assert_eq!(h.store.events().await.len(), 2);
    }

    #[tokio::test]
    async fn delivery_needs_no_fee_and_keeps_its_own_amount() {
        let h = harness();
        let command = ProposeDateCommand {
            target: ProposalTarget::Vehicle {
                vehicle_id: h.vehicle_id,
                client_id: h.client.id,
                address_id: Some(h.address_id),
                collection_address_id: None,
            },
            desired_date: date(2025, 10, 1),
            fee_amount: Some(Decimal::new(7500, 2)),
            notes: None,
        };

        let outcome = h.orchestrator.propose_date(&h.admin, command).await.unwrap();
        assert_eq!(outcome.request.kind(), RequestKind::Delivery);
        assert_eq!(outcome.request.fee_amount, Some(Decimal::new(7500, 2)));
        assert_eq!(outcome.vehicle_status, "Delivery Pending Confirmation");
    }

    #[tokio::test]
    async fn delivery_to_another_address_does_not_touch_the_active_request() {
        let h = harness();
        let (home, office) = (Uuid::new_v4(), Uuid::new_v4());
        let opened = h
            .orchestrator
            .propose_date(&h.admin, h.delivery(home, date(2025, 10, 1), Some(Decimal::new(7500, 2))))
            .await
            .unwrap();

        let result = h
            .orchestrator
            .propose_date(&h.admin, h.delivery(office, date(2025, 10, 3), Some(Decimal::new(9900, 2))))
            .await;

        assert!(matches!(result, Err(AppError::ActiveRequestExists(_))));
        let stored = h.store.find_by_id(opened.request.id).await.unwrap().unwrap();
        assert_eq!(stored.address_id, Some(home));
        assert_eq!(stored.desired_date, date(2025, 10, 1));
        assert_eq!(stored.fee_amount, Some(Decimal::new(7500, 2)));
        assert_eq!(h.store.events().await.len(), 1);
    }

    #[tokio::test]
    async fn pickup_from_another_collection_address_is_refused() {
        let h = harness();
        h.price_address(5000).await;
        h.orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        let mut elsewhere = h.pickup(date(2025, 9, 12));
        if let ProposalTarget::Vehicle { collection_address_id, .. } = &mut elsewhere.target {
            *collection_address_id = Some(Uuid::new_v4());
        }
        let result = h.orchestrator.propose_date(&h.admin, elsewhere).await;

        assert!(matches!(result, Err(AppError::ActiveRequestExists(_))));
        assert_eq!(h.store.events().await.len(), 1);
    }

    #[tokio::test]
    async fn delivery_counter_proposal_carries_its_fee() {
        let h = harness();
        let address = Uuid::new_v4();
        let opened = h
            .orchestrator
            .propose_date(&h.client, h.delivery(address, date(2025, 10, 1), Some(Decimal::new(7500, 2))))
            .await
            .unwrap();

        let counter = h
            .orchestrator
            .propose_date(
                &h.admin,
                ProposeDateCommand {
                    target: ProposalTarget::Existing(opened.request.id),
                    desired_date: date(2025, 10, 2),
                    fee_amount: Some(Decimal::new(9900, 2)),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(counter.request.fee_amount, Some(Decimal::new(9900, 2)));

        let kept = h
            .orchestrator
            .propose_date(&h.client, h.delivery(address, date(2025, 10, 4), None))
            .await
            .unwrap();
        assert_eq!(kept.request.id, opened.request.id);
        assert_eq!(kept.request.fee_amount, Some(Decimal::new(9900, 2)));
    }

    #[tokio::test]
    async fn pickup_proposals_do_not_accept_a_fee_amount() {
        let h = harness();
        h.price_address(5000).await;
        let mut command = h.pickup(date(2025, 9, 10));
        command.fee_amount = Some(Decimal::new(100, 2));

        let result = h.orchestrator.propose_date(&h.client, command).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(h.store.requests().await.is_empty());
    }

    #[tokio::test]
    async fn staff_proposal_needs_the_client_to_approve() {
        let h = harness();
        let opened = h
            .orchestrator
            .propose_date(&h.admin, h.delivery(Uuid::new_v4(), date(2025, 10, 1), None))
            .await
            .unwrap();

        let specialist = Actor::specialist(Uuid::new_v4());
        let result = h.orchestrator.approve(&specialist, opened.request.id, None).await;
        assert!(matches!(result, Err(AppError::SelfApproval)));

        let approved = h
            .orchestrator
            .approve(&h.client, opened.request.id, None)
            .await
            .unwrap();
        assert_eq!(approved.request.status, DeliveryStatus::Approved);
    }

    #[tokio::test]
    async fn ownership_is_checked_before_pricing() {
        let h = harness();
        // Recogida sin tarifa vigente para su dirección
        let unpriced_row = request(DeliveryStatus::Requested, None);
        h.store.put_request(unpriced_row.clone()).await;

        let stranger = Actor::client(Uuid::new_v4());
        let result = h
            .orchestrator
            .propose_date(
                &stranger,
                ProposeDateCommand {
                    target: ProposalTarget::Existing(unpriced_row.id),
                    desired_date: date(2025, 9, 12),
                    fee_amount: None,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut unpriced = h.pickup(date(2025, 9, 12));
        if let ProposalTarget::Vehicle { vehicle_id, client_id, .. } = &mut unpriced.target {
            *vehicle_id = Uuid::new_v4();
            *client_id = Uuid::new_v4();
        }
        let result = h.orchestrator.propose_date(&stranger, unpriced).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn concurrent_approvals_yield_exactly_one_success() {
        let h = harness();
        h.price_address(5000).await;
        let opened = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        let other_admin = Actor::admin(Uuid::new_v4());
        let (a, b) = tokio::join!(
            h.orchestrator.approve(&h.admin, opened.request.id, None),
            h.orchestrator.approve(&other_admin, opened.request.id, None)
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(
            failure,
            AppError::InvalidTransition(_) | AppError::ConcurrentModification(_)
        ));
        assert_eq!(h.store.list_events(opened.request.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn conflict_is_retried_then_re_evaluated() {
        let store = Arc::new(InMemoryStore::new());
        let racing = Arc::new(RacingStore {
            inner: store.clone(),
            race_to: Mutex::new(None),
        });
        let h = harness_with(Some(racing.clone() as Arc<dyn DeliveryRequestStore>), store, 1);
        h.price_address(5000).await;
        let opened = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        // Otro actor aprueba entre nuestra lectura y nuestra escritura
        *racing.race_to.lock().unwrap() = Some(DeliveryStatus::Approved);
        let outcome = h
            .orchestrator
            .cancel(&h.admin, opened.request.id, None)
            .await
            .unwrap();

        assert_eq!(outcome.event.status_from, Some(DeliveryStatus::Approved));
        assert_eq!(outcome.request.status, DeliveryStatus::Canceled);
    }

    #[tokio::test]
    async fn conflict_after_retries_surfaces_as_concurrent_modification() {
        let store = Arc::new(InMemoryStore::new());
        let racing = Arc::new(RacingStore {
            inner: store.clone(),
            race_to: Mutex::new(None),
        });
        let h = harness_with(Some(racing.clone() as Arc<dyn DeliveryRequestStore>), store, 0);
        h.price_address(5000).await;
        let opened = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        *racing.race_to.lock().unwrap() = Some(DeliveryStatus::Approved);
        let result = h.orchestrator.cancel(&h.admin, opened.request.id, None).await;

        assert!(matches!(result, Err(AppError::ConcurrentModification(_))));
        // Solo el evento de creación
        assert_eq!(h.store.list_events(opened.request.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_projector_only_produces_a_warning() {
        let mut h = harness();
        h.price_address(5000).await;
        h.effects.close();

        let outcome = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(h.store.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let h = harness();
        let result = h.orchestrator.approve(&h.admin, Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn clients_cannot_read_other_clients_requests() {
        let h = harness();
        h.price_address(5000).await;
        let opened = h
            .orchestrator
            .propose_date(&h.client, h.pickup(date(2025, 9, 10)))
            .await
            .unwrap();

        let stranger = Actor::client(Uuid::new_v4());
        let result = h.orchestrator.get(&stranger, opened.request.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let history = h.orchestrator.history(&h.client, opened.request.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
