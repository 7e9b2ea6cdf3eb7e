//! Vistas de lectura para los dashboards
//!
//! Proyecciones derivadas de las solicitudes, recalculadas en cada lectura:
//! grupos pendientes de aprobación, negociaciones abiertas y la lista de
//! trabajo programado. No guardan estado propio y el estado visible del
//! vehículo se calcula aquí con la misma función pura que usa el proyector.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    vehicle_status_label, Actor, ActorRole, DeliveryRequest, DeliveryStatus, ProposedBy,
    RequestKind, VehicleDisplay,
};
use crate::repositories::{DeliveryRequestStore, DisplayDirectory};
use crate::utils::errors::{forbidden_error, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub request_id: Uuid,
    pub vehicle_id: Uuid,
    pub client_id: Uuid,
    pub address_id: Option<Uuid>,
    pub collection_address_id: Option<Uuid>,
    pub kind: RequestKind,
    pub status: DeliveryStatus,
    pub desired_date: NaiveDate,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub proposed_by: ProposedBy,
    pub vehicle_status: &'static str,
    pub fee_amount: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DeliveryRequest> for RequestSummary {
    fn from(request: &DeliveryRequest) -> Self {
        Self {
            request_id: request.id,
            vehicle_id: request.vehicle_id,
            client_id: request.client_id,
            address_id: request.address_id,
            collection_address_id: request.collection_address_id,
            kind: request.kind(),
            status: request.status,
            desired_date: request.desired_date,
            window_start: request.window_start,
            window_end: request.window_end,
            proposed_by: request.proposed_by(),
            vehicle_status: vehicle_status_label(request.kind(), request.status),
            fee_amount: request.fee_amount,
            updated_at: request.updated_at,
        }
    }
}

/// Solicitudes Requested/Approved de un cliente en una dirección
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalGroup {
    pub client_id: Uuid,
    pub address_id: Option<Uuid>,
    pub kind: RequestKind,
    pub requests: Vec<RequestSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationEntry {
    #[serde(flatten)]
    pub request: RequestSummary,
    /// Parte que debe responder a la propuesta vigente
    pub awaiting: ProposedBy,
}

/// Propuestas pendientes de respuesta de la contraparte
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationGroup {
    pub client_id: Uuid,
    pub address_id: Option<Uuid>,
    pub kind: RequestKind,
    pub entries: Vec<NegotiationEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    #[serde(flatten)]
    pub request: RequestSummary,
    /// Ausente si el vehículo ya no existe en el directorio
    pub vehicle: Option<VehicleDisplay>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientDeliverySummary {
    pub client_id: Uuid,
    pub pending_approval: Vec<ApprovalGroup>,
    pub negotiations: Vec<NegotiationGroup>,
    pub scheduled: Vec<ScheduledItem>,
}

type GroupKey = (Uuid, Option<Uuid>, RequestKind);

fn group_key(request: &DeliveryRequest) -> GroupKey {
    (request.client_id, request.client_address_id(), request.kind())
}

/// Agrupa por cliente + dirección (por id, nunca por etiqueta) + tipo
fn group_by_address<'a>(
    requests: impl Iterator<Item = &'a DeliveryRequest>,
) -> BTreeMap<GroupKey, Vec<&'a DeliveryRequest>> {
    let mut groups: BTreeMap<GroupKey, Vec<&DeliveryRequest>> = BTreeMap::new();
    for request in requests {
        groups.entry(group_key(request)).or_default().push(request);
    }
    groups
}

pub fn group_pending_approvals(requests: &[DeliveryRequest]) -> Vec<ApprovalGroup> {
    let pending = requests.iter().filter(|r| {
        matches!(r.status, DeliveryStatus::Requested | DeliveryStatus::Approved)
    });

    group_by_address(pending)
        .into_iter()
        .map(|((client_id, address_id, kind), members)| ApprovalGroup {
            client_id,
            address_id,
            kind,
            requests: members.into_iter().map(RequestSummary::from).collect(),
        })
        .collect()
}

/// Solo las propuestas abiertas (Requested) esperan una contradecisión
pub fn group_negotiations(requests: &[DeliveryRequest]) -> Vec<NegotiationGroup> {
    let open = requests
        .iter()
        .filter(|r| r.status == DeliveryStatus::Requested);

    group_by_address(open)
        .into_iter()
        .map(|((client_id, address_id, kind), members)| NegotiationGroup {
            client_id,
            address_id,
            kind,
            entries: members
                .into_iter()
                .map(|request| {
                    let summary = RequestSummary::from(request);
                    let awaiting = match summary.proposed_by {
                        ProposedBy::Client => ProposedBy::Admin,
                        ProposedBy::Admin => ProposedBy::Client,
                    };
                    NegotiationEntry {
                        request: summary,
                        awaiting,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Programadas ordenadas por inicio de ventana, con datos de visualización
pub fn scheduled_items(
    requests: &[DeliveryRequest],
    displays: &HashMap<Uuid, VehicleDisplay>,
) -> Vec<ScheduledItem> {
    let mut scheduled: Vec<&DeliveryRequest> = requests
        .iter()
        .filter(|r| r.status == DeliveryStatus::Scheduled)
        .collect();
    scheduled.sort_by_key(|r| (r.window_start, r.desired_date));

    scheduled
        .into_iter()
        .map(|request| ScheduledItem {
            request: RequestSummary::from(request),
            vehicle: displays.get(&request.vehicle_id).cloned(),
        })
        .collect()
}

pub struct ReadAggregator {
    requests: Arc<dyn DeliveryRequestStore>,
    directory: Arc<dyn DisplayDirectory>,
}

impl ReadAggregator {
    pub fn new(requests: Arc<dyn DeliveryRequestStore>, directory: Arc<dyn DisplayDirectory>) -> Self {
        Self {
            requests,
            directory,
        }
    }

    /// Vista completa de un cliente para su dashboard
    pub async fn client_summary(&self, actor: &Actor, client_id: Uuid) -> AppResult<ClientDeliverySummary> {
        if actor.role == ActorRole::Client && actor.id != client_id {
            return Err(forbidden_error(
                "read delivery summary",
                "clients can only read their own summary",
            ));
        }

        let active = self
            .requests
            .list_by_status(&DeliveryStatus::ACTIVE, Some(client_id))
            .await?;
        let displays = self.displays_for_scheduled(&active).await?;

        debug!(
            "📊 Resumen de cliente {}: {} solicitudes activas",
            client_id,
            active.len()
        );

        Ok(ClientDeliverySummary {
            client_id,
            pending_approval: group_pending_approvals(&active),
            negotiations: group_negotiations(&active),
            scheduled: scheduled_items(&active, &displays),
        })
    }

    /// Cola de aprobación de administración, opcionalmente filtrada por cliente
    pub async fn approval_queue(
        &self,
        actor: &Actor,
        client_id: Option<Uuid>,
    ) -> AppResult<Vec<ApprovalGroup>> {
        ensure_staff(actor, "read the approval queue")?;
        let pending = self
            .requests
            .list_by_status(&[DeliveryStatus::Requested, DeliveryStatus::Approved], client_id)
            .await?;
        Ok(group_pending_approvals(&pending))
    }

    /// Lista de trabajo de especialistas
    pub async fn scheduled_work_list(
        &self,
        actor: &Actor,
        client_id: Option<Uuid>,
    ) -> AppResult<Vec<ScheduledItem>> {
        ensure_staff(actor, "read the scheduled work list")?;
        let scheduled = self
            .requests
            .list_by_status(&[DeliveryStatus::Scheduled], client_id)
            .await?;
        let displays = self.displays_for_scheduled(&scheduled).await?;
        Ok(scheduled_items(&scheduled, &displays))
    }

    async fn displays_for_scheduled(
        &self,
        requests: &[DeliveryRequest],
    ) -> AppResult<HashMap<Uuid, VehicleDisplay>> {
        let mut vehicle_ids: Vec<Uuid> = requests
            .iter()
            .filter(|r| r.status == DeliveryStatus::Scheduled)
            .map(|r| r.vehicle_id)
            .collect();
        if vehicle_ids.is_empty() {
            return Ok(HashMap::new());
        }
        vehicle_ids.sort();
        vehicle_ids.dedup();
        self.directory.vehicle_displays(&vehicle_ids).await
    }
}

fn ensure_staff(actor: &Actor, operation: &str) -> AppResult<()> {
    if !actor.role.is_staff() {
        return Err(forbidden_error(
            operation,
            "only admins and specialists can read this list",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delivery_request::fixtures::{date, request};
    use crate::repositories::InMemoryStore;
    use crate::utils::errors::AppError;
    use chrono::TimeZone;

    fn for_client(
        client_id: Uuid,
        address: Uuid,
        status: DeliveryStatus,
        kind: RequestKind,
    ) -> DeliveryRequest {
        let mut r = match kind {
            RequestKind::Pickup => request(status, None),
            RequestKind::Delivery => request(status, Some(address)),
        };
        r.client_id = client_id;
        r.created_by = client_id;
        if kind == RequestKind::Pickup {
            r.collection_address_id = Some(address);
        }
        r
    }

    #[test]
    fn approval_groups_key_on_address_id_and_kind() {
        let client = Uuid::new_v4();
        let (home, office) = (Uuid::new_v4(), Uuid::new_v4());
        let requests = vec![
            for_client(client, home, DeliveryStatus::Requested, RequestKind::Pickup),
            for_client(client, home, DeliveryStatus::Approved, RequestKind::Pickup),
            for_client(client, office, DeliveryStatus::Requested, RequestKind::Pickup),
            for_client(client, home, DeliveryStatus::Requested, RequestKind::Delivery),
            for_client(client, home, DeliveryStatus::Scheduled, RequestKind::Pickup),
        ];

        let groups = group_pending_approvals(&requests);

        assert_eq!(groups.len(), 3);
        let home_pickups = groups
            .iter()
            .find(|g| g.address_id == Some(home) && g.kind == RequestKind::Pickup)
            .unwrap();
        assert_eq!(home_pickups.requests.len(), 2);
    }

    #[test]
    fn every_negotiation_entry_carries_attribution() {
        let client = Uuid::new_v4();
        let address = Uuid::new_v4();
        let mine = for_client(client, address, DeliveryStatus::Requested, RequestKind::Delivery);
        let mut countered = for_client(client, address, DeliveryStatus::Requested, RequestKind::Pickup);
        countered.created_by = Uuid::new_v4();
        let approved = for_client(client, address, DeliveryStatus::Approved, RequestKind::Pickup);

        let groups = group_negotiations(&[mine, countered, approved]);
        let entries: Vec<&NegotiationEntry> = groups.iter().flat_map(|g| &g.entries).collect();

        assert_eq!(entries.len(), 2);
        for entry in entries {
            match entry.request.kind {
                RequestKind::Delivery => {
                    assert_eq!(entry.request.proposed_by, ProposedBy::Client);
                    assert_eq!(entry.awaiting, ProposedBy::Admin);
                }
                RequestKind::Pickup => {
                    assert_eq!(entry.request.proposed_by, ProposedBy::Admin);
                    assert_eq!(entry.awaiting, ProposedBy::Client);
                }
            }
        }
    }

    #[test]
    fn negotiation_entries_serialize_proposed_by() {
        let client = Uuid::new_v4();
        let groups = group_negotiations(&[for_client(
            client,
            Uuid::new_v4(),
            DeliveryStatus::Requested,
            RequestKind::Pickup,
        )]);
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json[0]["entries"][0]["proposedBy"], "client");
        assert_eq!(json[0]["entries"][0]["vehicleStatus"], "Pickup Pending Confirmation");
    }

    #[test]
    fn scheduled_items_are_ordered_by_window() {
        let client = Uuid::new_v4();
        let address = Uuid::new_v4();
        let mut late = for_client(client, address, DeliveryStatus::Scheduled, RequestKind::Pickup);
        late.window_start = Some(Utc.with_ymd_and_hms(2025, 9, 12, 9, 0, 0).unwrap());
        let mut early = for_client(client, address, DeliveryStatus::Scheduled, RequestKind::Delivery);
        early.window_start = Some(Utc.with_ymd_and_hms(2025, 9, 11, 9, 0, 0).unwrap());
        early.desired_date = date(2025, 9, 11);

        let items = scheduled_items(&[late.clone(), early.clone()], &HashMap::new());

        assert_eq!(items[0].request.request_id, early.id);
        assert_eq!(items[1].request.request_id, late.id);
        assert_eq!(items[1].request.vehicle_status, "Awaiting Pickup");
        assert!(items[0].vehicle.is_none());
    }

    #[tokio::test]
    async fn client_summary_joins_display_data_for_scheduled_work() {
        let store = Arc::new(InMemoryStore::new());
        let client = Uuid::new_v4();
        let address = Uuid::new_v4();
        let scheduled = for_client(client, address, DeliveryStatus::Scheduled, RequestKind::Pickup);
        let pending = for_client(client, address, DeliveryStatus::Requested, RequestKind::Delivery);
        let finished = for_client(client, address, DeliveryStatus::Delivered, RequestKind::Delivery);
        for r in [&scheduled, &pending, &finished] {
            store.put_request(r.clone()).await;
        }
        store
            .add_vehicle_display(VehicleDisplay {
                vehicle_id: scheduled.vehicle_id,
                license_plate: "AB-123-CD".to_string(),
                brand: Some("Renault".to_string()),
                model: Some("Clio".to_string()),
                client_id: client,
                client_name: "Marie Curie".to_string(),
                client_phone: None,
            })
            .await;

        let aggregator = ReadAggregator::new(store.clone(), store.clone());
        let summary = aggregator
            .client_summary(&Actor::client(client), client)
            .await
            .unwrap();

        assert_eq!(summary.pending_approval.len(), 1);
        assert_eq!(summary.negotiations.len(), 1);
        assert_eq!(summary.scheduled.len(), 1);
        assert_eq!(
            summary.scheduled[0].vehicle.as_ref().map(|v| v.license_plate.as_str()),
            Some("AB-123-CD")
        );
    }

    #[tokio::test]
    async fn lists_respect_roles() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = ReadAggregator::new(store.clone(), store);
        let client = Actor::client(Uuid::new_v4());

        let other = aggregator.client_summary(&client, Uuid::new_v4()).await;
        assert!(matches!(other, Err(AppError::Forbidden(_))));

        let work = aggregator.scheduled_work_list(&client, None).await;
        assert!(matches!(work, Err(AppError::Forbidden(_))));

        let specialist = Actor::specialist(Uuid::new_v4());
        assert!(aggregator
            .scheduled_work_list(&specialist, None)
            .await
            .unwrap()
            .is_empty());
    }
}
