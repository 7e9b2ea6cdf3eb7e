//! Store en memoria
//!
//! Implementa los mismos contratos que los repositorios PostgreSQL,
//! incluida la escritura condicional y el índice de solicitud activa.
//! Se usa en los tests y para levantar el servicio sin base de datos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CollectionFeeStore, DeliveryRequestStore, DisplayDirectory, VehicleProjectionWriter};
use crate::models::{
    CollectionFee, DeliveryRequest, DeliveryRequestEvent, DeliveryStatus, RequestKind,
    VehicleDisplay, VehicleHistoryEntry,
};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    requests: HashMap<Uuid, DeliveryRequest>,
    events: Vec<DeliveryRequestEvent>,
    fees: Vec<CollectionFee>,
    vehicle_status: HashMap<Uuid, String>,
    vehicle_history: Vec<VehicleHistoryEntry>,
    displays: HashMap<Uuid, VehicleDisplay>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_vehicle_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_fee(&self, fee: CollectionFee) {
        self.tables.write().await.fees.push(fee);
    }

    pub async fn add_vehicle_display(&self, display: VehicleDisplay) {
        self.tables.write().await.displays.insert(display.vehicle_id, display);
    }

    /// Inserta o reemplaza una fila tal cual, sin evento
    pub async fn put_request(&self, request: DeliveryRequest) {
        self.tables.write().await.requests.insert(request.id, request);
    }

    pub async fn requests(&self) -> Vec<DeliveryRequest> {
        self.tables.read().await.requests.values().cloned().collect()
    }

    pub async fn events(&self) -> Vec<DeliveryRequestEvent> {
        self.tables.read().await.events.clone()
    }

    pub async fn vehicle_status(&self, vehicle_id: Uuid) -> Option<String> {
        self.tables.read().await.vehicle_status.get(&vehicle_id).cloned()
    }

    pub async fn vehicle_history(&self, vehicle_id: Uuid) -> Vec<VehicleHistoryEntry> {
        self.tables
            .read()
            .await
            .vehicle_history
            .iter()
            .filter(|entry| entry.vehicle_id == vehicle_id)
            .cloned()
            .collect()
    }

    /// Simula la caída de las proyecciones del vehículo
    pub fn set_vehicle_writes_failing(&self, failing: bool) {
        self.fail_vehicle_writes.store(failing, Ordering::SeqCst);
    }

    fn check_vehicle_writes(&self) -> AppResult<()> {
        if self.fail_vehicle_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("vehicle projection unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryRequestStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DeliveryRequest>> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn find_active_for_vehicle(
        &self,
        vehicle_id: Uuid,
        kind: RequestKind,
    ) -> AppResult<Option<DeliveryRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.vehicle_id == vehicle_id && r.kind() == kind && r.status.is_active())
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert_with_event(
        &self,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<DeliveryRequest> {
        let mut tables = self.tables.write().await;

        let kind = request.kind();
        let clash = tables.requests.values().any(|r| {
            r.vehicle_id == request.vehicle_id && r.kind() == kind && r.status.is_active()
        });
        if request.status.is_active() && clash {
            return Err(AppError::ActiveRequestExists(format!(
                "vehicle {} already has an active {} request",
                request.vehicle_id, kind
            )));
        }
        if tables.requests.contains_key(&request.id) {
            return Err(AppError::StoreUnavailable(format!(
                "duplicate delivery request id {}",
                request.id
            )));
        }

        tables.requests.insert(request.id, request.clone());
        tables.events.push(event.clone());
        Ok(request.clone())
    }

    async fn update_if_status(
        &self,
        expected: DeliveryStatus,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<Option<DeliveryRequest>> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        match tables.requests.get_mut(&request.id) {
            Some(row) if row.status == expected => {
                // address_id y el resto de la identidad no cambian
                row.status = request.status;
                row.desired_date = request.desired_date;
                row.window_start = request.window_start;
                row.window_end = request.window_end;
                row.scheduled_at = request.scheduled_at;
                row.created_by = request.created_by;
                row.fee_amount = request.fee_amount;
                row.updated_at = request.updated_at;
                let saved = row.clone();
                tables.events.push(event.clone());
                Ok(Some(saved))
            }
            _ => Ok(None),
        }
    }

    async fn list_events(&self, request_id: Uuid) -> AppResult<Vec<DeliveryRequestEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        statuses: &[DeliveryStatus],
        client_id: Option<Uuid>,
    ) -> AppResult<Vec<DeliveryRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<DeliveryRequest> = tables
            .requests
            .values()
            .filter(|r| statuses.contains(&r.status))
            .filter(|r| client_id.map_or(true, |id| r.client_id == id))
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            a.desired_date
                .cmp(&b.desired_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(requests)
    }
}

#[async_trait]
impl CollectionFeeStore for InMemoryStore {
    async fn find_live_fees(
        &self,
        client_id: Uuid,
        address_id: Uuid,
    ) -> AppResult<Vec<CollectionFee>> {
        let tables = self.tables.read().await;
        Ok(tables
            .fees
            .iter()
            .filter(|f| f.client_id == client_id && f.address_id == address_id && f.status.is_live())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VehicleProjectionWriter for InMemoryStore {
    async fn set_status(&self, vehicle_id: Uuid, label: &str) -> AppResult<()> {
        self.check_vehicle_writes()?;
        self.tables
            .write()
            .await
            .vehicle_status
            .insert(vehicle_id, label.to_string());
        Ok(())
    }

    async fn append_history(&self, entry: &VehicleHistoryEntry) -> AppResult<()> {
        self.check_vehicle_writes()?;
        self.tables.write().await.vehicle_history.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl DisplayDirectory for InMemoryStore {
    async fn vehicle_displays(&self, vehicle_ids: &[Uuid]) -> AppResult<HashMap<Uuid, VehicleDisplay>> {
        let tables = self.tables.read().await;
        Ok(vehicle_ids
            .iter()
            .filter_map(|id| tables.displays.get(id).map(|d| (*id, d.clone())))
            .collect())
    }
}
