//! Repositorios
//!
//! Contratos del record store que consume el orquestador y sus
//! implementaciones: PostgreSQL para producción y memoria para tests y
//! desarrollo local. El orquestador recibe los handles en su constructor.

pub mod collection_fee_repository;
pub mod delivery_request_repository;
pub mod memory;
pub mod vehicle_repository;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    CollectionFee, DeliveryRequest, DeliveryRequestEvent, DeliveryStatus, RequestKind,
    VehicleDisplay, VehicleHistoryEntry,
};
use crate::utils::errors::AppResult;

pub use collection_fee_repository::CollectionFeeRepository;
pub use delivery_request_repository::DeliveryRequestRepository;
pub use memory::InMemoryStore;
pub use vehicle_repository::VehicleRepository;

/// Tablas delivery_requests + delivery_request_events
#[async_trait]
pub trait DeliveryRequestStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DeliveryRequest>>;

    /// Solicitud activa (Requested/Approved/Scheduled) del vehículo para ese tipo
    async fn find_active_for_vehicle(
        &self,
        vehicle_id: Uuid,
        kind: RequestKind,
    ) -> AppResult<Option<DeliveryRequest>>;

    /// Inserta la solicitud y su primer evento en una sola transacción.
    /// Falla con `ActiveRequestExists` si ya hay una activa del mismo tipo.
    async fn insert_with_event(
        &self,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<DeliveryRequest>;

    /// Escritura condicional: solo aplica si la fila sigue en `expected`.
    /// Devuelve `None` cuando no coincidió ninguna fila.
    async fn update_if_status(
        &self,
        expected: DeliveryStatus,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<Option<DeliveryRequest>>;

    /// Eventos de la solicitud en orden de creación
    async fn list_events(&self, request_id: Uuid) -> AppResult<Vec<DeliveryRequestEvent>>;

    async fn list_by_status(
        &self,
        statuses: &[DeliveryStatus],
        client_id: Option<Uuid>,
    ) -> AppResult<Vec<DeliveryRequest>>;
}

/// Lectura de tarifas de recogida
#[async_trait]
pub trait CollectionFeeStore: Send + Sync {
    /// Registros en estado vivo (requested/approved) para cliente + dirección
    async fn find_live_fees(&self, client_id: Uuid, address_id: Uuid)
        -> AppResult<Vec<CollectionFee>>;
}

/// Escrituras de proyección sobre el vehículo (best-effort)
#[async_trait]
pub trait VehicleProjectionWriter: Send + Sync {
    async fn set_status(&self, vehicle_id: Uuid, label: &str) -> AppResult<()>;

    async fn append_history(&self, entry: &VehicleHistoryEntry) -> AppResult<()>;
}

/// Datos de visualización de vehículos y clientes para las lecturas
#[async_trait]
pub trait DisplayDirectory: Send + Sync {
    async fn vehicle_displays(&self, vehicle_ids: &[Uuid]) -> AppResult<HashMap<Uuid, VehicleDisplay>>;
}
