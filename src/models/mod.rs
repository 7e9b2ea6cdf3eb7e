//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema
//! PostgreSQL del ciclo de vida de recogidas y entregas.

pub mod collection_fee;
pub mod delivery_event;
pub mod delivery_request;
pub mod vehicle;

pub use collection_fee::{CollectionFee, CollectionFeeStatus};
pub use delivery_event::{Actor, ActorRole, DeliveryEventType, DeliveryRequestEvent};
pub use delivery_request::{DeliveryRequest, DeliveryStatus, DeliveryWindow, ProposedBy, RequestKind};
pub use vehicle::{vehicle_status_label, VehicleDisplay, VehicleHistoryEntry};
