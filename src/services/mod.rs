//! Services module
//!
//! Este módulo contiene la lógica de negocio del ciclo de vida de
//! recogidas y entregas: el motor de transiciones puro, la resolución de
//! tarifas, el orquestador que escribe, los efectos secundarios asíncronos
//! y las vistas de lectura.

pub mod delivery_orchestrator;
pub mod fee_resolver;
pub mod notifications;
pub mod read_aggregation;
pub mod side_effects;
pub mod transition_engine;

pub use delivery_orchestrator::{
    DeliveryOrchestrator, ProposalTarget, ProposeDateCommand, TransitionOutcome,
};
pub use fee_resolver::FeeResolver;
pub use notifications::{LogNotificationSink, NotificationSink, WebhookNotificationSink};
pub use read_aggregation::ReadAggregator;
pub use side_effects::{SideEffect, SideEffectProjector, SideEffectPublisher};
pub use transition_engine::{BusinessHours, TransitionEngine};
