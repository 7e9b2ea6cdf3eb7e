//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Los servicios reciben sus stores en la
//! construcción, así que el mismo estado sirve con PostgreSQL o en memoria.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::services::{DeliveryOrchestrator, ReadAggregator};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub orchestrator: Arc<DeliveryOrchestrator>,
    pub aggregator: Arc<ReadAggregator>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        orchestrator: DeliveryOrchestrator,
        aggregator: ReadAggregator,
    ) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            aggregator: Arc::new(aggregator),
        }
    }
}
