//! Resolución de tarifas de recogida
//!
//! Una recogida solo se puede proponer si ya existe una tarifa positiva
//! para el cliente y la dirección. Puede haber varias filas históricas por
//! dirección y a menudo solo una antigua tiene importe: la relevante es la
//! más reciente *con* importe válido, no la más reciente a secas.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::CollectionFee;
use crate::repositories::CollectionFeeStore;
use crate::utils::errors::AppResult;

/// Registro relevante: vivo, con importe > 0, desempatado por `updated_at`
pub fn select_relevant_fee(records: &[CollectionFee]) -> Option<&CollectionFee> {
    records
        .iter()
        .filter(|fee| fee.status.is_live() && fee.valid_amount().is_some())
        .max_by_key(|fee| fee.updated_at)
}

#[derive(Clone)]
pub struct FeeResolver {
    store: Arc<dyn CollectionFeeStore>,
}

impl FeeResolver {
    pub fn new(store: Arc<dyn CollectionFeeStore>) -> Self {
        Self { store }
    }

    pub async fn resolve_fee(&self, client_id: Uuid, address_id: Uuid) -> AppResult<Option<Decimal>> {
        let records = self.store.find_live_fees(client_id, address_id).await?;
        let fee = select_relevant_fee(&records).and_then(CollectionFee::valid_amount);

        debug!(
            "💶 Tarifa para cliente {} / dirección {}: {:?} ({} registros)",
            client_id,
            address_id,
            fee,
            records.len()
        );

        Ok(fee)
    }

    pub async fn has_valid_fee(&self, client_id: Uuid, address_id: Uuid) -> AppResult<bool> {
        Ok(self.resolve_fee(client_id, address_id).await?.is_some())
    }
}
