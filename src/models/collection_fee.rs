//! Modelo de CollectionFee
//!
//! Tarifa de recogida acordada para un cliente y una dirección. Este
//! servicio solo la lee: decide si se puede proponer una fecha de recogida.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del registro de tarifa - mapea al ENUM collection_fee_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "collection_fee_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollectionFeeStatus {
    Requested,
    Approved,
    Declined,
    Superseded,
}

impl CollectionFeeStatus {
    pub const LIVE: [CollectionFeeStatus; 2] =
        [CollectionFeeStatus::Requested, CollectionFeeStatus::Approved];

    pub fn is_live(self) -> bool {
        Self::LIVE.contains(&self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CollectionFee {
    pub id: Uuid,
    pub client_id: Uuid,
    pub address_id: Uuid,
    pub status: CollectionFeeStatus,
    pub fee_amount: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionFee {
    /// Importe utilizable: presente y estrictamente positivo
    pub fn valid_amount(&self) -> Option<Decimal> {
        self.fee_amount.filter(|amount| *amount > Decimal::ZERO)
    }
}
