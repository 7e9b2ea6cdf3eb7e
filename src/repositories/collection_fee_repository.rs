use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::CollectionFeeStore;
use crate::models::CollectionFee;
use crate::utils::errors::AppResult;

pub struct CollectionFeeRepository {
    pool: PgPool,
}

impl CollectionFeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionFeeStore for CollectionFeeRepository {
    async fn find_live_fees(
        &self,
        client_id: Uuid,
        address_id: Uuid,
    ) -> AppResult<Vec<CollectionFee>> {
        // Se filtra por id de dirección, nunca por la etiqueta formateada
        let fees = sqlx::query_as::<_, CollectionFee>(
            r#"
            SELECT id, client_id, address_id, status, fee_amount, updated_at
            FROM collection_fees
            WHERE client_id = $1
              AND address_id = $2
              AND status IN ('requested', 'approved')
            ORDER BY updated_at DESC
            "#,
        )
        .bind(client_id)
        .bind(address_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(fees)
    }
}
