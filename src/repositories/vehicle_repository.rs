use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::{DisplayDirectory, VehicleProjectionWriter};
use crate::models::{VehicleDisplay, VehicleHistoryEntry};
use crate::utils::errors::{not_found_error, AppResult};

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleProjectionWriter for VehicleRepository {
    async fn set_status(&self, vehicle_id: Uuid, label: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE vehicles SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(vehicle_id)
            .bind(label)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found_error("Vehicle", &vehicle_id.to_string()));
        }

        Ok(())
    }

    async fn append_history(&self, entry: &VehicleHistoryEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicle_history (id, vehicle_id, request_id, status_label, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.vehicle_id)
        .bind(entry.request_id)
        .bind(&entry.status_label)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DisplayDirectory for VehicleRepository {
    async fn vehicle_displays(&self, vehicle_ids: &[Uuid]) -> AppResult<HashMap<Uuid, VehicleDisplay>> {
        if vehicle_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, VehicleDisplay>(
            r#"
            SELECT v.id AS vehicle_id, v.license_plate, v.brand, v.model,
                   c.id AS client_id, c.full_name AS client_name, c.phone AS client_phone
            FROM vehicles v
            JOIN clients c ON c.id = v.client_id
            WHERE v.id = ANY($1)
            "#,
        )
        .bind(vehicle_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.vehicle_id, row)).collect())
    }
}
