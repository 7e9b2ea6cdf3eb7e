use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::DeliveryRequestStore;
use crate::models::{DeliveryRequest, DeliveryRequestEvent, DeliveryStatus, RequestKind};
use crate::utils::errors::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";

pub struct DeliveryRequestRepository {
    pool: PgPool,
}

impl DeliveryRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_event(
        conn: &mut PgConnection,
        event: &DeliveryRequestEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO delivery_request_events
                (id, request_id, event_type, status_from, status_to, actor_id, actor_role, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id)
        .bind(event.request_id)
        .bind(event.event_type)
        .bind(event.status_from)
        .bind(event.status_to)
        .bind(event.actor_id)
        .bind(event.actor_role)
        .bind(&event.notes)
        .bind(event.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}

fn status_names(statuses: &[DeliveryStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl DeliveryRequestStore for DeliveryRequestRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DeliveryRequest>> {
        let request = sqlx::query_as::<_, DeliveryRequest>(
            "SELECT * FROM delivery_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn find_active_for_vehicle(
        &self,
        vehicle_id: Uuid,
        kind: RequestKind,
    ) -> AppResult<Option<DeliveryRequest>> {
        let request = sqlx::query_as::<_, DeliveryRequest>(
            r#"
            SELECT * FROM delivery_requests
            WHERE vehicle_id = $1
              AND (address_id IS NULL) = $2
              AND status::text = ANY($3)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(vehicle_id)
        .bind(kind == RequestKind::Pickup)
        .bind(status_names(&DeliveryStatus::ACTIVE))
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn insert_with_event(
        &self,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<DeliveryRequest> {
        let mut tx = self.pool.begin().await?;

        // El índice único parcial garantiza una sola solicitud activa por vehículo y tipo
        let inserted = sqlx::query_as::<_, DeliveryRequest>(
            r#"
            INSERT INTO delivery_requests
                (id, vehicle_id, client_id, address_id, collection_address_id, status, desired_date,
                 window_start, window_end, scheduled_at, created_by, fee_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.vehicle_id)
        .bind(request.client_id)
        .bind(request.address_id)
        .bind(request.collection_address_id)
        .bind(request.status)
        .bind(request.desired_date)
        .bind(request.window_start)
        .bind(request.window_end)
        .bind(request.scheduled_at)
        .bind(request.created_by)
        .bind(request.fee_amount)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return AppError::ActiveRequestExists(format!(
                        "vehicle {} already has an active {} request",
                        request.vehicle_id,
                        request.kind()
                    ));
                }
            }
            AppError::from(e)
        })?;

        Self::insert_event(&mut *tx, event).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn update_if_status(
        &self,
        expected: DeliveryStatus,
        request: &DeliveryRequest,
        event: &DeliveryRequestEvent,
    ) -> AppResult<Option<DeliveryRequest>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, DeliveryRequest>(
            r#"
            UPDATE delivery_requests
            SET status = $3, desired_date = $4, window_start = $5, window_end = $6,
                scheduled_at = $7, created_by = $8, fee_amount = $9, updated_at = $10
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(expected)
        .bind(request.status)
        .bind(request.desired_date)
        .bind(request.window_start)
        .bind(request.window_end)
        .bind(request.scheduled_at)
        .bind(request.created_by)
        .bind(request.fee_amount)
        .bind(request.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        Self::insert_event(&mut *tx, event).await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn list_events(&self, request_id: Uuid) -> AppResult<Vec<DeliveryRequestEvent>> {
        let events = sqlx::query_as::<_, DeliveryRequestEvent>(
            "SELECT * FROM delivery_request_events WHERE request_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn list_by_status(
        &self,
        statuses: &[DeliveryStatus],
        client_id: Option<Uuid>,
    ) -> AppResult<Vec<DeliveryRequest>> {
        let requests = sqlx::query_as::<_, DeliveryRequest>(
            r#"
            SELECT * FROM delivery_requests
            WHERE status::text = ANY($1)
              AND ($2::uuid IS NULL OR client_id = $2)
            ORDER BY desired_date ASC, created_at ASC
            "#,
        )
        .bind(status_names(statuses))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }
}
