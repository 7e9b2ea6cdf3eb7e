use std::sync::Arc;
use uuid::Uuid;

use crate::dto::delivery_dto::{
    DecisionRequest, DecisionResponse, DeliveryEventResponse, DeliveryRequestResponse,
    ExecutionResponse, ProposeDateRequest, ProposeDateResponse, ScheduleRequest, ScheduleResponse,
};
use crate::dto::ApiResponse;
use crate::models::{Actor, ActorRole};
use crate::services::read_aggregation::{ApprovalGroup, ClientDeliverySummary, ScheduledItem};
use crate::services::{DeliveryOrchestrator, ReadAggregator};
use crate::state::AppState;
use crate::utils::errors::{validation_error, AppError};
use validator::Validate;

pub struct DeliveryController {
    orchestrator: Arc<DeliveryOrchestrator>,
    aggregator: Arc<ReadAggregator>,
}

impl DeliveryController {
    pub fn new(state: &AppState) -> Self {
        Self {
            orchestrator: state.orchestrator.clone(),
            aggregator: state.aggregator.clone(),
        }
    }

    pub async fn propose_date(
        &self,
        actor: Actor,
        request: ProposeDateRequest,
    ) -> Result<ApiResponse<ProposeDateResponse>, AppError> {
        let default_client = (actor.role == ActorRole::Client).then_some(actor.id);
        let command = request.into_command(default_client)?;
        let outcome = self.orchestrator.propose_date(&actor, command).await?;

        Ok(ApiResponse::success_with_message(
            outcome.into(),
            "Fecha propuesta".to_string(),
        ))
    }

    pub async fn approve(
        &self,
        actor: Actor,
        request_id: Uuid,
        request: DecisionRequest,
    ) -> Result<ApiResponse<DecisionResponse>, AppError> {
        request.validate()?;
        let outcome = self
            .orchestrator
            .approve(&actor, request_id, request.notes)
            .await?;
        Ok(ApiResponse::success(outcome.into()))
    }

    pub async fn reject(
        &self,
        actor: Actor,
        request_id: Uuid,
        request: DecisionRequest,
    ) -> Result<ApiResponse<DecisionResponse>, AppError> {
        request.validate()?;
        let outcome = self
            .orchestrator
            .reject(&actor, request_id, request.notes)
            .await?;
        Ok(ApiResponse::success(outcome.into()))
    }

    pub async fn cancel(
        &self,
        actor: Actor,
        request_id: Uuid,
        request: DecisionRequest,
    ) -> Result<ApiResponse<DecisionResponse>, AppError> {
        request.validate()?;
        let outcome = self
            .orchestrator
            .cancel(&actor, request_id, request.notes)
            .await?;
        Ok(ApiResponse::success(outcome.into()))
    }

    pub async fn schedule(
        &self,
        actor: Actor,
        request_id: Uuid,
        request: ScheduleRequest,
    ) -> Result<ApiResponse<ScheduleResponse>, AppError> {
        let window = request.window()?;
        let outcome = self
            .orchestrator
            .schedule(&actor, request_id, window, request.notes)
            .await?;
        Ok(ApiResponse::success(outcome.into()))
    }

    pub async fn mark_in_transit(
        &self,
        actor: Actor,
        request_id: Uuid,
    ) -> Result<ApiResponse<ExecutionResponse>, AppError> {
        let outcome = self.orchestrator.mark_in_transit(&actor, request_id).await?;
        Ok(ApiResponse::success(outcome.into()))
    }

    pub async fn mark_delivered(
        &self,
        actor: Actor,
        request_id: Uuid,
    ) -> Result<ApiResponse<ExecutionResponse>, AppError> {
        let outcome = self.orchestrator.mark_delivered(&actor, request_id).await?;
        let message = format!("Vehículo marcado como '{}'", outcome.vehicle_status);
        Ok(ApiResponse::success_with_message(outcome.into(), message))
    }

    pub async fn get_by_id(
        &self,
        actor: Actor,
        request_id: Uuid,
    ) -> Result<ApiResponse<DeliveryRequestResponse>, AppError> {
        let request = self.orchestrator.get(&actor, request_id).await?;
        Ok(ApiResponse::success(request.into()))
    }

    pub async fn events(
        &self,
        actor: Actor,
        request_id: Uuid,
    ) -> Result<ApiResponse<Vec<DeliveryEventResponse>>, AppError> {
        let events = self.orchestrator.history(&actor, request_id).await?;
        Ok(ApiResponse::success(
            events.into_iter().map(DeliveryEventResponse::from).collect(),
        ))
    }

    pub async fn client_summary(
        &self,
        actor: Actor,
        client_id: Option<Uuid>,
    ) -> Result<ApiResponse<ClientDeliverySummary>, AppError> {
        let client_id = match (client_id, actor.role) {
            (Some(id), _) => id,
            (None, ActorRole::Client) => actor.id,
            (None, _) => {
                return Err(validation_error(
                    "client_id",
                    "clientId is required for staff",
                ))
            }
        };
        let summary = self.aggregator.client_summary(&actor, client_id).await?;
        Ok(ApiResponse::success(summary))
    }

    pub async fn approval_queue(
        &self,
        actor: Actor,
        client_id: Option<Uuid>,
    ) -> Result<ApiResponse<Vec<ApprovalGroup>>, AppError> {
        let groups = self.aggregator.approval_queue(&actor, client_id).await?;
        Ok(ApiResponse::success(groups))
    }

    pub async fn scheduled_work_list(
        &self,
        actor: Actor,
        client_id: Option<Uuid>,
    ) -> Result<ApiResponse<Vec<ScheduledItem>>, AppError> {
        let items = self
            .aggregator
            .scheduled_work_list(&actor, client_id)
            .await?;
        Ok(ApiResponse::success(items))
    }
}
