use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::delivery_controller::DeliveryController;
use crate::dto::delivery_dto::{
    ClientFilterQuery, DecisionRequest, DecisionResponse, DeliveryEventResponse,
    DeliveryRequestResponse, ExecutionResponse, ProposeDateRequest, ProposeDateResponse,
    ScheduleRequest, ScheduleResponse,
};
use crate::dto::ApiResponse;
use crate::middleware::auth::AuthenticatedActor;
use crate::services::read_aggregation::{ApprovalGroup, ClientDeliverySummary, ScheduledItem};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_delivery_router() -> Router<AppState> {
    Router::new()
        .route("/proposals", post(propose_date))
        .route("/summary", get(client_summary))
        .route("/pending-approvals", get(approval_queue))
        .route("/scheduled", get(scheduled_work_list))
        .route("/:id", get(get_delivery_request))
        .route("/:id/events", get(list_events))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/schedule", post(schedule))
        .route("/:id/in-transit", post(mark_in_transit))
        .route("/:id/delivered", post(mark_delivered))
        .route("/:id/cancel", post(cancel))
}

async fn propose_date(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(request): Json<ProposeDateRequest>,
) -> Result<Json<ApiResponse<ProposeDateResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.propose_date(actor, request).await?;
    Ok(Json(response))
}

async fn approve(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    request: Option<Json<DecisionRequest>>,
) -> Result<Json<ApiResponse<DecisionResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let response = controller.approve(actor, id, request).await?;
    Ok(Json(response))
}

async fn reject(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    request: Option<Json<DecisionRequest>>,
) -> Result<Json<ApiResponse<DecisionResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let response = controller.reject(actor, id, request).await?;
    Ok(Json(response))
}

async fn cancel(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    request: Option<Json<DecisionRequest>>,
) -> Result<Json<ApiResponse<DecisionResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let response = controller.cancel(actor, id, request).await?;
    Ok(Json(response))
}

async fn schedule(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    request: Option<Json<ScheduleRequest>>,
) -> Result<Json<ApiResponse<ScheduleResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let response = controller.schedule(actor, id, request).await?;
    Ok(Json(response))
}

async fn mark_in_transit(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExecutionResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.mark_in_transit(actor, id).await?;
    Ok(Json(response))
}

async fn mark_delivered(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExecutionResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.mark_delivered(actor, id).await?;
    Ok(Json(response))
}

async fn get_delivery_request(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeliveryRequestResponse>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.get_by_id(actor, id).await?;
    Ok(Json(response))
}

async fn list_events(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<DeliveryEventResponse>>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.events(actor, id).await?;
    Ok(Json(response))
}

async fn client_summary(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ClientFilterQuery>,
) -> Result<Json<ApiResponse<ClientDeliverySummary>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.client_summary(actor, query.client_id).await?;
    Ok(Json(response))
}

async fn approval_queue(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ClientFilterQuery>,
) -> Result<Json<ApiResponse<Vec<ApprovalGroup>>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.approval_queue(actor, query.client_id).await?;
    Ok(Json(response))
}

async fn scheduled_work_list(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ClientFilterQuery>,
) -> Result<Json<ApiResponse<Vec<ScheduledItem>>>, AppError> {
    let controller = DeliveryController::new(&state);
    let response = controller.scheduled_work_list(actor, query.client_id).await?;
    Ok(Json(response))
}
