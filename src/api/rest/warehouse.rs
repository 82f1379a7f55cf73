use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::assignment::{self, AssignmentResult};
use crate::engine::intake::{self, WarehouseOrderDetail};
use crate::engine::{ledger, skip, status};
use crate::error::AppError;
use crate::models::customer_order::CustomerOrder;
use crate::models::driver_order::DriverOrder;
use crate::models::principal::StaffId;
use crate::models::skip_request::{SkipDecision, SkipOrderRequest, SkipRequestStatus};
use crate::models::warehouse_order::{WarehouseOrder, WarehouseOrderItem, WarehouseOrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/warehouse-orders",
            post(receive_order).get(list_warehouse_orders),
        )
        .route("/warehouse-orders/:id", get(get_warehouse_order))
        .route("/warehouse-orders/:id/status", patch(set_status))
        .route("/warehouse-orders/:id/note", patch(set_note))
        .route(
            "/warehouse-orders/:id/items/:item_id",
            patch(reconcile_item),
        )
        .route("/warehouse-orders/:id/driver-orders", get(list_driver_orders))
        .route("/warehouse-orders/:id/reassign", post(reassign))
        .route(
            "/warehouse-orders/:id/assignment",
            delete(remove_assignment),
        )
        .route("/assignments", post(assign))
        .route("/skip-requests", get(list_skip_requests))
        .route("/skip-requests/:id/resolve", post(resolve_skip_request))
}

#[derive(Deserialize)]
pub struct StatusFilter<T> {
    pub status: Option<T>,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: WarehouseOrderStatus,
}

#[derive(Deserialize)]
pub struct SetNoteRequest {
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct ReconcileItemRequest {
    pub confirmed_amount: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub warehouse_order_ids: Vec<Uuid>,
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct ResolveSkipRequest {
    pub decision: SkipDecision,
    #[serde(default)]
    pub admin_reply: Option<String>,
}

#[derive(Serialize)]
pub struct AssignResponse {
    pub results: Vec<AssignmentEntry>,
}

#[derive(Serialize)]
pub struct AssignmentEntry {
    pub warehouse_order_id: Uuid,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_order: Option<DriverOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl From<AssignmentResult> for AssignmentEntry {
    fn from(result: AssignmentResult) -> Self {
        match result.outcome {
            Ok(driver_order) => Self {
                warehouse_order_id: result.warehouse_order_id,
                ok: true,
                driver_order: Some(driver_order),
                error: None,
                kind: None,
            },
            Err(err) => Self {
                warehouse_order_id: result.warehouse_order_id,
                ok: false,
                driver_order: None,
                error: Some(err.to_string()),
                kind: Some(err.kind()),
            },
        }
    }
}

async fn receive_order(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Json(payload): Json<CustomerOrder>,
) -> Result<Json<WarehouseOrderDetail>, AppError> {
    let detail = intake::receive(&state, staff, payload)?;
    Ok(Json(detail))
}

async fn list_warehouse_orders(
    State(state): State<Arc<AppState>>,
    _staff: StaffId,
    Query(filter): Query<StatusFilter<WarehouseOrderStatus>>,
) -> Json<Vec<WarehouseOrder>> {
    let mut orders: Vec<WarehouseOrder> = state
        .warehouse_orders
        .iter()
        .filter(|entry| filter.status.is_none_or(|wanted| entry.status == wanted))
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by_key(|order| order.created_at);
    Json(orders)
}

async fn get_warehouse_order(
    State(state): State<Arc<AppState>>,
    _staff: StaffId,
    Path(id): Path<Uuid>,
) -> Result<Json<WarehouseOrderDetail>, AppError> {
    Ok(Json(intake::detail(&state, id)?))
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<WarehouseOrder>, AppError> {
    let order = status::set_status(&state, staff, id, payload.status).await?;
    Ok(Json(order))
}

async fn set_note(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetNoteRequest>,
) -> Result<Json<WarehouseOrder>, AppError> {
    let order = status::set_note(&state, staff, id, payload.note).await?;
    Ok(Json(order))
}

async fn reconcile_item(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReconcileItemRequest>,
) -> Result<Json<WarehouseOrderItem>, AppError> {
    let belongs = state
        .warehouse_items
        .get(&item_id)
        .is_some_and(|item| item.warehouse_order_id == id);
    if !belongs {
        return Err(AppError::NotFound(format!(
            "item {item_id} not found on warehouse order {id}"
        )));
    }

    let item =
        ledger::reconcile_at_warehouse(&state, staff, item_id, payload.confirmed_amount, payload.note)
            .await?;
    Ok(Json(item))
}

async fn list_driver_orders(
    State(state): State<Arc<AppState>>,
    _staff: StaffId,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverOrder>>, AppError> {
    state.warehouse_order(id)?;
    Ok(Json(state.driver_orders_of(id)))
}

async fn assign(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, AppError> {
    if payload.warehouse_order_ids.is_empty() {
        return Err(AppError::Validation(
            "warehouse_order_ids cannot be empty".to_string(),
        ));
    }

    let results = assignment::assign(&state, staff, &payload.warehouse_order_ids, payload.driver_id)
        .await
        .into_iter()
        .map(AssignmentEntry::from)
        .collect();

    Ok(Json(AssignResponse { results }))
}

async fn reassign(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignRequest>,
) -> Result<Json<DriverOrder>, AppError> {
    let driver_order = assignment::reassign(&state, staff, id, payload.driver_id).await?;
    Ok(Json(driver_order))
}

async fn remove_assignment(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path(id): Path<Uuid>,
) -> Result<Json<WarehouseOrder>, AppError> {
    let order = assignment::remove(&state, staff, id).await?;
    Ok(Json(order))
}

async fn list_skip_requests(
    State(state): State<Arc<AppState>>,
    _staff: StaffId,
    Query(filter): Query<StatusFilter<SkipRequestStatus>>,
) -> Json<Vec<SkipOrderRequest>> {
    let mut requests: Vec<SkipOrderRequest> = state
        .skip_requests
        .iter()
        .filter(|entry| filter.status.is_none_or(|wanted| entry.status == wanted))
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by_key(|request| request.created_at);
    Json(requests)
}

async fn resolve_skip_request(
    State(state): State<Arc<AppState>>,
    staff: StaffId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveSkipRequest>,
) -> Result<Json<SkipOrderRequest>, AppError> {
    let request = skip::resolve(&state, staff, id, payload.decision, payload.admin_reply).await?;
    Ok(Json(request))
}
