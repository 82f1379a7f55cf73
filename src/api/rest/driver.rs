use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::confirmation::{self, ConfirmedItems, DriverConfirmation};
use crate::engine::ledger::ItemConfirmation;
use crate::engine::{ensure_owner, otp, skip};
use crate::error::AppError;
use crate::models::driver_order::{DriverOrder, DriverOrderItem, DriverOrderStatus};
use crate::models::principal::DriverId;
use crate::models::skip_request::SkipOrderRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/driver/orders", get(list_orders))
        .route("/driver/orders/:id/items", get(get_items))
        .route("/driver/orders/:id/status", patch(update_status))
        .route("/driver/orders/:id/skip-requests", post(submit_skip_request))
        .route("/driver/orders/:id/otp", post(send_otp))
        .route("/driver/orders/:id/otp/validate", post(validate_otp))
        .route("/driver/orders/:id/confirm-items", post(confirm_items))
        .route("/driver/orders/:id/confirm-driver", post(confirm_driver))
        .route("/driver/orders/:id/reconfirm-items", post(reconfirm_items))
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub include_closed: bool,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverOrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct SkipRequestBody {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct ValidateOtpRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct ConfirmItemsRequest {
    pub items: Vec<ItemConfirmation>,
}

#[derive(Serialize)]
pub struct OtpSentResponse {
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct DriverConfirmationResponse {
    pub outcome: &'static str,
    pub order: DriverOrder,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Query(query): Query<ListOrdersQuery>,
) -> Json<Vec<DriverOrder>> {
    let mut orders: Vec<DriverOrder> = state
        .driver_orders_for_driver(driver.0)
        .into_iter()
        .filter(|order| query.include_closed || order.status.is_active())
        .collect();
    orders.sort_by(|a, b| {
        b.status
            .is_active()
            .cmp(&a.status.is_active())
            .then(b.created_at.cmp(&a.created_at))
    });
    Json(orders)
}

async fn get_items(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverOrderItem>>, AppError> {
    let order = state.driver_order(id)?;
    ensure_owner(&order, driver)?;
    Ok(Json(state.items_of_driver_order(id)))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DriverOrder>, AppError> {
    let order =
        confirmation::update_status(&state, driver, id, payload.status, payload.notes).await?;
    Ok(Json(order))
}

async fn submit_skip_request(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
    Json(payload): Json<SkipRequestBody>,
) -> Result<Json<SkipOrderRequest>, AppError> {
    let request = skip::submit(&state, driver, id, &payload.reason).await?;
    Ok(Json(request))
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
) -> Result<Json<OtpSentResponse>, AppError> {
    let customer_id = customer_of(&state, id)?;
    let issued = otp::issue(&state, driver, customer_id, id, state.otp_ttl).await?;

    state
        .otp_sender
        .send_code(&issued.contact, &issued.code, issued.expires_at)?;

    Ok(Json(OtpSentResponse {
        sent_to: issued.contact,
        expires_at: issued.expires_at,
    }))
}

async fn validate_otp(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ValidateOtpRequest>,
) -> Result<Json<DriverOrder>, AppError> {
    let customer_id = customer_of(&state, id)?;

    let order = otp::validate(&state, driver, id, customer_id, &payload.code).await?;
    Ok(Json(order))
}

async fn confirm_items(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmItemsRequest>,
) -> Result<Json<ConfirmedItems>, AppError> {
    let confirmed = confirmation::confirm_items(&state, driver, id, &payload.items).await?;
    Ok(Json(confirmed))
}

async fn confirm_driver(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let response = match confirmation::confirm_driver(&state, driver, id).await? {
        DriverConfirmation::Delivered(order) => (
            StatusCode::OK,
            Json(DriverConfirmationResponse {
                outcome: "delivered",
                order,
            }),
        ),
        DriverConfirmation::WaitingOnCustomer(order) => (
            StatusCode::ACCEPTED,
            Json(DriverConfirmationResponse {
                outcome: "waiting_on_customer",
                order,
            }),
        ),
    };
    Ok(response.into_response())
}

async fn reconfirm_items(
    State(state): State<Arc<AppState>>,
    driver: DriverId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmItemsRequest>,
) -> Result<Json<ConfirmedItems>, AppError> {
    let confirmed = confirmation::reconfirm_items(&state, driver, id, &payload.items).await?;
    Ok(Json(confirmed))
}

fn customer_of(state: &AppState, driver_order_id: Uuid) -> Result<Uuid, AppError> {
    let order = state.driver_order(driver_order_id)?;
    Ok(state.warehouse_order(order.warehouse_order_id)?.customer_id)
}
