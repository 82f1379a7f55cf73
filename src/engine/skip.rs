use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::assignment::remove_locked;
use crate::engine::ensure_owner;
use crate::error::AppError;
use crate::models::driver_order::DriverOrderStatus;
use crate::models::event::FulfillmentEvent;
use crate::models::principal::{DriverId, StaffId};
use crate::models::skip_request::{SkipDecision, SkipOrderRequest, SkipRequestStatus};
use crate::state::AppState;

pub async fn submit(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    reason: &str,
) -> Result<SkipOrderRequest, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("skip reason cannot be empty".to_string()));
    }

    let order = state.driver_order(driver_order_id)?;
    ensure_owner(&order, driver)?;
    match order.status {
        DriverOrderStatus::Pending | DriverOrderStatus::Dispatched => {}
        DriverOrderStatus::Delivered => return Err(AppError::OrderDelivered),
        _ => return Err(AppError::OrderSkipped),
    }

    let request = SkipOrderRequest {
        id: Uuid::new_v4(),
        driver_order_id,
        driver_id: driver.0,
        reason: reason.to_string(),
        status: SkipRequestStatus::Pending,
        admin_reply: None,
        resolved_by: None,
        created_at: Utc::now(),
        resolved_at: None,
    };
    state.skip_requests.insert(request.id, request.clone());

    state
        .metrics
        .skip_requests_total
        .with_label_values(&["submitted"])
        .inc();
    state.publish(FulfillmentEvent::SkipRequested {
        request_id: request.id,
        driver_order_id,
        driver_id: driver.0,
        at: request.created_at,
    });
    info!(
        request_id = %request.id,
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        "skip requested"
    );

    Ok(request)
}

/// Staff decision on a skip request. Accepting pulls the order back from the
/// driver exactly like removing the assignment; rejecting leaves the delivery
/// running.
pub async fn resolve(
    state: &AppState,
    staff: StaffId,
    request_id: Uuid,
    decision: SkipDecision,
    admin_reply: Option<String>,
) -> Result<SkipOrderRequest, AppError> {
    let driver_order_id = state
        .skip_requests
        .get(&request_id)
        .map(|request| request.driver_order_id)
        .ok_or_else(|| AppError::NotFound(format!("skip request {request_id} not found")))?;
    let warehouse_order_id = state.driver_order(driver_order_id)?.warehouse_order_id;

    let _guard = state.lock_order(warehouse_order_id).await;

    let pending = state
        .skip_requests
        .get(&request_id)
        .is_some_and(|request| request.status == SkipRequestStatus::Pending);
    if !pending {
        return Err(AppError::InvalidState(format!(
            "skip request {request_id} was already resolved"
        )));
    }

    if decision == SkipDecision::Accepted {
        // The attempt may already be over, e.g. reassigned or delivered in the
        // meantime; only an in-flight driver order is pulled back.
        if state.driver_order(driver_order_id)?.status.is_in_flight() {
            remove_locked(state, warehouse_order_id)?;
        } else {
            info!(
                request_id = %request_id,
                driver_order_id = %driver_order_id,
                "skip accepted for an attempt that already ended"
            );
        }
    }

    let status = SkipRequestStatus::from(decision);
    let resolved = {
        let mut request = state
            .skip_requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::Storage(format!("skip request {request_id} vanished")))?;
        request.status = status;
        request.admin_reply = admin_reply.filter(|reply| !reply.trim().is_empty());
        request.resolved_by = Some(staff.0);
        request.resolved_at = Some(Utc::now());
        request.clone()
    };

    let outcome = match status {
        SkipRequestStatus::Accepted => "accepted",
        _ => "rejected",
    };
    state
        .metrics
        .skip_requests_total
        .with_label_values(&[outcome])
        .inc();
    state.publish(FulfillmentEvent::SkipResolved {
        request_id,
        driver_order_id,
        status,
        at: Utc::now(),
    });
    info!(
        request_id = %request_id,
        driver_order_id = %driver_order_id,
        staff_id = %staff,
        outcome,
        "skip request resolved"
    );

    Ok(resolved)
}
