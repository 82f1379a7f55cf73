//! Driver-side delivery workflow: dispatch, the two-party confirmation gate
//! and reconfirmation after the customer changes their mind.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::ledger::{self, ItemConfirmation};
use crate::engine::lock_driver_order;
use crate::engine::status::{apply_status, move_driver_order};
use crate::error::AppError;
use crate::models::driver_order::{DriverOrder, DriverOrderItem, DriverOrderStatus};
use crate::models::event::FulfillmentEvent;
use crate::models::principal::DriverId;
use crate::models::warehouse_order::WarehouseOrderStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedItems {
    pub order: DriverOrder,
    pub items: Vec<DriverOrderItem>,
}

/// Result of the driver's confirmation. Waiting is a normal outcome, not a
/// failure; the driver retries once the customer has confirmed.
#[derive(Debug, Clone)]
pub enum DriverConfirmation {
    Delivered(DriverOrder),
    WaitingOnCustomer(DriverOrder),
}

pub async fn update_status(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    target: DriverOrderStatus,
    notes: Option<String>,
) -> Result<DriverOrder, AppError> {
    let (_guard, order) = lock_driver_order(state, driver, driver_order_id).await?;

    order.status.check_driver_move(target)?;

    if target == DriverOrderStatus::Delivered {
        if !order.is_customer_confirmed {
            return Err(AppError::InvalidState(
                "delivery needs the customer's item confirmation first".to_string(),
            ));
        }
        return deliver_locked(state, driver, driver_order_id, notes);
    }

    let now = Utc::now();
    let updated = move_driver_order(state, driver_order_id, target, |row| {
        row.delivery_start_time = Some(now);
        if notes.is_some() {
            row.driver_notes = notes;
        }
    })?;

    apply_status(
        state,
        updated.warehouse_order_id,
        WarehouseOrderStatus::Dispatched,
    )?;
    state.driver_order(driver_order_id)
}

/// Customer's doorstep confirmation of what the driver brought.
pub async fn confirm_items(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    lines: &[ItemConfirmation],
) -> Result<ConfirmedItems, AppError> {
    let (_guard, order) = lock_driver_order(state, driver, driver_order_id).await?;

    ensure_not_skipped(&order)?;
    if order.is_customer_confirmed {
        return Err(AppError::AlreadyConfirmed(
            "customer has already confirmed the items".to_string(),
        ));
    }
    if order.status != DriverOrderStatus::Dispatched {
        return Err(AppError::InvalidState(format!(
            "items can only be confirmed while the order is dispatched, it is {}",
            order.status
        )));
    }

    let items = ledger::reconcile_at_delivery(state, driver_order_id, lines)?;
    let order = state.update_driver_order(driver_order_id, |row| {
        row.is_customer_confirmed = true;
    })?;

    info!(
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        lines = lines.len(),
        "customer confirmed items"
    );

    Ok(ConfirmedItems { order, items })
}

pub async fn confirm_driver(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
) -> Result<DriverConfirmation, AppError> {
    let (_guard, order) = lock_driver_order(state, driver, driver_order_id).await?;

    if order.is_driver_confirmed {
        return Err(AppError::AlreadyConfirmed(
            "driver has already confirmed this delivery".to_string(),
        ));
    }
    ensure_not_skipped(&order)?;
    if order.status != DriverOrderStatus::Dispatched {
        return Err(AppError::InvalidState(format!(
            "delivery can only be confirmed while the order is dispatched, it is {}",
            order.status
        )));
    }

    if !order.is_customer_confirmed {
        info!(
            driver_order_id = %driver_order_id,
            driver_id = %driver,
            "driver confirmation waiting on customer"
        );
        return Ok(DriverConfirmation::WaitingOnCustomer(order));
    }

    deliver_locked(state, driver, driver_order_id, None).map(DriverConfirmation::Delivered)
}

/// Records the driver's confirmation and closes the delivery. Caller holds the
/// warehouse order lock and has checked the customer already confirmed.
fn deliver_locked(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    notes: Option<String>,
) -> Result<DriverOrder, AppError> {
    let now = Utc::now();
    let delivered = move_driver_order(
        state,
        driver_order_id,
        DriverOrderStatus::Delivered,
        |row| {
            row.is_driver_confirmed = true;
            row.delivery_end_time = Some(now);
            if notes.is_some() {
                row.driver_notes = notes;
            }
        },
    )?;
    apply_status(
        state,
        delivered.warehouse_order_id,
        WarehouseOrderStatus::Delivered,
    )?;

    state.publish(FulfillmentEvent::DeliveryConfirmed {
        driver_order_id,
        warehouse_order_id: delivered.warehouse_order_id,
        at: now,
    });
    info!(
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        "delivery confirmed"
    );

    state.driver_order(driver_order_id)
}

/// Revises an earlier customer confirmation. Reopens the gate: both parties
/// have to confirm again and the order goes back on route.
pub async fn reconfirm_items(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    lines: &[ItemConfirmation],
) -> Result<ConfirmedItems, AppError> {
    let (_guard, order) = lock_driver_order(state, driver, driver_order_id).await?;

    ensure_not_skipped(&order)?;
    if !order.is_customer_confirmed {
        return Err(AppError::InvalidState(
            "nothing to reconfirm: customer has not confirmed the items yet".to_string(),
        ));
    }

    let items = ledger::reconcile_at_delivery(state, driver_order_id, lines)?;

    let reset = |row: &mut DriverOrder| {
        row.is_customer_confirmed = false;
        row.is_driver_confirmed = false;
        row.delivery_end_time = None;
    };
    let reopened = if order.status == DriverOrderStatus::Dispatched {
        state.update_driver_order(driver_order_id, reset)?
    } else {
        move_driver_order(state, driver_order_id, DriverOrderStatus::Dispatched, reset)?
    };

    apply_status(
        state,
        reopened.warehouse_order_id,
        WarehouseOrderStatus::Dispatched,
    )?;

    warn!(
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        previous_status = %order.status,
        "customer reopened item confirmation"
    );

    Ok(ConfirmedItems {
        order: state.driver_order(driver_order_id)?,
        items,
    })
}

fn ensure_not_skipped(order: &DriverOrder) -> Result<(), AppError> {
    if order.status.is_active() {
        Ok(())
    } else {
        Err(AppError::OrderSkipped)
    }
}
