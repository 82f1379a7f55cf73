//! Warehouse order status machine and its propagation to the driver order and
//! the customer's e-commerce order.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver_order::{DriverOrder, DriverOrderStatus};
use crate::models::event::FulfillmentEvent;
use crate::models::principal::StaffId;
use crate::models::warehouse_order::{WarehouseOrder, WarehouseOrderStatus};
use crate::state::AppState;

pub async fn set_status(
    state: &AppState,
    staff: StaffId,
    warehouse_order_id: Uuid,
    new_status: WarehouseOrderStatus,
) -> Result<WarehouseOrder, AppError> {
    let _guard = state.lock_order(warehouse_order_id).await;
    info!(
        warehouse_order_id = %warehouse_order_id,
        staff_id = %staff,
        status = %new_status,
        "warehouse status change requested"
    );
    apply_status(state, warehouse_order_id, new_status)
}

/// Moves a warehouse order to `new_status`. Caller holds the order lock.
///
/// Equal status is a no-op: nothing is persisted, pushed or cascaded. On a
/// real change the customer order is notified before the driver order is
/// touched; a failure in either step is returned even though the status
/// write already happened.
pub(crate) fn apply_status(
    state: &AppState,
    warehouse_order_id: Uuid,
    new_status: WarehouseOrderStatus,
) -> Result<WarehouseOrder, AppError> {
    let (previous, updated) = {
        let mut order = state.warehouse_orders.get_mut(&warehouse_order_id).ok_or_else(|| {
            AppError::NotFound(format!("warehouse order {warehouse_order_id} not found"))
        })?;

        if order.status == new_status {
            return Ok(order.clone());
        }

        let previous = order.status;
        order.status = new_status;
        order.updated_at = Utc::now();
        (previous, order.clone())
    };

    state
        .metrics
        .record_transition("warehouse_order", new_status.as_str());
    info!(
        warehouse_order_id = %warehouse_order_id,
        from = %previous,
        to = %new_status,
        "warehouse order status changed"
    );

    let customer_status = new_status.customer_status();
    state
        .customer_orders
        .notify_status(&updated.external_order_ref, customer_status)
        .map_err(|err| match err {
            AppError::Storage(_) => err,
            other => AppError::Storage(format!("customer order update failed: {other}")),
        })?;

    cascade_to_driver(state, &updated)?;

    state.publish(FulfillmentEvent::WarehouseStatusChanged {
        warehouse_order_id,
        external_order_ref: updated.external_order_ref.clone(),
        from: previous,
        to: new_status,
        customer_status,
        at: updated.updated_at,
    });

    Ok(updated)
}

fn cascade_to_driver(state: &AppState, order: &WarehouseOrder) -> Result<(), AppError> {
    let active = state.active_driver_orders(order.id);

    if order.status.releases_driver() {
        for driver_order in active {
            warn!(
                warehouse_order_id = %order.id,
                driver_order_id = %driver_order.id,
                "warehouse order pulled back; releasing driver"
            );
            move_driver_order(
                state,
                driver_order.id,
                DriverOrderStatus::SkippedByWarehouse,
                |_| {},
            )?;
        }
        return Ok(());
    }

    let Some(driver_order) = active.into_iter().last() else {
        return Ok(());
    };

    match (order.status, driver_order.status) {
        (WarehouseOrderStatus::Dispatched, DriverOrderStatus::Pending) => {
            move_driver_order(state, driver_order.id, DriverOrderStatus::Dispatched, |row| {
                row.delivery_start_time.get_or_insert_with(Utc::now);
            })?;
        }
        (WarehouseOrderStatus::Delivered, DriverOrderStatus::Dispatched) => {
            move_driver_order(state, driver_order.id, DriverOrderStatus::Delivered, |row| {
                row.delivery_end_time = Some(Utc::now());
            })?;
        }
        _ => {}
    }

    Ok(())
}

/// Single write path for driver order status changes. `extra` runs in the
/// same row update. Caller holds the warehouse order lock.
pub(crate) fn move_driver_order<F>(
    state: &AppState,
    driver_order_id: Uuid,
    to: DriverOrderStatus,
    extra: F,
) -> Result<DriverOrder, AppError>
where
    F: FnOnce(&mut DriverOrder),
{
    let mut from = to;
    let updated = state.update_driver_order(driver_order_id, |row| {
        from = row.status;
        row.status = to;
        extra(row);
    })?;

    if from != to {
        state.metrics.record_transition("driver_order", to.as_str());
        info!(
            driver_order_id = %driver_order_id,
            warehouse_order_id = %updated.warehouse_order_id,
            from = %from,
            to = %to,
            "driver order status changed"
        );
        state.publish(FulfillmentEvent::DriverOrderStatusChanged {
            driver_order_id,
            warehouse_order_id: updated.warehouse_order_id,
            from,
            to,
            at: updated.updated_at,
        });
    }

    Ok(updated)
}

pub async fn set_note(
    state: &AppState,
    staff: StaffId,
    warehouse_order_id: Uuid,
    note: Option<String>,
) -> Result<WarehouseOrder, AppError> {
    let _guard = state.lock_order(warehouse_order_id).await;

    let mut order = state.warehouse_orders.get_mut(&warehouse_order_id).ok_or_else(|| {
        AppError::NotFound(format!("warehouse order {warehouse_order_id} not found"))
    })?;
    order.manager_note = note.filter(|text| !text.trim().is_empty());
    order.updated_at = Utc::now();

    info!(warehouse_order_id = %warehouse_order_id, staff_id = %staff, "manager note updated");
    Ok(order.clone())
}
