use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::ledger;
use crate::engine::status::{apply_status, move_driver_order};
use crate::error::AppError;
use crate::models::driver_order::{DriverOrder, DriverOrderStatus};
use crate::models::event::FulfillmentEvent;
use crate::models::principal::StaffId;
use crate::models::warehouse_order::{WarehouseOrder, WarehouseOrderStatus};
use crate::state::AppState;

/// Outcome for one warehouse order of a batch assignment.
#[derive(Debug)]
pub struct AssignmentResult {
    pub warehouse_order_id: Uuid,
    pub outcome: Result<DriverOrder, AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ItemSource {
    WarehouseLedger,
    PreviousAttempt,
}

/// Hands each warehouse order to `driver_id`. Ids are processed one by one;
/// a failure on one id leaves the others untouched.
pub async fn assign(
    state: &AppState,
    staff: StaffId,
    warehouse_order_ids: &[Uuid],
    driver_id: Uuid,
) -> Vec<AssignmentResult> {
    let mut results = Vec::with_capacity(warehouse_order_ids.len());

    for &warehouse_order_id in warehouse_order_ids {
        let outcome = {
            let _guard = state.lock_order(warehouse_order_id).await;
            assign_locked(state, warehouse_order_id, driver_id, ItemSource::WarehouseLedger)
        };
        record_outcome(state, staff, warehouse_order_id, driver_id, &outcome);
        results.push(AssignmentResult {
            warehouse_order_id,
            outcome,
        });
    }

    results
}

/// Swaps the driver of one warehouse order. Lines are carried over from the
/// most recent attempt rather than re-read from the warehouse.
pub async fn reassign(
    state: &AppState,
    staff: StaffId,
    warehouse_order_id: Uuid,
    driver_id: Uuid,
) -> Result<DriverOrder, AppError> {
    let outcome = {
        let _guard = state.lock_order(warehouse_order_id).await;
        assign_locked(state, warehouse_order_id, driver_id, ItemSource::PreviousAttempt)
    };
    record_outcome(state, staff, warehouse_order_id, driver_id, &outcome);
    outcome
}

pub async fn remove(
    state: &AppState,
    staff: StaffId,
    warehouse_order_id: Uuid,
) -> Result<WarehouseOrder, AppError> {
    let _guard = state.lock_order(warehouse_order_id).await;
    info!(warehouse_order_id = %warehouse_order_id, staff_id = %staff, "removing driver assignment");
    remove_locked(state, warehouse_order_id)
}

pub(crate) fn remove_locked(
    state: &AppState,
    warehouse_order_id: Uuid,
) -> Result<WarehouseOrder, AppError> {
    state.warehouse_order(warehouse_order_id)?;

    let active = state.active_driver_orders(warehouse_order_id);
    if active.is_empty() {
        return Err(AppError::NotFound(format!(
            "warehouse order {warehouse_order_id} has no active driver order"
        )));
    }

    for driver_order in active {
        move_driver_order(
            state,
            driver_order.id,
            DriverOrderStatus::SkippedByWarehouse,
            |_| {},
        )?;
    }

    apply_status(
        state,
        warehouse_order_id,
        WarehouseOrderStatus::ReadyForDriverAssignment,
    )
}

fn assign_locked(
    state: &AppState,
    warehouse_order_id: Uuid,
    driver_id: Uuid,
    source: ItemSource,
) -> Result<DriverOrder, AppError> {
    let order = state.warehouse_order(warehouse_order_id)?;
    if !order.status.accepts_driver() {
        return Err(AppError::InvalidState(format!(
            "warehouse order {warehouse_order_id} is {}; a driver can only be assigned once it is ready for assignment",
            order.status
        )));
    }

    let active = state.active_driver_orders(warehouse_order_id);
    if active.iter().any(|current| current.driver_id == driver_id) {
        return Err(AppError::DuplicateAssignment);
    }

    let previous = match source {
        ItemSource::PreviousAttempt => state.latest_driver_order(warehouse_order_id),
        ItemSource::WarehouseLedger => None,
    };

    // Demote before insert so two active rows never coexist.
    for current in active {
        move_driver_order(
            state,
            current.id,
            DriverOrderStatus::SkippedByWarehouse,
            |_| {},
        )?;
    }

    let now = Utc::now();
    let driver_order = DriverOrder {
        id: Uuid::new_v4(),
        warehouse_order_id,
        driver_id,
        status: DriverOrderStatus::Pending,
        is_driver_confirmed: false,
        is_customer_confirmed: false,
        is_otp_confirmed: false,
        delivery_start_time: None,
        delivery_end_time: None,
        driver_notes: None,
        created_at: now,
        updated_at: now,
    };
    state.driver_orders.insert(driver_order.id, driver_order.clone());
    state.refresh_active_gauge();

    let items = match previous {
        Some(previous) => ledger::materialize_from_attempt(state, previous.id, driver_order.id),
        None => ledger::materialize_from_warehouse(state, warehouse_order_id, driver_order.id),
    };

    apply_status(state, warehouse_order_id, WarehouseOrderStatus::AssignedToDriver)?;

    state.publish(FulfillmentEvent::DriverAssigned {
        driver_order_id: driver_order.id,
        warehouse_order_id,
        driver_id,
        at: now,
    });
    info!(
        warehouse_order_id = %warehouse_order_id,
        driver_order_id = %driver_order.id,
        driver_id = %driver_id,
        items = items.len(),
        "driver assigned"
    );

    Ok(driver_order)
}

fn record_outcome(
    state: &AppState,
    staff: StaffId,
    warehouse_order_id: Uuid,
    driver_id: Uuid,
    outcome: &Result<DriverOrder, AppError>,
) {
    match outcome {
        Ok(_) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&["success"])
                .inc();
        }
        Err(err) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&[err.kind()])
                .inc();
            warn!(
                warehouse_order_id = %warehouse_order_id,
                driver_id = %driver_id,
                staff_id = %staff,
                error = %err,
                "driver assignment rejected"
            );
        }
    }
}
