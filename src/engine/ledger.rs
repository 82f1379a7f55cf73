//! Three-stage quantity reconciliation: requested by the customer, confirmed
//! by the warehouse, confirmed again by the customer at the door.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver_order::{DriverOrderItem, ItemConfirmationStatus};
use crate::models::principal::StaffId;
use crate::models::warehouse_order::WarehouseOrderItem;
use crate::state::AppState;

/// One line of a customer's doorstep confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfirmation {
    pub item_id: Uuid,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub confirmed_amount: Option<f64>,
}

pub async fn reconcile_at_warehouse(
    state: &AppState,
    staff: StaffId,
    item_id: Uuid,
    confirmed_amount: f64,
    note: Option<String>,
) -> Result<WarehouseOrderItem, AppError> {
    if !confirmed_amount.is_finite() || confirmed_amount < 0.0 {
        return Err(AppError::Validation(format!(
            "confirmed amount must be a non-negative number, got {confirmed_amount}"
        )));
    }

    let warehouse_order_id = state
        .warehouse_items
        .get(&item_id)
        .map(|item| item.warehouse_order_id)
        .ok_or_else(|| AppError::NotFound(format!("warehouse order item {item_id} not found")))?;

    let _guard = state.lock_order(warehouse_order_id).await;

    let updated = {
        let mut item = state.warehouse_items.get_mut(&item_id).ok_or_else(|| {
            AppError::NotFound(format!("warehouse order item {item_id} not found"))
        })?;
        item.warehouse_confirmed_amount = confirmed_amount;
        item.notes = note;
        item.clone()
    };

    info!(
        warehouse_order_id = %warehouse_order_id,
        item_id = %item_id,
        staff_id = %staff,
        confirmed_amount,
        "warehouse amount reconciled"
    );

    Ok(updated)
}

/// Warehouse lines that go out with a driver: anything confirmed above zero.
pub fn snapshot_for_driver(state: &AppState, warehouse_order_id: Uuid) -> Vec<WarehouseOrderItem> {
    state
        .items_of_warehouse_order(warehouse_order_id)
        .into_iter()
        .filter(|item| item.warehouse_confirmed_amount > 0.0)
        .collect()
}

pub(crate) fn materialize_from_warehouse(
    state: &AppState,
    warehouse_order_id: Uuid,
    driver_order_id: Uuid,
) -> Vec<DriverOrderItem> {
    snapshot_for_driver(state, warehouse_order_id)
        .into_iter()
        .map(|item| {
            let copy = DriverOrderItem {
                id: Uuid::new_v4(),
                driver_order_id,
                item_ref: item.item_ref,
                unit_of_measure: item.unit_of_measure,
                amount: item.warehouse_confirmed_amount,
                customer_requested_amount: item.customer_requested_amount,
                status: ItemConfirmationStatus::Pending,
                customer_confirmed_amount: 0.0,
            };
            state.driver_items.insert(copy.id, copy.clone());
            copy
        })
        .collect()
}

/// Carries the lines of an earlier attempt over unchanged to a new one.
pub(crate) fn materialize_from_attempt(
    state: &AppState,
    previous_driver_order_id: Uuid,
    driver_order_id: Uuid,
) -> Vec<DriverOrderItem> {
    state
        .items_of_driver_order(previous_driver_order_id)
        .into_iter()
        .map(|item| {
            let copy = DriverOrderItem {
                id: Uuid::new_v4(),
                driver_order_id,
                ..item
            };
            state.driver_items.insert(copy.id, copy.clone());
            copy
        })
        .collect()
}

/// Status and amount a doorstep line settles to. The amount only sticks when
/// the customer confirmed the line.
pub fn reconcile_line(
    raw_status: Option<&str>,
    confirmed_amount: Option<f64>,
) -> Result<(ItemConfirmationStatus, f64), AppError> {
    let status = ItemConfirmationStatus::coerce(raw_status);
    if status != ItemConfirmationStatus::Confirmed {
        return Ok((status, 0.0));
    }

    let amount = confirmed_amount.unwrap_or(0.0);
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!(
            "customer confirmed amount must be a non-negative number, got {amount}"
        )));
    }
    Ok((status, amount))
}

/// Applies one confirmation round to a driver order's lines. Every line is
/// validated before any is written.
pub(crate) fn reconcile_at_delivery(
    state: &AppState,
    driver_order_id: Uuid,
    lines: &[ItemConfirmation],
) -> Result<Vec<DriverOrderItem>, AppError> {
    let mut planned = Vec::with_capacity(lines.len());
    for line in lines {
        let belongs = state
            .driver_items
            .get(&line.item_id)
            .is_some_and(|item| item.driver_order_id == driver_order_id);
        if !belongs {
            return Err(AppError::NotFound(format!(
                "item {} is not part of driver order {driver_order_id}",
                line.item_id
            )));
        }

        let (status, amount) = reconcile_line(line.status.as_deref(), line.confirmed_amount)?;
        planned.push((line.item_id, status, amount));
    }

    for (item_id, status, amount) in planned {
        let mut item = state
            .driver_items
            .get_mut(&item_id)
            .ok_or_else(|| AppError::Storage(format!("driver order item {item_id} vanished")))?;
        item.status = status;
        item.customer_confirmed_amount = amount;
    }

    Ok(state.items_of_driver_order(driver_order_id))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::engine::testing::{seed_driver_order, seed_warehouse_order, staff};
    use crate::models::warehouse_order::WarehouseOrderStatus;

    #[tokio::test]
    async fn negative_warehouse_amount_is_rejected() {
        let state = AppState::new(16);
        let (_order, items) = seed_warehouse_order(
            &state,
            WarehouseOrderStatus::Draft,
            &[("apples", 10.0)],
        );

        let err = reconcile_at_warehouse(&state, staff(), items[0].id, -1.0, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            state.warehouse_items.get(&items[0].id).unwrap().warehouse_confirmed_amount,
            10.0
        );
    }

    #[tokio::test]
    async fn warehouse_amount_and_note_are_overwritten() {
        let state = AppState::new(16);
        let (_order, items) = seed_warehouse_order(
            &state,
            WarehouseOrderStatus::AssignedToDriver,
            &[("apples", 10.0)],
        );

        let updated = reconcile_at_warehouse(
            &state,
            staff(),
            items[0].id,
            7.5,
            Some("two crates damaged".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(updated.warehouse_confirmed_amount, 7.5);
        assert_eq!(updated.notes.as_deref(), Some("two crates damaged"));
        assert_eq!(updated.customer_requested_amount, 10.0);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let state = AppState::new(16);
        let err = reconcile_at_warehouse(&state, staff(), Uuid::new_v4(), 1.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn snapshot_drops_zero_lines() {
        let state = AppState::new(16);
        let (order, _items) = seed_warehouse_order(
            &state,
            WarehouseOrderStatus::ReadyForDriverAssignment,
            &[("apples", 4.0), ("pears", 0.0), ("plums", 2.0)],
        );

        let refs: Vec<String> = snapshot_for_driver(&state, order.id)
            .into_iter()
            .map(|item| item.item_ref)
            .collect();

        assert_eq!(refs, vec!["apples".to_string(), "plums".to_string()]);
    }

    #[test]
    fn line_amount_is_zeroed_unless_confirmed() {
        assert_eq!(
            reconcile_line(Some("Rejected"), Some(5.0)).unwrap(),
            (ItemConfirmationStatus::Rejected, 0.0)
        );
        assert_eq!(
            reconcile_line(Some("bogus"), Some(5.0)).unwrap(),
            (ItemConfirmationStatus::Pending, 0.0)
        );
        assert_eq!(
            reconcile_line(Some("Confirmed"), Some(5.0)).unwrap(),
            (ItemConfirmationStatus::Confirmed, 5.0)
        );
        assert!(matches!(
            reconcile_line(Some("Confirmed"), Some(-2.0)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn delivery_round_is_all_or_nothing() {
        let state = AppState::new(16);
        let (order, _items) = seed_warehouse_order(
            &state,
            WarehouseOrderStatus::Dispatched,
            &[("apples", 4.0)],
        );
        let (driver_order, driver_items) = seed_driver_order(&state, order.id);

        let err = reconcile_at_delivery(
            &state,
            driver_order.id,
            &[
                ItemConfirmation {
                    item_id: driver_items[0].id,
                    status: Some("Confirmed".to_string()),
                    confirmed_amount: Some(3.0),
                },
                ItemConfirmation {
                    item_id: Uuid::new_v4(),
                    status: Some("Confirmed".to_string()),
                    confirmed_amount: Some(1.0),
                },
            ],
        )
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let untouched = state.driver_items.get(&driver_items[0].id).unwrap().clone();
        assert_eq!(untouched.status, ItemConfirmationStatus::Pending);
        assert_eq!(untouched.customer_confirmed_amount, 0.0);
    }
}
