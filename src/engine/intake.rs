use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::customer_order::CustomerOrder;
use crate::models::principal::StaffId;
use crate::models::warehouse_order::{WarehouseOrder, WarehouseOrderItem, WarehouseOrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct WarehouseOrderDetail {
    #[serde(flatten)]
    pub order: WarehouseOrder,
    pub items: Vec<WarehouseOrderItem>,
}

/// Opens a draft warehouse order for a customer order whose goods arrived.
pub fn receive(
    state: &AppState,
    staff: StaffId,
    customer_order: CustomerOrder,
) -> Result<WarehouseOrderDetail, AppError> {
    validate(&customer_order)?;

    let id = Uuid::new_v4();
    match state
        .external_refs
        .entry(customer_order.external_order_ref.clone())
    {
        Entry::Occupied(existing) => {
            return Err(AppError::Conflict(format!(
                "customer order {} was already received as warehouse order {}",
                customer_order.external_order_ref,
                existing.get()
            )));
        }
        Entry::Vacant(slot) => {
            slot.insert(id);
        }
    }

    let now = Utc::now();
    let order = WarehouseOrder {
        id,
        external_order_ref: customer_order.external_order_ref,
        customer_id: customer_order.customer_id,
        customer_contact: customer_order.customer_contact,
        status: WarehouseOrderStatus::Draft,
        manager_note: None,
        created_at: now,
        updated_at: now,
    };

    let mut items: Vec<WarehouseOrderItem> = customer_order
        .lines
        .into_iter()
        .map(|line| WarehouseOrderItem {
            id: Uuid::new_v4(),
            warehouse_order_id: id,
            item_ref: line.item_ref,
            supplier_ref: line.supplier_ref,
            unit_of_measure: line.unit_of_measure,
            customer_requested_amount: line.requested_amount,
            warehouse_confirmed_amount: line.requested_amount,
            customer_delivery_date: line.requested_delivery_date,
            supplier_delivery_date: None,
            expected_delivery_date: line.requested_delivery_date,
            notes: line.notes,
        })
        .collect();
    items.sort_by(|a, b| a.item_ref.cmp(&b.item_ref).then(a.id.cmp(&b.id)));

    for item in &items {
        state.warehouse_items.insert(item.id, item.clone());
    }
    state.warehouse_orders.insert(order.id, order.clone());

    state
        .customer_orders
        .notify_status(&order.external_order_ref, order.status.customer_status())?;
    state
        .metrics
        .record_transition("warehouse_order", order.status.as_str());
    info!(
        warehouse_order_id = %order.id,
        external_order_ref = %order.external_order_ref,
        staff_id = %staff,
        items = items.len(),
        "warehouse order received"
    );

    Ok(WarehouseOrderDetail { order, items })
}

pub fn detail(state: &AppState, warehouse_order_id: Uuid) -> Result<WarehouseOrderDetail, AppError> {
    Ok(WarehouseOrderDetail {
        order: state.warehouse_order(warehouse_order_id)?,
        items: state.items_of_warehouse_order(warehouse_order_id),
    })
}

fn validate(customer_order: &CustomerOrder) -> Result<(), AppError> {
    if customer_order.external_order_ref.trim().is_empty() {
        return Err(AppError::Validation(
            "external order reference cannot be empty".to_string(),
        ));
    }
    if customer_order.customer_contact.trim().is_empty() {
        return Err(AppError::Validation(
            "customer contact cannot be empty".to_string(),
        ));
    }
    if customer_order.lines.is_empty() {
        return Err(AppError::Validation(
            "customer order has no lines".to_string(),
        ));
    }

    for line in &customer_order.lines {
        if line.item_ref.trim().is_empty() {
            return Err(AppError::Validation("item reference cannot be empty".to_string()));
        }
        if !line.requested_amount.is_finite() || line.requested_amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "requested amount for {} must be > 0",
                line.item_ref
            )));
        }
    }

    Ok(())
}
