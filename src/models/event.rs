use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::driver_order::DriverOrderStatus;
use crate::models::skip_request::SkipRequestStatus;
use crate::models::warehouse_order::{CustomerOrderStatus, WarehouseOrderStatus};

/// Domain events fanned out to notification consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    WarehouseStatusChanged {
        warehouse_order_id: Uuid,
        external_order_ref: String,
        from: WarehouseOrderStatus,
        to: WarehouseOrderStatus,
        customer_status: CustomerOrderStatus,
        at: DateTime<Utc>,
    },
    DriverOrderStatusChanged {
        driver_order_id: Uuid,
        warehouse_order_id: Uuid,
        from: DriverOrderStatus,
        to: DriverOrderStatus,
        at: DateTime<Utc>,
    },
    DriverAssigned {
        driver_order_id: Uuid,
        warehouse_order_id: Uuid,
        driver_id: Uuid,
        at: DateTime<Utc>,
    },
    SkipRequested {
        request_id: Uuid,
        driver_order_id: Uuid,
        driver_id: Uuid,
        at: DateTime<Utc>,
    },
    SkipResolved {
        request_id: Uuid,
        driver_order_id: Uuid,
        status: SkipRequestStatus,
        at: DateTime<Utc>,
    },
    DeliveryConfirmed {
        driver_order_id: Uuid,
        warehouse_order_id: Uuid,
        at: DateTime<Utc>,
    },
}
