use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WarehouseOrderStatus {
    Draft,
    ReadyForDriverAssignment,
    AssignedToDriver,
    Dispatched,
    Delivered,
}

impl WarehouseOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WarehouseOrderStatus::Draft => "Draft",
            WarehouseOrderStatus::ReadyForDriverAssignment => "ReadyForDriverAssignment",
            WarehouseOrderStatus::AssignedToDriver => "AssignedToDriver",
            WarehouseOrderStatus::Dispatched => "Dispatched",
            WarehouseOrderStatus::Delivered => "Delivered",
        }
    }

    /// Status shown on the customer's e-commerce order.
    pub fn customer_status(self) -> CustomerOrderStatus {
        match self {
            WarehouseOrderStatus::Draft | WarehouseOrderStatus::ReadyForDriverAssignment => {
                CustomerOrderStatus::ReceivedAtWarehouse
            }
            WarehouseOrderStatus::AssignedToDriver => CustomerOrderStatus::ReadyForDelivery,
            WarehouseOrderStatus::Dispatched => CustomerOrderStatus::OnRoute,
            WarehouseOrderStatus::Delivered => CustomerOrderStatus::Delivered,
        }
    }

    pub fn accepts_driver(self) -> bool {
        matches!(
            self,
            WarehouseOrderStatus::ReadyForDriverAssignment | WarehouseOrderStatus::AssignedToDriver
        )
    }

    /// Statuses that pull the order back from any driver currently holding it.
    pub fn releases_driver(self) -> bool {
        matches!(
            self,
            WarehouseOrderStatus::Draft | WarehouseOrderStatus::ReadyForDriverAssignment
        )
    }
}

impl fmt::Display for WarehouseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerOrderStatus {
    ReceivedAtWarehouse,
    ReadyForDelivery,
    OnRoute,
    Delivered,
}

impl fmt::Display for CustomerOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CustomerOrderStatus::ReceivedAtWarehouse => "received at warehouse",
            CustomerOrderStatus::ReadyForDelivery => "ready for delivery",
            CustomerOrderStatus::OnRoute => "on route",
            CustomerOrderStatus::Delivered => "delivered",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseOrder {
    pub id: Uuid,
    pub external_order_ref: String,
    pub customer_id: Uuid,
    pub customer_contact: String,
    pub status: WarehouseOrderStatus,
    pub manager_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseOrderItem {
    pub id: Uuid,
    pub warehouse_order_id: Uuid,
    pub item_ref: String,
    pub supplier_ref: Option<String>,
    pub unit_of_measure: String,
    pub customer_requested_amount: f64,
    pub warehouse_confirmed_amount: f64,
    pub customer_delivery_date: Option<NaiveDate>,
    pub supplier_delivery_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}
