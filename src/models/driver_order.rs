use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverOrderStatus {
    Pending,
    Dispatched,
    Delivered,
    Skipped,
    SkippedByWarehouse,
    Cancelled,
}

impl DriverOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverOrderStatus::Pending => "Pending",
            DriverOrderStatus::Dispatched => "Dispatched",
            DriverOrderStatus::Delivered => "Delivered",
            DriverOrderStatus::Skipped => "Skipped",
            DriverOrderStatus::SkippedByWarehouse => "SkippedByWarehouse",
            DriverOrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Anything not skipped or cancelled still holds the warehouse order.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            DriverOrderStatus::Skipped
                | DriverOrderStatus::SkippedByWarehouse
                | DriverOrderStatus::Cancelled
        )
    }

    /// Pending or dispatched: the delivery has not finished and can still be
    /// pulled back from the driver.
    pub fn is_in_flight(self) -> bool {
        matches!(self, DriverOrderStatus::Pending | DriverOrderStatus::Dispatched)
    }

    /// Transition table for moves requested by the driver's client.
    pub fn check_driver_move(self, target: DriverOrderStatus) -> Result<(), AppError> {
        match (self, target) {
            (DriverOrderStatus::Delivered, _) => Err(AppError::OrderDelivered),
            (
                DriverOrderStatus::Skipped
                | DriverOrderStatus::SkippedByWarehouse
                | DriverOrderStatus::Cancelled,
                _,
            ) => Err(AppError::OrderSkipped),
            (DriverOrderStatus::Dispatched, DriverOrderStatus::Delivered) => Ok(()),
            (DriverOrderStatus::Dispatched, _) => Err(AppError::OrderDispatched),
            (
                DriverOrderStatus::Pending,
                DriverOrderStatus::Dispatched | DriverOrderStatus::Delivered,
            ) => Ok(()),
            (DriverOrderStatus::Pending, _) => Err(AppError::Validation(format!(
                "drivers cannot move an order to {target}"
            ))),
        }
    }
}

impl fmt::Display for DriverOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemConfirmationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ItemConfirmationStatus {
    /// Only "Confirmed" and "Rejected" are accepted from the customer; anything
    /// else, including nothing, leaves the line pending.
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Confirmed") => ItemConfirmationStatus::Confirmed,
            Some("Rejected") => ItemConfirmationStatus::Rejected,
            _ => ItemConfirmationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOrder {
    pub id: Uuid,
    pub warehouse_order_id: Uuid,
    pub driver_id: Uuid,
    pub status: DriverOrderStatus,
    pub is_driver_confirmed: bool,
    pub is_customer_confirmed: bool,
    pub is_otp_confirmed: bool,
    pub delivery_start_time: Option<DateTime<Utc>>,
    pub delivery_end_time: Option<DateTime<Utc>>,
    pub driver_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOrderItem {
    pub id: Uuid,
    pub driver_order_id: Uuid,
    pub item_ref: String,
    pub unit_of_measure: String,
    pub amount: f64,
    pub customer_requested_amount: f64,
    pub status: ItemConfirmationStatus,
    pub customer_confirmed_amount: f64,
}
