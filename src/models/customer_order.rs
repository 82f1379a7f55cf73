use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer order as handed over by the order-placement side once its
/// goods are received at the warehouse. Read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub external_order_ref: String,
    pub customer_id: Uuid,
    pub customer_contact: String,
    pub lines: Vec<CustomerOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOrderLine {
    pub item_ref: String,
    #[serde(default)]
    pub supplier_ref: Option<String>,
    pub unit_of_measure: String,
    pub requested_amount: f64,
    #[serde(default)]
    pub requested_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}
