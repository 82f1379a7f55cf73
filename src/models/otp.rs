use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOtp {
    pub id: Uuid,
    pub driver_order_id: Uuid,
    pub customer_id: Uuid,
    pub code: String,
    pub generated_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryOtp {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}
