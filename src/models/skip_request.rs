use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Staff decision on a pending skip request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipDecision {
    Accepted,
    Rejected,
}

impl From<SkipDecision> for SkipRequestStatus {
    fn from(decision: SkipDecision) -> Self {
        match decision {
            SkipDecision::Accepted => SkipRequestStatus::Accepted,
            SkipDecision::Rejected => SkipRequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipOrderRequest {
    pub id: Uuid,
    pub driver_order_id: Uuid,
    pub driver_id: Uuid,
    pub reason: String,
    pub status: SkipRequestStatus,
    pub admin_reply: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
