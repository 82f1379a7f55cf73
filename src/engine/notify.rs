use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::warehouse_order::CustomerOrderStatus;

/// Outbound seam to the e-commerce side that owns the customer's order.
pub trait CustomerOrderGateway: Send + Sync {
    fn notify_status(
        &self,
        customer_order_ref: &str,
        status: CustomerOrderStatus,
    ) -> Result<(), AppError>;
}

/// Outbound seam to whatever delivers the one-time code to the customer.
pub trait OtpSender: Send + Sync {
    fn send_code(
        &self,
        contact: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct LoggingGateway;

impl CustomerOrderGateway for LoggingGateway {
    fn notify_status(
        &self,
        customer_order_ref: &str,
        status: CustomerOrderStatus,
    ) -> Result<(), AppError> {
        info!(
            customer_order_ref,
            customer_status = %status,
            "customer order status pushed"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingOtpSender;

impl OtpSender for LoggingOtpSender {
    fn send_code(
        &self,
        contact: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        info!(contact, expires_at = %expires_at, "delivery code sent");
        debug!(contact, code, "delivery code payload");
        Ok(())
    }
}
