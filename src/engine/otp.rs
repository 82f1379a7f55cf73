//! One-time delivery codes proving the customer was at the door.

use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lock_driver_order;
use crate::error::AppError;
use crate::models::driver_order::DriverOrder;
use crate::models::otp::DeliveryOtp;
use crate::models::principal::DriverId;
use crate::state::AppState;

const CODE_DIGITS: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedOtp {
    pub code: String,
    pub contact: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Issues a fresh code for `customer_id`, replacing any code this driver still
/// has outstanding for the same order.
pub async fn issue(
    state: &AppState,
    driver: DriverId,
    customer_id: Uuid,
    driver_order_id: Uuid,
    ttl: Duration,
) -> Result<IssuedOtp, AppError> {
    let (_guard, order) = lock_driver_order(state, driver, driver_order_id).await?;

    if order.is_otp_confirmed {
        return Err(AppError::AlreadyConfirmed(
            "delivery code was already validated for this order".to_string(),
        ));
    }
    if !order.status.is_active() {
        return Err(AppError::OrderSkipped);
    }

    let warehouse_order = state.warehouse_order(order.warehouse_order_id)?;
    if warehouse_order.customer_id != customer_id {
        return Err(AppError::Validation(format!(
            "customer {customer_id} does not own driver order {driver_order_id}"
        )));
    }

    // Replaces this driver's code for the order and sweeps expired rows.
    let now = Utc::now();
    state.otps.retain(|_, otp| {
        otp.is_live(now) && !(otp.generated_by == driver.0 && otp.driver_order_id == driver_order_id)
    });

    let otp = DeliveryOtp {
        id: Uuid::new_v4(),
        driver_order_id,
        customer_id,
        code: generate_code(),
        generated_by: driver.0,
        expires_at: now + ttl,
        is_used: false,
        created_at: now,
    };
    state.otps.insert(otp.id, otp.clone());

    state
        .metrics
        .otp_events_total
        .with_label_values(&["issued"])
        .inc();
    info!(
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        expires_at = %otp.expires_at,
        "delivery code issued"
    );

    Ok(IssuedOtp {
        code: otp.code,
        contact: warehouse_order.customer_contact,
        expires_at: otp.expires_at,
    })
}

/// Consumes a live code of `customer_id` issued by `driver` for this driver
/// order and marks the order as code-confirmed.
pub async fn validate(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
    customer_id: Uuid,
    code: &str,
) -> Result<DriverOrder, AppError> {
    let (_guard, _order) = lock_driver_order(state, driver, driver_order_id).await?;

    let code = code.trim();
    let now = Utc::now();
    let candidate = state
        .otps
        .iter()
        .find(|entry| {
            entry.driver_order_id == driver_order_id
                && entry.customer_id == customer_id
                && entry.generated_by == driver.0
                && entry.code == code
                && entry.is_live(now)
        })
        .map(|entry| entry.id);

    let Some(otp_id) = candidate else {
        return Err(reject(state, customer_id));
    };

    // Whoever removes the row first wins; a replay finds nothing.
    if state
        .otps
        .remove_if(&otp_id, |_, otp| otp.is_live(Utc::now()))
        .is_none()
    {
        return Err(reject(state, customer_id));
    }

    let order = state.update_driver_order(driver_order_id, |row| {
        row.is_otp_confirmed = true;
    })?;

    state
        .metrics
        .otp_events_total
        .with_label_values(&["validated"])
        .inc();
    info!(
        driver_order_id = %driver_order_id,
        driver_id = %driver,
        "delivery code validated"
    );

    Ok(order)
}

fn reject(state: &AppState, customer_id: Uuid) -> AppError {
    state
        .metrics
        .otp_events_total
        .with_label_values(&["rejected"])
        .inc();
    warn!(customer_id = %customer_id, "delivery code rejected");
    AppError::InvalidOrExpired
}

fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:0width$}", width = CODE_DIGITS)
}
