pub mod assignment;
pub mod confirmation;
pub mod intake;
pub mod ledger;
pub mod notify;
pub mod otp;
pub mod skip;
pub mod status;

use tokio::sync::OwnedMutexGuard;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver_order::DriverOrder;
use crate::models::principal::DriverId;
use crate::state::AppState;

/// Loads a driver order on behalf of its driver and takes the lock of the
/// warehouse order it belongs to. The returned row is read under the lock.
pub(crate) async fn lock_driver_order(
    state: &AppState,
    driver: DriverId,
    driver_order_id: Uuid,
) -> Result<(OwnedMutexGuard<()>, DriverOrder), AppError> {
    let order = state.driver_order(driver_order_id)?;
    ensure_owner(&order, driver)?;

    let guard = state.lock_order(order.warehouse_order_id).await;
    let order = state.driver_order(driver_order_id)?;
    Ok((guard, order))
}

pub(crate) fn ensure_owner(order: &DriverOrder, driver: DriverId) -> Result<(), AppError> {
    if order.driver_id != driver.0 {
        warn!(
            driver_order_id = %order.id,
            driver_id = %driver,
            "driver tried to act on another driver's order"
        );
        return Err(AppError::Forbidden(format!(
            "driver order {} belongs to another driver",
            order.id
        )));
    }
    Ok(())
}
