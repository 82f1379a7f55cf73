use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::engine::notify::{CustomerOrderGateway, LoggingGateway, LoggingOtpSender, OtpSender};
use crate::error::AppError;
use crate::models::driver_order::{DriverOrder, DriverOrderItem};
use crate::models::event::FulfillmentEvent;
use crate::models::otp::DeliveryOtp;
use crate::models::skip_request::SkipOrderRequest;
use crate::models::warehouse_order::{WarehouseOrder, WarehouseOrderItem};
use crate::observability::metrics::Metrics;

const DEFAULT_OTP_TTL_MINUTES: i64 = 5;

pub struct AppState {
    pub warehouse_orders: DashMap<Uuid, WarehouseOrder>,
    pub warehouse_items: DashMap<Uuid, WarehouseOrderItem>,
    pub driver_orders: DashMap<Uuid, DriverOrder>,
    pub driver_items: DashMap<Uuid, DriverOrderItem>,
    pub skip_requests: DashMap<Uuid, SkipOrderRequest>,
    pub otps: DashMap<Uuid, DeliveryOtp>,
    pub external_refs: DashMap<String, Uuid>,
    pub events_tx: broadcast::Sender<FulfillmentEvent>,
    pub customer_orders: Arc<dyn CustomerOrderGateway>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub otp_ttl: Duration,
    pub metrics: Metrics,
    order_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            warehouse_orders: DashMap::new(),
            warehouse_items: DashMap::new(),
            driver_orders: DashMap::new(),
            driver_items: DashMap::new(),
            skip_requests: DashMap::new(),
            otps: DashMap::new(),
            external_refs: DashMap::new(),
            events_tx,
            customer_orders: Arc::new(LoggingGateway),
            otp_sender: Arc::new(LoggingOtpSender),
            otp_ttl: Duration::minutes(DEFAULT_OTP_TTL_MINUTES),
            metrics: Metrics::new(),
            order_locks: DashMap::new(),
        }
    }

    pub fn with_collaborators(
        mut self,
        customer_orders: Arc<dyn CustomerOrderGateway>,
        otp_sender: Arc<dyn OtpSender>,
    ) -> Self {
        self.customer_orders = customer_orders;
        self.otp_sender = otp_sender;
        self
    }

    pub fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl = Duration::minutes(minutes);
        self
    }

    /// Serializes every mutation touching one warehouse order and its driver
    /// orders. Not reentrant: cascades run under the caller's guard.
    pub async fn lock_order(&self, warehouse_order_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .order_locks
            .entry(warehouse_order_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    pub fn publish(&self, event: FulfillmentEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn warehouse_order(&self, id: Uuid) -> Result<WarehouseOrder, AppError> {
        self.warehouse_orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("warehouse order {id} not found")))
    }

    pub fn driver_order(&self, id: Uuid) -> Result<DriverOrder, AppError> {
        self.driver_orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver order {id} not found")))
    }

    pub fn update_driver_order<F>(&self, id: Uuid, apply: F) -> Result<DriverOrder, AppError>
    where
        F: FnOnce(&mut DriverOrder),
    {
        let updated = {
            let mut order = self
                .driver_orders
                .get_mut(&id)
                .ok_or_else(|| AppError::Storage(format!("driver order {id} vanished")))?;
            apply(&mut *order);
            order.updated_at = chrono::Utc::now();
            order.clone()
        };

        self.refresh_active_gauge();
        Ok(updated)
    }

    pub fn items_of_warehouse_order(&self, warehouse_order_id: Uuid) -> Vec<WarehouseOrderItem> {
        let mut items: Vec<WarehouseOrderItem> = self
            .warehouse_items
            .iter()
            .filter(|entry| entry.warehouse_order_id == warehouse_order_id)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.item_ref.cmp(&b.item_ref).then(a.id.cmp(&b.id)));
        items
    }

    pub fn items_of_driver_order(&self, driver_order_id: Uuid) -> Vec<DriverOrderItem> {
        let mut items: Vec<DriverOrderItem> = self
            .driver_items
            .iter()
            .filter(|entry| entry.driver_order_id == driver_order_id)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.item_ref.cmp(&b.item_ref).then(a.id.cmp(&b.id)));
        items
    }

    /// Driver orders of one warehouse order, oldest first.
    pub fn driver_orders_of(&self, warehouse_order_id: Uuid) -> Vec<DriverOrder> {
        let mut orders: Vec<DriverOrder> = self
            .driver_orders
            .iter()
            .filter(|entry| entry.warehouse_order_id == warehouse_order_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    pub fn active_driver_orders(&self, warehouse_order_id: Uuid) -> Vec<DriverOrder> {
        self.driver_orders_of(warehouse_order_id)
            .into_iter()
            .filter(|order| order.status.is_active())
            .collect()
    }

    pub fn latest_driver_order(&self, warehouse_order_id: Uuid) -> Option<DriverOrder> {
        self.driver_orders_of(warehouse_order_id).pop()
    }

    pub fn driver_orders_for_driver(&self, driver_id: Uuid) -> Vec<DriverOrder> {
        let mut orders: Vec<DriverOrder> = self
            .driver_orders
            .iter()
            .filter(|entry| entry.driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    pub fn refresh_active_gauge(&self) {
        let in_flight = self
            .driver_orders
            .iter()
            .filter(|entry| entry.status.is_in_flight())
            .count();
        self.metrics.active_driver_orders.set(in_flight as i64);
    }
}
