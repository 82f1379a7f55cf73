pub mod customer_order;
pub mod driver_order;
pub mod event;
pub mod otp;
pub mod principal;
pub mod skip_request;
pub mod warehouse_order;
