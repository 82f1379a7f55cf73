use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::principal::{DriverId, StaffId};

pub const DRIVER_HEADER: &str = "x-driver-id";
pub const STAFF_HEADER: &str = "x-staff-id";

#[async_trait]
impl<S> FromRequestParts<S> for DriverId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_header(parts, DRIVER_HEADER).map(DriverId)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_header(parts, STAFF_HEADER).map(StaffId)
    }
}

fn principal_from_header(parts: &Parts, header: &str) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(header)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {header} header")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("{header} header is not valid text")))?;

    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Unauthorized(format!("{header} header is not a valid id")))
}
