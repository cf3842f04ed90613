use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Payment, PaymentMethod, PaymentStatus, UserRole, UserView};

// -- JWT Claims --

/// Session token claim set, shared by the HTTP middleware and the token
/// issuing/validation paths. Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserView,
}

// -- Payments --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub receiver: String,
    pub description: Option<String>,
    #[serde(rename = "failureReason")]
    pub failure_reason: Option<String>,
}

/// Filter/pagination query for listing payments. All filters are applied
/// conjunctively; the date range is inclusive on both ends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    #[serde(rename = "startDate")]
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "endDate")]
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).max(1)
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<Payment>,
    pub total: u64,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
}
