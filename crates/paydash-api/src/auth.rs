use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::error;

use paydash_core::{AuthError, PaymentLedger, SessionGuard};
use paydash_db::Database;
use paydash_types::api::{LoginRequest, LoginResponse};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub guard: SessionGuard,
    pub ledger: PaymentLedger,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (access_token, user) = state
        .guard
        .issue(&req.username, &req.password)
        .await
        .map_err(auth_status)?;

    Ok(Json(LoginResponse { access_token, user }))
}

/// Every authentication failure surfaces as 401; only a storage fault is a
/// server error.
pub(crate) fn auth_status(err: AuthError) -> StatusCode {
    match err {
        AuthError::Storage(e) => {
            error!("auth storage failure: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::UNAUTHORIZED,
    }
}
