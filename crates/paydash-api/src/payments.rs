use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::error;
use uuid::Uuid;

use paydash_core::LedgerError;
use paydash_types::api::{CreatePaymentRequest, PaymentFilter, PaymentListResponse};

use crate::auth::AppState;

pub async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let payment = state.ledger.create(req).await.map_err(ledger_status)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse, StatusCode> {
    let (payments, total) = state.ledger.list(&filter).await.map_err(ledger_status)?;
    Ok(Json(PaymentListResponse { payments, total }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let payment = state.ledger.find_by_id(id).await.map_err(ledger_status)?;
    Ok(Json(payment))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let snapshot = state.ledger.stats().compute().await.map_err(|e| {
        error!("stats computation failed: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(snapshot))
}

pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let csv = state.ledger.export_csv().await.map_err(ledger_status)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"payments.csv\"",
            ),
        ],
        csv,
    ))
}

pub(crate) fn ledger_status(err: LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidAmount | LedgerError::EmptyReceiver => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::PersistenceConflict => StatusCode::CONFLICT,
        LedgerError::Storage(e) => {
            error!("ledger storage failure: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
