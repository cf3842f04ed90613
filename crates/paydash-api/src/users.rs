use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use paydash_core::convert::user_view_from_row;
use paydash_core::guard::hash_password;
use paydash_db::models::UserRow;
use paydash_types::api::{CreateUserRequest, UpdateUserRequest};
use paydash_types::models::{UserRole, UserView};

use crate::auth::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.username.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let hash = hash_password(&req.password).map_err(|e| {
        error!("password hashing failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let now_ms = Utc::now().timestamp_millis();
    let row = UserRow {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email,
        password: hash,
        role: req.role.unwrap_or(UserRole::Standard).as_str().to_string(),
        is_active: true,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    };

    // The UNIQUE constraints on username and email are the source of truth
    // for conflicts.
    let db = state.db.clone();
    let inserted = row.clone();
    tokio::task::spawn_blocking(move || db.insert_user(&inserted))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            if paydash_db::is_unique_violation(&e) {
                StatusCode::CONFLICT
            } else {
                error!("user insert failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let view = view_or_500(&row)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_users())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("user list failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let views = rows
        .iter()
        .map(view_or_500)
        .collect::<Result<Vec<UserView>, _>>()?;
    Ok(Json(views))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = fetch_user(&state, id).await?;
    Ok(Json(view_or_500(&row)?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut row = fetch_user(&state, id).await?;

    if let Some(email) = req.email {
        row.email = email;
    }
    if let Some(password) = req.password {
        row.password = hash_password(&password).map_err(|e| {
            error!("password hashing failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }
    if let Some(role) = req.role {
        row.role = role.as_str().to_string();
    }
    if let Some(is_active) = req.is_active {
        row.is_active = is_active;
    }
    row.updated_at_ms = Utc::now().timestamp_millis();

    let db = state.db.clone();
    let updated = row.clone();
    tokio::task::spawn_blocking(move || db.update_user(&updated))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            if paydash_db::is_unique_violation(&e) {
                StatusCode::CONFLICT
            } else {
                error!("user update failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    Ok(Json(view_or_500(&row)?))
}

/// Users referenced by ledger history are never hard-deleted; delete means
/// deactivate. Their unexpired tokens stop working on the next guarded
/// call because validation re-resolves the account.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut row = fetch_user(&state, id).await?;
    row.is_active = false;
    row.updated_at_ms = Utc::now().timestamp_millis();

    let db = state.db.clone();
    let updated = row.clone();
    tokio::task::spawn_blocking(move || db.update_user(&updated))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("user deactivation failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_user(state: &AppState, id: Uuid) -> Result<UserRow, StatusCode> {
    let db = state.db.clone();
    let key = id.to_string();
    tokio::task::spawn_blocking(move || db.get_user_by_id(&key))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("user lookup failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

fn view_or_500(row: &UserRow) -> Result<UserView, StatusCode> {
    user_view_from_row(row).map_err(|e| {
        error!("corrupt user row {}: {e:#}", row.id);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
