use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::auth::{auth_status, AppState};

/// Extract the bearer token and validate it through the session guard.
/// The guard re-resolves the subject on every call, so a freshly
/// deactivated account is rejected here even with an unexpired token.
/// The resolved `UserView` lands in request extensions for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let user = state.guard.validate(token).await.map_err(auth_status)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
