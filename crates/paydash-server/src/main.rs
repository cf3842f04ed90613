use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use paydash_api::auth::{self, AppState, AppStateInner};
use paydash_api::middleware::require_auth;
use paydash_api::{payments, users};
use paydash_core::{PaymentLedger, SessionGuard};
use paydash_gateway::{connection, Dispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paydash=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PAYDASH_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PAYDASH_DB_PATH").unwrap_or_else(|_| "paydash.db".into());
    let host = std::env::var("PAYDASH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PAYDASH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let token_ttl_hours: i64 = std::env::var("PAYDASH_TOKEN_TTL_HOURS")
        .unwrap_or_else(|_| "24".into())
        .parse()?;
    let admin_password =
        std::env::var("PAYDASH_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into());

    // Init database
    let db = Arc::new(paydash_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let guard = SessionGuard::new(
        db.clone(),
        jwt_secret,
        chrono::Duration::hours(token_ttl_hours),
    );
    guard.bootstrap(&admin_password).await?;

    let ledger = PaymentLedger::new(db.clone(), Arc::new(dispatcher.clone()));
    let app_state: AppState = Arc::new(AppStateInner { db, guard, ledger });

    // Routes
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/payments", post(payments::create_payment))
        .route("/payments", get(payments::list_payments))
        .route("/payments/stats", get(payments::get_stats))
        .route("/payments/export", get(payments::export_csv))
        .route("/payments/{id}", get(payments::get_payment))
        .route("/users", post(users::create_user))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", axum::routing::patch(users::update_user))
        .route("/users/{id}", axum::routing::delete(users::delete_user))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(dispatcher);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("paydash server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(dispatcher): State<Dispatcher>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}
