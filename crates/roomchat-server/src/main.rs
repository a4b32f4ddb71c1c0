mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use roomchat_api::auth::{AppState, AppStateInner, JwtSettings};
use roomchat_api::dispatcher::Dispatcher;
use roomchat_api::graphql::build_schema;
use roomchat_api::handlers::{self, ApiState};
use roomchat_api::middleware::require_auth;

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str =
    "roomchat=debug,roomchat_api=debug,roomchat_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = roomchat_db::Database::open(&config.db_path)?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt: JwtSettings {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
        },
        dispatcher: Dispatcher::new(),
    });

    let state = ApiState {
        app: app_state.clone(),
        schema: build_schema(app_state.clone()),
        graphiql: config.graphiql,
    };

    // Routes
    let public_routes = Router::new()
        .route("/graphiql", get(handlers::graphiql))
        .route("/graphql/ws", get(handlers::graphql_ws))
        .route("/schema.graphql", get(handlers::sdl))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/graphql", post(handlers::graphql))
        .layer(middleware::from_fn_with_state(app_state, require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("roomchat listening on {}", addr);
    if config.graphiql {
        info!("GraphiQL enabled at http://{}/graphiql", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
