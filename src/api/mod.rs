pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::agents;
use crate::config::Settings;
use crate::graph::Executor;
use crate::services::Services;

use auth::AuthVerifier;
use state::AppState;

pub async fn serve(host: &str, port: u16, settings: Settings) -> Result<()> {
    let services = Arc::new(Services::from_settings(&settings));
    let graph = agents::build_graph(Arc::clone(&services)).context("compiling plan graph")?;
    let executor = Executor::new(graph);
    let auth = AuthVerifier::new(settings.auth0_domain.clone(), settings.auth0_audience.clone());

    let state = AppState::new(services, executor, auth);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/plan", post(handlers::create_plan))
        .route("/ws/plan", get(handlers::ws_plan))
        .route("/voice/synthesize", post(handlers::synthesize_voice))
        .layer(cors)
        .with_state(state);

    let addr = format!("{host}:{port}");
    println!("venue-flow API server listening on {addr}");
    println!("  Health:  GET  http://{addr}/health");
    println!("  Plan:    POST http://{addr}/plan");
    println!("  Stream:  WS   ws://{addr}/ws/plan");
    println!("  Voice:   POST http://{addr}/voice/synthesize");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    axum::serve(listener, app).await.context("running server")?;

    Ok(())
}
