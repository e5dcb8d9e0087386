//! WeRoBot Echo - demo server for the axum binding.
//!
//! Serves a robot that echoes text messages and greets new followers.
//! Token and URL rule come from `WEROBOT_TOKEN` and `WEROBOT_ROLE`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Json};
use serde::Serialize;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use werobot_axum::{AxumHost, BaseRobot, Config, Reply, WeRobot};

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn echo_robot() -> BaseRobot {
    let mut robot = BaseRobot::new();
    robot
        .text(|message| message.content().map(Reply::text))
        .subscribe(|_| Some(Reply::text("Thanks for following!")));
    robot
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("werobot_echo_starting");

    let config = Config::from_env();
    info!(
        port = config.port,
        endpoint = %config.endpoint,
        token_configured = config.host.contains_key(werobot_axum::config::TOKEN_KEY),
        rule_configured = config.host.contains_key(werobot_axum::config::RULE_KEY),
        "config_loaded"
    );

    let mut host = AxumHost::new(config.host.clone());
    host.route("/health", "health", get(health))
        .context("Failed to register health route")?;

    let werobot = WeRobot::with_host(echo_robot(), &mut host, Some(&config.endpoint), None)
        .context("Failed to bind robot")?;
    for binding in werobot.bindings() {
        info!(endpoint = %binding.endpoint, rule = %binding.rule, "robot_route_ready");
    }

    let app = host.into_router().layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
