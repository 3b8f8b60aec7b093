/*
 * 5D Labs Ingress Operator - Dual-source Ingress Reconciliation
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Ingress Operator - reconciles Voyager and native Ingress resources
//!
//! This service:
//! - Watches `voyager.appscode.com/v1beta1` and `networking.k8s.io/v1` Ingresses
//! - Keeps the `voyager.appscode.com` finalizer in sync with firewall support
//! - Hands load balancer provisioning to the configured delegate
//! - Serves health and readiness endpoints

use axum::{http::StatusCode, response::Json, routing::get, Router};
use ingress_operator::operator::DryRunDelegateFactory;
use ingress_operator::{run_operator, OperatorConfig};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ingress_operator=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!(
        "Starting 5D Labs Ingress Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_operator_config();
    let bind_address = config.health_bind_address.clone();
    let delegates = Arc::new(DryRunDelegateFactory::new(config.cloud_provider.clone()));

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let shutdown = CancellationToken::new();

    let operator_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_operator(client, config, delegates, shutdown.clone()).await {
                error!("Operator error: {}", e);
                shutdown.cancel();
            }
        })
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(10),
                )),
        );

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Health server listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                tokio::select! {
                    () = shutdown_signal() => {},
                    () = shutdown.cancelled() => {},
                }
                shutdown.cancel();
            }
        })
        .await?;

    // Let in-flight reconciliations finish
    if let Err(e) = operator_handle.await {
        error!("Operator task join error: {:?}", e);
    }
    info!("Ingress operator stopped");

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "ingress-operator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check() -> Json<Value> {
    Json(json!({
        "status": "ready",
        "service": "ingress-operator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn load_operator_config() -> OperatorConfig {
    let override_path = std::env::var("OPERATOR_CONFIG").ok();
    let config_path = override_path
        .as_deref()
        .filter(|path| Path::new(path).exists())
        .unwrap_or(DEFAULT_CONFIG_PATH);

    match OperatorConfig::from_mounted_file(config_path) {
        Ok(cfg) => {
            info!("Loaded operator configuration from {}", config_path);
            cfg
        }
        Err(err) => {
            warn!(
                "Failed to load configuration from {}: {}. Using defaults.",
                config_path, err
            );
            OperatorConfig::default()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
