// SPDX-License-Identifier: Apache-2.0

//! Service entry point: wires together UDP ingestion, the processing
//! pipeline, and the HTTP/WebSocket surface. Logging setup mirrors the
//! teacher's `radarpub.rs`: an `EnvFilter`-driven stdout layer plus an
//! optional `tracing-journald` layer, composed on a `Registry`.

use std::sync::{Arc, Mutex};

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Registry};

use scanhub::broadcast::SubscriberSet;
use scanhub::config::Configuration;
use scanhub::http::{self, AppState};
use scanhub::{net, pipeline};

fn init_logging() {
    let env_filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_log = tracing_subscriber::fmt::layer();

    let journald = match tracing_journald::layer() {
        Ok(layer) => Some(layer),
        Err(e) => {
            eprintln!("journald logging unavailable, continuing without it: {e}");
            None
        }
    };

    Registry::default()
        .with(env_filter)
        .with(stdout_log)
        .with(journald)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = match Configuration::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("fatal configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(udp_port = config.udp_port, http_port = config.http_port, "starting scanhub");

    let udp_port = config.udp_port;
    let http_port = config.http_port;
    let config = Arc::new(Mutex::new(config));

    let (tx, rx) = kanal::bounded_async(256);
    let subscribers = Arc::new(SubscriberSet::new());

    let ingestion = tokio::spawn(net::run_ingestion(udp_port, tx));

    let pipeline_config = config.clone();
    let pipeline_subscribers = subscribers.clone();
    let pipeline_task = tokio::spawn(async move {
        pipeline::run(rx, pipeline_subscribers, pipeline_config).await;
    });

    let state = AppState {
        subscribers,
        config,
    };
    let app = http::router(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind http port {}: {}", http_port, e);
            std::process::exit(1);
        }
    };

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("http server error: {}", e);
        }
    });

    tokio::select! {
        _ = ingestion => error!("udp ingestion task exited unexpectedly"),
        _ = pipeline_task => error!("pipeline task exited unexpectedly"),
        _ = server => error!("http server task exited unexpectedly"),
        _ = tokio::signal::ctrl_c() => info!("received shutdown signal"),
    }
}
