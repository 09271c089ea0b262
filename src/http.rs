// SPDX-License-Identifier: Apache-2.0

//! HTTP/WebSocket surface: `GET /ws` streams processed frames to viewers,
//! `GET /config` reads back the live configuration, `POST /config` persists
//! a new one and restarts the process, and everything else falls back to a
//! static file directory. Built the way the pack's `uwb-simulator` and
//! `regatta-backend` build their control-panel servers: `axum` for routing,
//! `tower_http::services::ServeDir` for static files.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::services::ServeDir;
use tracing::{info, instrument, warn};

use crate::broadcast::SubscriberSet;
use crate::config::{self, Configuration};

#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<SubscriberSet>,
    pub config: Arc<std::sync::Mutex<Configuration>>,
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.config.lock().unwrap().static_dir.clone();

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/config", get(get_config).post(post_config))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip_all)]
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let handle = state.subscribers.subscribe();
    info!("viewer connected");

    loop {
        tokio::select! {
            frame = handle.rx.recv() => {
                match frame {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
        }
    }

    info!("viewer disconnected");
}

async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.config.lock().unwrap().clone())
}

async fn post_config(
    State(_state): State<AppState>,
    Json(new_config): Json<Configuration>,
) -> Result<(), (axum::http::StatusCode, String)> {
    if let Err(e) = new_config.validate() {
        return Err((axum::http::StatusCode::BAD_REQUEST, e.to_string()));
    }
    if let Err(e) = new_config.save() {
        warn!("failed to persist config.json: {}", e);
        return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }
    config::restart();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_config_round_trips_through_mutex() {
        let cfg = Configuration::default();
        let state = AppState {
            subscribers: Arc::new(SubscriberSet::new()),
            config: Arc::new(std::sync::Mutex::new(cfg.clone())),
        };
        assert_eq!(*state.config.lock().unwrap(), cfg);
    }
}
