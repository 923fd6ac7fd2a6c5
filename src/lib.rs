pub mod types;
pub mod error;
pub mod config;
pub mod startgg;
pub mod sets;
pub mod ongoing;

use types::*;
use config::*;
use error::StartggError;
use ongoing::{build_event_payload, fetch_ongoing_sets, ordered_events};
use startgg::StartggClient;

use std::{fs, path::Path};
use axum::{
    extract::{Path as AxumPath, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const NO_STORE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-store"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

// ── Polling ────────────────────────────────────────────────────────────

/// Polls every configured event, one after another. A failing event is reported in its
/// own entry and never stops the rest.
pub fn poll_all_events(config_path: &Path) -> Result<OngoingPayload, String> {
    let config = load_config_from(config_path)?;
    let client = StartggClient::from_config(&config).map_err(|e| e.user_message())?;
    let options = config.fetch_options();
    let events = ordered_events(&config)
        .into_iter()
        .map(|(name, event_ref)| {
            let result = fetch_ongoing_sets(&client, &event_ref, &options);
            if let Err(err) = &result {
                error!(event = %name, kind = err.kind(), "poll failed: {err}");
            }
            build_event_payload(&name, &event_ref, result, now_secs())
        })
        .collect();
    Ok(OngoingPayload { events })
}

/// Polls one event by configured name. Unknown names are treated as a raw id or slug.
pub fn poll_one_event(config_path: &Path, name: &str) -> Result<EventOngoingPayload, String> {
    let config = load_config_from(config_path)?;
    let event_ref = config
        .event_slugs
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string());
    let options = config.fetch_options();
    let result = StartggClient::from_config(&config)
        .and_then(|client| fetch_ongoing_sets(&client, &event_ref, &options));
    if let Err(err) = &result {
        error!(event = %name, kind = err.kind(), "poll failed: {err}");
    }
    Ok(build_event_payload(name, &event_ref, result, now_secs()))
}

pub fn status_for_error_kind(kind: Option<&str>) -> StatusCode {
    match kind {
        None => StatusCode::OK,
        Some("eventNotFound") => StatusCode::NOT_FOUND,
        Some("exhaustedFallback") => StatusCode::SERVICE_UNAVAILABLE,
        Some("config") => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::BAD_GATEWAY,
    }
}

// ── HTTP server ────────────────────────────────────────────────────────

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        NO_STORE_HEADERS,
        Json(json!({ "error": message })),
    )
        .into_response()
}

async fn get_ongoing_json(AxumState(state): AxumState<ServerState>) -> Response {
    let config_path = state.config_path.clone();
    match tokio::task::spawn_blocking(move || poll_all_events(&config_path)).await {
        Ok(Ok(payload)) => (StatusCode::OK, NO_STORE_HEADERS, Json(payload)).into_response(),
        Ok(Err(message)) => {
            error!("ongoing poll failed: {message}");
            internal_error(message)
        }
        Err(e) => internal_error(format!("poll task failed: {e}")),
    }
}

async fn get_event_ongoing_json(
    AxumState(state): AxumState<ServerState>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    let config_path = state.config_path.clone();
    match tokio::task::spawn_blocking(move || poll_one_event(&config_path, &name)).await {
        Ok(Ok(payload)) => {
            let status = status_for_error_kind(payload.error_kind);
            (status, NO_STORE_HEADERS, Json(payload)).into_response()
        }
        Ok(Err(message)) => internal_error(message),
        Err(e) => internal_error(format!("poll task failed: {e}")),
    }
}

async fn get_display_config_json(AxumState(state): AxumState<ServerState>) -> Response {
    match load_config_from(&state.config_path) {
        Ok(config) => {
            let payload = DisplayConfigPayload {
                scroll_speed: config.scroll_speed,
                refresh_interval_ms: config.refresh_interval_ms,
                rotation: config.rotation,
            };
            (StatusCode::OK, NO_STORE_HEADERS, Json(payload)).into_response()
        }
        Err(message) => internal_error(message),
    }
}

pub fn ongoing_router(state: ServerState, display_dir: &Path) -> Router {
    Router::new()
        .route("/api/ongoing", get(get_ongoing_json))
        .route("/api/ongoing/:name", get(get_event_ongoing_json))
        .route("/api/config", get(get_display_config_json))
        .fallback_service(ServeDir::new(display_dir))
        .with_state(state)
}

async fn start_server(state: ServerState, display_dir: &Path, addr: &str) {
    let app = ongoing_router(state, display_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("ongoing server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("ongoing server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("ongoing server error: {e}");
    }
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();

    // Initialize tracing with a daily rolling file
    let logs_dir = repo_root().join("logs");
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("startgg-ongoing starting");

    let config_path = config_path();
    let config = match load_config_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    if config.startgg_token.trim().is_empty() {
        warn!("{}", StartggError::MissingToken);
    }
    if config.event_slugs.is_empty() {
        warn!("no events configured in {}", config_path.display());
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    let display_dir = resolve_repo_path(&config.display_dir);
    let state = ServerState { config_path };
    runtime.block_on(start_server(state, &display_dir, &config.bind_addr));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("startgg-ongoing-{}-{name}.json", std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        assert_eq!(status_for_error_kind(None), StatusCode::OK);
        assert_eq!(status_for_error_kind(Some("eventNotFound")), StatusCode::NOT_FOUND);
        assert_eq!(status_for_error_kind(Some("exhaustedFallback")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for_error_kind(Some("transport")), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for_error_kind(Some("remote")), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn malformed_config_fails_the_whole_poll() {
        let path = temp_config("malformed", "{ not json");
        let err = poll_all_events(&path).unwrap_err();
        assert!(err.starts_with("parse config"));
        fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn display_config_endpoint_reads_file() {
        let path = temp_config(
            "display",
            r#"{ "scrollSpeed": 2.0, "refreshIntervalMs": 3000, "rotation": { "enabled": true, "intervalSeconds": 12, "order": ["A"] } }"#,
        );
        let response = get_display_config_json(AxumState(ServerState { config_path: path.clone() })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Cache-Control").and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
        fs::remove_file(path).ok();
    }
}
