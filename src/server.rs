//! Plugin HTTP Transport
//!
//! Exposes the secrets plugin over HTTP: `POST /plugin/{request_name}` with
//! the raw JSON body, plus a health probe.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::plugin::{self, PluginError, SecretsPlugin};

#[derive(Clone)]
struct AppState {
    plugin: Arc<SecretsPlugin>,
}

/// Build the router serving the plugin
pub fn router(plugin: SecretsPlugin) -> Router {
    let state = AppState {
        plugin: Arc::new(plugin),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/plugin/:request_name", post(handle_plugin_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(addr: SocketAddr, plugin: SecretsPlugin) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Secrets plugin listening on {}", addr);

    axum::serve(listener, router(plugin))
        .await
        .context("HTTP server terminated")
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "extension": plugin::EXTENSION,
        "supported_versions": plugin::SUPPORTED_VERSIONS,
    }))
}

fn fault_status(error: &PluginError) -> StatusCode {
    match error {
        PluginError::UnhandledRequestType(_) => StatusCode::NOT_FOUND,
        PluginError::MalformedBody(_) => StatusCode::BAD_REQUEST,
        PluginError::EncodeResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_plugin_request(
    State(state): State<AppState>,
    Path(request_name): Path<String>,
    body: String,
) -> Response {
    match state.plugin.handle(&request_name, &body).await {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(response.body)).into_response()
        }
        Err(e) => {
            let status = fault_status(&e);
            warn!(request = %request_name, error = %e, "Plugin request rejected");
            (status, Json(serde_json::json!({ "message": e.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{").unwrap_err()
    }

    #[test]
    fn test_fault_status() {
        assert_eq!(
            fault_status(&PluginError::UnhandledRequestType("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            fault_status(&PluginError::MalformedBody(json_error())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            fault_status(&PluginError::EncodeResponse(json_error())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
