// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`WebhookAdapter`]: an inbound HTTP listener publishing POST bodies to
//! `relay.human.webhook.<channel>`, and an outbound leg POSTing publishes
//! addressed back to that subject to a configured URL.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use relay_adapter_core::{Adapter, AdapterState, AdapterStatus, PublishSink};
use tokio::sync::Notify;
use tracing::warn;

use crate::config::WebhookConfig;
use crate::error::WebhookError;

struct HandlerState {
    sink: Arc<dyn PublishSink>,
    subject: String,
    auth_header: Option<String>,
    status: Arc<Mutex<AdapterStatus>>,
}

async fn handle_inbound(
    State(state): State<Arc<HandlerState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if let Some(expected) = &state.auth_header {
        let provided = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED;
        }
    }

    match state.sink.publish(&state.subject, body, "webhook").await {
        Ok(()) => {
            state.status.lock().unwrap().messages_in += 1;
            StatusCode::OK
        }
        Err(e) => {
            warn!(target: "relay.adapter.webhook", error = %e, "failed to publish inbound webhook payload");
            let mut s = state.status.lock().unwrap();
            s.error_count += 1;
            s.last_error = Some(e.to_string());
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A single webhook endpoint, translating between an inbound HTTP POST
/// route and one Relay subject.
pub struct WebhookAdapter {
    config: WebhookConfig,
    status: Arc<Mutex<AdapterStatus>>,
    shutdown: Arc<Notify>,
    http: reqwest::Client,
}

impl WebhookAdapter {
    /// Build a new, not-yet-started instance from its parsed config.
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            status: Arc::new(Mutex::new(AdapterStatus::default())),
            shutdown: Arc::new(Notify::new()),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Adapter for WebhookAdapter {
    async fn start(&self, sink: Arc<dyn PublishSink>) -> anyhow::Result<()> {
        let state = Arc::new(HandlerState {
            sink,
            subject: self.config.subject(),
            auth_header: self.config.auth_header.clone(),
            status: Arc::clone(&self.status),
        });
        let app = Router::new().route(&self.config.path, post(handle_inbound)).with_state(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.listen_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WebhookError::Bind(e.to_string()))?;

        let shutdown = Arc::clone(&self.shutdown);
        self.status.lock().unwrap().state = AdapterState::Connected;
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await;
            if let Err(e) = result {
                warn!(target: "relay.adapter.webhook", error = %e, "webhook listener exited with error");
            }
        });
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.shutdown.notify_one();
        self.status.lock().unwrap().state = AdapterState::Disconnected;
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().unwrap().clone()
    }

    fn outbound_pattern(&self) -> String {
        self.config.subject()
    }

    async fn deliver_outbound(&self, _subject: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let url = self
            .config
            .outbound_url
            .as_deref()
            .ok_or(WebhookError::NoOutboundUrl)?;

        let mut req = self.http.post(url).json(&payload);
        if let Some(auth) = &self.config.auth_header {
            req = req.header(axum::http::header::AUTHORIZATION, auth);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook outbound POST to {url} failed with status {}", resp.status());
        }
        self.status.lock().unwrap().messages_out += 1;
        Ok(())
    }
}
