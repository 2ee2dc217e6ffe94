// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`TelegramAdapter`]: polls the Bot API for updates, translating text
//! messages into publishes on `relay.human.telegram.<chatId>`, and
//! translates publishes addressed back to that pattern into outbound
//! `sendMessage` calls. Modeled on the reference bot handler's
//! allowlist-then-dispatch shape, simplified down to pure translation
//! since session and command handling live in the router and bridge.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_adapter_core::{Adapter, AdapterState, AdapterStatus, PublishSink};
use teloxide::prelude::*;
use teloxide::types::{ChatId, UpdateKind};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::TelegramConfig;

const SUBJECT_PREFIX: &str = "relay.human.telegram";
const POLL_TIMEOUT_SECS: u32 = 30;

/// A single Telegram bot instance, translating between chat messages and
/// Relay publishes.
pub struct TelegramAdapter {
    config: TelegramConfig,
    status: Arc<Mutex<AdapterStatus>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl TelegramAdapter {
    /// Build a new, not-yet-started instance from its parsed config.
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            status: Arc::new(Mutex::new(AdapterStatus::default())),
            stop_tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Adapter for TelegramAdapter {
    async fn start(&self, sink: Arc<dyn PublishSink>) -> anyhow::Result<()> {
        let bot = Bot::new(&self.config.bot_token);
        let config = self.config.clone();
        let status = Arc::clone(&self.status);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        {
            let mut s = status.lock().unwrap();
            s.state = AdapterState::Connecting;
        }

        tokio::spawn(async move {
            status.lock().unwrap().state = AdapterState::Connected;
            let mut offset: i32 = 0;
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                let updates = tokio::select! {
                    _ = stop_rx.changed() => break,
                    res = bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS).send() => res,
                };
                let updates = match updates {
                    Ok(u) => u,
                    Err(e) => {
                        warn!(target: "relay.adapter.telegram", error = %e, "get_updates failed");
                        let mut s = status.lock().unwrap();
                        s.state = AdapterState::Error;
                        s.error_count += 1;
                        s.last_error = Some(e.to_string());
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                        continue;
                    }
                };
                status.lock().unwrap().state = AdapterState::Connected;
                for update in updates {
                    offset = update.id.0 as i32 + 1;
                    let UpdateKind::Message(msg) = update.kind else {
                        continue;
                    };
                    let chat_id = msg.chat.id.0;
                    if !config.allows(chat_id) {
                        debug!(target: "relay.adapter.telegram", chat_id, "message from disallowed chat, dropping");
                        continue;
                    }
                    let Some(text) = msg.text() else { continue };
                    let subject = format!("{SUBJECT_PREFIX}.{chat_id}");
                    let payload = serde_json::json!({
                        "text": text,
                        "chatId": chat_id,
                        "fromUserId": msg.from.as_ref().map(|u| u.id.0),
                    });
                    match sink.publish(&subject, payload, "telegram").await {
                        Ok(()) => status.lock().unwrap().messages_in += 1,
                        Err(e) => {
                            warn!(target: "relay.adapter.telegram", chat_id, error = %e, "failed to publish inbound message");
                            let mut s = status.lock().unwrap();
                            s.error_count += 1;
                            s.last_error = Some(e.to_string());
                        }
                    }
                }
            }
            status.lock().unwrap().state = AdapterState::Disconnected;
        });

        *self.stop_tx.lock().unwrap() = Some(stop_tx);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(tx) = self.stop_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        self.status.lock().unwrap().state = AdapterState::Disconnected;
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().unwrap().clone()
    }

    fn outbound_pattern(&self) -> String {
        format!("{SUBJECT_PREFIX}.>")
    }

    async fn deliver_outbound(&self, subject: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let chat_id: i64 = subject
            .rsplit('.')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("subject {subject} has no trailing chat id"))?;
        let text = payload
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("outbound payload missing text field"))?;

        let bot = Bot::new(&self.config.bot_token);
        bot.send_message(ChatId(chat_id), text).send().await?;
        self.status.lock().unwrap().messages_out += 1;
        Ok(())
    }
}
