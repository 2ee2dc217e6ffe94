// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parses the adapter's persisted `config` object into a typed
//! [`WebhookConfig`].

use crate::error::WebhookError;

/// Parsed configuration for one webhook adapter instance.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Port the inbound listener binds to.
    pub listen_port: u16,
    /// HTTP path the inbound listener accepts POSTs on.
    pub path: String,
    /// Subject suffix: inbound posts publish to
    /// `relay.human.webhook.<channel>`.
    pub channel: String,
    /// URL outbound publishes are POSTed to. `None` disables the outbound
    /// leg entirely.
    pub outbound_url: Option<String>,
    /// Sent as the `Authorization` header on outbound calls, and required
    /// (if set) on inbound requests.
    pub auth_header: Option<String>,
}

impl WebhookConfig {
    /// Parse `value`. `channel` is required; everything else has a
    /// sensible default or is optional.
    pub fn parse(value: &serde_json::Value) -> Result<Self, WebhookError> {
        let channel = value
            .get("channel")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(WebhookError::MissingChannel)?
            .to_string();

        let listen_port = value
            .get("listen_port")
            .and_then(|v| v.as_u64())
            .and_then(|p| u16::try_from(p).ok())
            .ok_or(WebhookError::InvalidPort)?;

        let path = value
            .get("path")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("/")
            .to_string();

        let outbound_url = value
            .get("outbound_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let auth_header = value
            .get("auth_header")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            listen_port,
            path,
            channel,
            outbound_url,
            auth_header,
        })
    }

    /// The subject inbound requests publish to.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("relay.human.webhook.{}", self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_channel_is_rejected() {
        let err = WebhookConfig::parse(&serde_json::json!({"listen_port": 8089})).unwrap_err();
        assert!(matches!(err, WebhookError::MissingChannel));
    }

    #[test]
    fn missing_port_is_rejected() {
        let err = WebhookConfig::parse(&serde_json::json!({"channel": "ci"})).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPort));
    }

    #[test]
    fn defaults_path_to_root() {
        let cfg = WebhookConfig::parse(&serde_json::json!({"channel": "ci", "listen_port": 8089})).unwrap();
        assert_eq!(cfg.path, "/");
        assert_eq!(cfg.subject(), "relay.human.webhook.ci");
        assert!(cfg.outbound_url.is_none());
    }

    #[test]
    fn parses_outbound_fields() {
        let cfg = WebhookConfig::parse(&serde_json::json!({
            "channel": "ci",
            "listen_port": 8089,
            "outbound_url": "https://example.test/hook",
            "auth_header": "Bearer xyz",
        }))
        .unwrap();
        assert_eq!(cfg.outbound_url.as_deref(), Some("https://example.test/hook"));
        assert_eq!(cfg.auth_header.as_deref(), Some("Bearer xyz"));
    }
}
