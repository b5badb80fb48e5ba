//! 💬 Telegram Bot API — just the two calls we need, `getUpdates` and `sendMessage`.
//!
//! Every call is a JSON POST to `<api_url>/bot<token>/<method>`. The API answers with
//! `{"ok": bool, "result": ..., "description": ...}`, and it answers that way on 4xx too,
//! so we read the envelope instead of trusting the status code.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::app_config::TelegramConfig;

/// ⏳ How long `getUpdates` holds the connection open waiting for news.
pub(crate) const LONG_POLL_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Update {
    pub(crate) update_id: i64,
    pub(crate) message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IncomingMessage {
    pub(crate) chat: Chat,
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Chat {
    pub(crate) id: i64,
}

/// 📡 A thin client bound to one bot token.
pub(crate) struct TelegramClient {
    http: reqwest::Client,
    /// `<api_url>/bot<token>`, which is a secret, so no derived Debug
    base: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").field("base", &"***").finish()
    }
}

impl TelegramClient {
    pub(crate) fn new(config: &TelegramConfig) -> Result<Self> {
        // -- the client timeout has to outlast the long poll, or every quiet minute is an error
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(LONG_POLL_SECS + 15))
            .build()
            .context("💀 The Telegram HTTP client refused to be born")?;
        Ok(Self {
            http,
            base: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &serde_json::Value) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(payload)
            .send()
            .await
            // -- reqwest errors carry the url, and the url carries the token
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("💀 Telegram {method} did not go through"))?;
        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("💀 Telegram {method} answered HTTP {status} with something that is not JSON"))?;

        if !envelope.ok {
            bail!(
                "💀 Telegram {method} failed (HTTP {status}): {}",
                envelope.description.as_deref().unwrap_or("no description")
            );
        }
        envelope
            .result
            .with_context(|| format!("💀 Telegram {method} said ok but sent no result"))
    }

    /// 📤 Send `text` as Markdown. If Telegram cannot parse the Markdown (an error message
    /// full of underscores will do it), send it again as plain text.
    pub(crate) async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let markdown = json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" });
        match self.call::<serde_json::Value>("sendMessage", &markdown).await {
            Ok(_) => Ok(()),
            Err(err) if format!("{err:#}").contains("can't parse entities") => {
                debug!("💬 markdown rejected, resending as plain text: {err:#}");
                let plain = json!({ "chat_id": chat_id, "text": text });
                self.call::<serde_json::Value>("sendMessage", &plain).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// 📥 Everything newer than `offset`, waiting up to `timeout_secs` for something to arrive.
    pub(crate) async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &payload).await?;
        if !updates.is_empty() {
            debug!("📥 {} update(s) from Telegram", updates.len());
        }
        Ok(updates)
    }

    /// 📤 Like [`send_message`](Self::send_message), but a failure is only worth a warning.
    pub(crate) async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.send_message(chat_id, text).await {
            warn!("📭 could not reply in chat {chat_id}: {err:#}");
        }
    }
}
