//! telegram.rs - Telegram Bot API messenger
//!
//! Thin sendMessage client. A transport failure or an `ok: false`
//! reply both count as a delivery error; the caller decides what a
//! failed delivery means.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::publisher::{Markup, Messenger};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    description: Option<String>,
}

/// Messenger backed by the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramBot {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramBot {
    pub fn new(token: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        TelegramBot {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            token: token.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.to_string();
        self
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send(&self, channel: &str, text: &str, markup: Markup) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);

        let mut payload = serde_json::json!({
            "chat_id": channel,
            "text": text,
        });
        if markup == Markup::Html {
            payload["parse_mode"] = "HTML".into();
        }

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        let reply: ApiReply = response.json().await?;

        if !reply.ok {
            return Err(anyhow::anyhow!(
                "telegram rejected message ({}): {}",
                status,
                reply.description.unwrap_or_else(|| "no description".to_string())
            ));
        }

        Ok(())
    }
}
