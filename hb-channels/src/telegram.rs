use crate::traits::ChannelAdapter;
use crate::types::{InboundMessage, MessageFormat, OutboundMessage};
use anyhow::Result;
use chrono::Utc;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TELEGRAM_CHANNEL_ID: &str = "telegram";
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_LONG_POLL_TIMEOUT_SECS: &str = "30";
const TELEGRAM_ALLOWED_UPDATES: &str = r#"["message"]"#;
const TELEGRAM_NON_TRANSIENT_DELAY: Duration = Duration::from_secs(10);
const TELEGRAM_RETRY_BASE_MS: u64 = 250;
const TELEGRAM_RETRY_MAX_MS: u64 = 30_000;
/// Bot API limit for a single `sendMessage` text.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Clone)]
pub struct TelegramAdapter {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
}

impl TelegramAdapter {
    pub fn new(bot_token: &str) -> Result<Self> {
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("telegram bot token is required"));
        }
        // Must outlive the long-poll timeout.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            bot_token: bot_token.trim().to_string(),
            api_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/bot{}/{}",
            self.api_base, self.bot_token, method
        ))?)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let url = self.api_url(method)?;
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(anyhow::anyhow!(
                "telegram {method} failed: status={status} body={text}"
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn channel_id(&self) -> &str {
        TELEGRAM_CHANNEL_ID
    }

    async fn start(
        &self,
        tx: mpsc::Sender<InboundMessage>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let adapter = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = adapter.run_poll_loop(tx) => {
                    if let Err(e) = result {
                        tracing::error!(%e, "telegram poll loop exited");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("telegram poll loop stopped");
                }
            }
        });
        Ok(())
    }

    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()> {
        let mut reply_to = message.reply_to_message_id.clone();
        for chunk in split_message(&message.content, TELEGRAM_MAX_MESSAGE_CHARS) {
            let mut body = serde_json::json!({
                "chat_id": recipient_id,
                "text": chunk,
            });
            if message.format == MessageFormat::Markdown {
                body["parse_mode"] = serde_json::json!("Markdown");
            }
            // Only the first chunk is threaded as a reply.
            if let Some(id) = reply_to.take().and_then(|id| id.as_str().parse::<i64>().ok()) {
                body["reply_to_message_id"] = serde_json::json!(id);
            }
            self.call("sendMessage", body).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, recipient_id: &str) -> Result<()> {
        self.call(
            "sendChatAction",
            serde_json::json!({ "chat_id": recipient_id, "action": "typing" }),
        )
        .await
    }

    fn supports_typing_events(&self) -> bool {
        true
    }
}

impl TelegramAdapter {
    #[tracing::instrument(level = "info", skip_all)]
    async fn run_poll_loop(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        let mut offset: i64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            let url = self.api_url("getUpdates")?;
            let response = match self
                .http
                .get(url)
                .query(&[
                    ("timeout", TELEGRAM_LONG_POLL_TIMEOUT_SECS),
                    ("offset", &offset.to_string()),
                    ("allowed_updates", TELEGRAM_ALLOWED_UPDATES),
                ])
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(
                        %error,
                        attempt = consecutive_failures,
                        ?delay,
                        "telegram getUpdates request failed; polling again after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_else(|error| {
                    format!("<failed to read telegram error body: {error}>")
                });
                if is_transient_status(status) {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(
                        %status,
                        %body,
                        attempt = consecutive_failures,
                        ?delay,
                        "telegram getUpdates transient failure; polling again after backoff"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    consecutive_failures = 0;
                    tracing::error!(
                        %status,
                        %body,
                        ?TELEGRAM_NON_TRANSIENT_DELAY,
                        "telegram getUpdates non-transient failure; keeping poll loop alive"
                    );
                    tokio::time::sleep(TELEGRAM_NON_TRANSIENT_DELAY).await;
                }
                continue;
            }

            let parsed = match response.json::<TelegramGetUpdatesResponse>().await {
                Ok(parsed) => parsed,
                Err(error) => {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(
                        %error,
                        attempt = consecutive_failures,
                        ?delay,
                        "telegram getUpdates payload parse failed; polling again after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            consecutive_failures = 0;

            let mut updates = parsed.result;
            updates.sort_by_key(|update| update.update_id);
            for update in updates {
                // Advance offset before conversion to avoid poison-update replay loops.
                if update.update_id < offset {
                    continue;
                }
                offset = update.update_id.saturating_add(1);

                if let Some(inbound) = build_message_inbound(update.update_id, update.message.as_ref()) {
                    tx.send(inbound)
                        .await
                        .map_err(|e| anyhow::anyhow!("telegram inbound queue closed: {e}"))?;
                }
            }
        }
    }
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// line breaks as cut points.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > max_chars {
        let hard_cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let cut = match rest[..hard_cut].rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => hard_cut,
        };
        chunks.push(rest[..cut].trim_end_matches('\n').to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn transient_retry_delay(attempt: u32) -> Duration {
    let multiplier = 1_u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis((TELEGRAM_RETRY_BASE_MS * multiplier).min(TELEGRAM_RETRY_MAX_MS))
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn build_message_inbound(
    update_id: i64,
    message: Option<&TelegramMessage>,
) -> Option<InboundMessage> {
    let message = message?;
    let chat = message.chat.as_ref()?;
    // Non-text payloads (photos, stickers, ...) are not handled by the bot.
    let content = message.text.clone()?;
    let sender_id = message
        .from
        .as_ref()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| format!("chat:{}", chat.id));
    let sender_name = message
        .from
        .as_ref()
        .and_then(|user| user.first_name.clone())
        .filter(|name| !name.trim().is_empty());
    let message_id = message
        .message_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("update:{update_id}:message"));

    Some(InboundMessage {
        message_id: message_id.into(),
        channel_id: TELEGRAM_CHANNEL_ID.into(),
        sender_id: sender_id.into(),
        sender_name,
        chat_id: chat.id.to_string().into(),
        is_group: chat.r#type != "private",
        content,
        received_at: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct TelegramGetUpdatesResponse {
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    chat: Option<TelegramChat>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    #[serde(rename = "type")]
    r#type: String,
}
