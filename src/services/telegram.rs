use crate::constants::network;
use crate::errors::BotError;
use crate::services::commands::CommandInfo;
use crate::services::config::TelegramSettings;
use crate::services::dispatcher::{ChatTransport, InboundMessage};
use crate::services::logger::Logger;
use crate::utils::temp_artifact::TempArtifact;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramUser {
    pub fn display_name(&self) -> Option<String> {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return Some(full);
        }
        self.username.clone().filter(|name| !name.trim().is_empty())
    }
}

pub struct TelegramTransport {
    logger: Logger,
    client: Client,
    bot_url: String,
    // Next update id to request; zero until the first batch arrives.
    offset: AtomicI64,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    pub fn new(logger: Logger, settings: &TelegramSettings) -> Result<Self, BotError> {
        let client = Client::builder()
            .user_agent(concat!("opsbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| BotError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            logger: logger.child("telegram"),
            client,
            bot_url: settings.bot_url(),
            offset: AtomicI64::new(0),
            poll_timeout_secs: network::TELEGRAM_POLL_TIMEOUT_SECS,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.bot_url, method)
    }

    pub async fn get_me(&self) -> Result<TelegramUser, BotError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .timeout(Duration::from_secs(self.poll_timeout_secs))
            .send()
            .await
            .map_err(map_http_error)?;
        decode(response, "getMe").await
    }

    pub async fn set_my_commands(&self, commands: &[CommandInfo]) -> Result<(), BotError> {
        let payload = serde_json::json!({
            "commands": commands
                .iter()
                .map(|c| serde_json::json!({ "command": c.name, "description": c.description }))
                .collect::<Vec<_>>(),
        });
        let response = self
            .client
            .post(self.method_url("setMyCommands"))
            .json(&payload)
            .send()
            .await
            .map_err(map_http_error)?;
        decode::<bool>(response, "setMyCommands").await.map(|_| ())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn receive(&self) -> Result<Vec<InboundMessage>, BotError> {
        let mut query = vec![("timeout", self.poll_timeout_secs.to_string())];
        let offset = self.offset.load(Ordering::SeqCst);
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(Duration::from_secs(self.poll_timeout_secs + 10))
            .send()
            .await
            .map_err(map_http_error)?;
        let updates: Vec<TelegramUpdate> = decode(response, "getUpdates").await?;
        let (messages, next_offset) = inbound_from_updates(updates);
        if let Some(next) = next_offset {
            self.offset.fetch_max(next, Ordering::SeqCst);
        }
        if !messages.is_empty() {
            self.logger.debug(
                "updates received",
                Some(&serde_json::json!({ "count": messages.len() })),
            );
        }
        Ok(messages)
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(map_http_error)?;
        decode::<serde_json::Value>(response, "sendMessage")
            .await
            .map(|_| ())
    }

    async fn send_document(&self, chat_id: i64, document: &TempArtifact) -> Result<(), BotError> {
        let bytes = tokio::fs::read(document.path()).await?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "document",
                multipart::Part::bytes(bytes).file_name(document.file_name().to_string()),
            );
        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(map_http_error)?;
        decode::<serde_json::Value>(response, "sendDocument")
            .await
            .map(|_| ())
    }
}

/// Text messages of a batch plus the offset that acknowledges all of it.
pub fn inbound_from_updates(updates: Vec<TelegramUpdate>) -> (Vec<InboundMessage>, Option<i64>) {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| update.message)
        .filter_map(|message| {
            let text = message.text?;
            Some(InboundMessage {
                chat_id: message.chat.id,
                user_name: message.from.as_ref().and_then(TelegramUser::display_name),
                text,
            })
        })
        .collect();
    (messages, next_offset)
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    method: &str,
) -> Result<T, BotError> {
    let status = response.status();
    let envelope: TelegramResponse<T> = response.json().await.map_err(|err| {
        BotError::transport(format!("Telegram {} returned invalid JSON ({}): {}", method, status, err))
    })?;
    if !envelope.ok {
        let description = envelope
            .description
            .unwrap_or_else(|| format!("HTTP {}", status));
        let message = format!("Telegram {} failed: {}", method, description);
        return Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => {
                BotError::transport(message).with_hint("Check the TOKEN value.")
            }
            reqwest::StatusCode::BAD_REQUEST => BotError::invalid_input(message),
            _ => BotError::transport(message),
        });
    }
    envelope
        .result
        .ok_or_else(|| BotError::transport(format!("Telegram {} returned no result", method)))
}

fn map_http_error(err: reqwest::Error) -> BotError {
    if err.is_timeout() {
        BotError::timeout(format!("Telegram request timed out: {}", err.without_url()))
    } else {
        BotError::transport(format!("Telegram request failed: {}", err.without_url()))
    }
}
