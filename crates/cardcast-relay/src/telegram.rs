//! Bot API client for sending, editing and answering callbacks.

use std::time::Duration;

use async_trait::async_trait;
use cardcast_core::MessageHandle;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::RelayError;
use crate::delivery::{Delivery, InlineKeyboard};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Deserialize)]
struct BotUser {
    id: i64,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, RelayError> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Point the client at another Bot API server, such as a local one.
    pub fn with_api_url(api_url: &str, token: &str) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, RelayError> {
        let url = format!("{}/{method}", self.base_url);
        debug!(method, "calling bot api");
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ApiResponse<T> = resp.json().await?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(RelayError::Delivery(
                parsed
                    .description
                    .unwrap_or_else(|| format!("{method} returned no result")),
            )),
        }
    }

    /// The bot's own user id.
    pub async fn get_me(&self) -> Result<i64, RelayError> {
        let me: BotUser = self.call("getMe", json!({})).await?;
        info!(bot_id = me.id, "bot identity resolved");
        Ok(me.id)
    }
}

#[async_trait]
impl Delivery for TelegramClient {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageHandle, RelayError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(MessageHandle(sent.message_id))
    }

    async fn edit(
        &self,
        chat_id: i64,
        handle: MessageHandle,
        text: &str,
    ) -> Result<(), RelayError> {
        let body = json!({ "chat_id": chat_id, "message_id": handle.0, "text": text });
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: &str) -> Result<(), RelayError> {
        let body = json!({ "callback_query_id": query_id, "text": text });
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}
