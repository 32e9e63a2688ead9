use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::NotifyError;
use crate::{FormatMode, Messenger, SentMessage};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bot API descriptions that mean "your markup is broken", as opposed
/// to a bad chat id or rate limiting.
fn is_markup_error(description: &str) -> bool {
    let d = description.to_lowercase();
    d.contains("can't parse entities")
        || d.contains("can't find end of the entity")
        || d.contains("unsupported start tag")
        || d.contains("parse_mode")
}

/// Telegram Bot API messenger.
pub struct TelegramMessenger {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramMessenger {
    pub fn new(bot_token: &str) -> Self {
        Self::with_api_base(bot_token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(bot_token: &str, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        mode: FormatMode,
    ) -> Result<SentMessage, NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let mut payload = json!({
            "chat_id": destination,
            "text": text,
        });
        if let Some(parse_mode) = mode.parse_mode() {
            payload["parse_mode"] = json!(parse_mode);
        }

        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Err(NotifyError::Api {
                    service: "telegram".to_string(),
                    status: status.as_u16(),
                    body: format!("[failed to read response body: {e}]"),
                })
            }
        };

        if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let message_id = body
                .pointer("/result/message_id")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            tracing::debug!(destination, mode = %mode, message_id, "Telegram message sent");
            return Ok(SentMessage { message_id });
        }

        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if is_markup_error(&description) {
            Err(NotifyError::MarkupParse {
                service: "telegram".to_string(),
                description,
            })
        } else {
            Err(NotifyError::Api {
                service: "telegram".to_string(),
                status: status.as_u16(),
                body: description,
            })
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_errors_are_classified() {
        assert!(is_markup_error(
            "Bad Request: can't parse entities: Character '-' is reserved"
        ));
        assert!(is_markup_error("Bad Request: unsupported start tag \"xb\""));
        assert!(!is_markup_error("Bad Request: chat not found"));
        assert!(!is_markup_error("Too Many Requests: retry after 30"));
    }
}
