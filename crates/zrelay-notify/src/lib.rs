//! Notification matching and delivery for relayed alerts.
//!
//! Groups are matched against alerts by the [`matcher`], rendered by
//! [`format`], and delivered by the [`dispatcher`] through a
//! [`Messenger`] capability (Telegram in production) with a three-tier
//! format-degradation ladder: rich markdown, then HTML, then plain text.

pub mod dispatcher;
pub mod error;
pub mod format;
pub mod matcher;
pub mod telegram;


use async_trait::async_trait;

use crate::error::NotifyError;

/// Formatting dialect for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    MarkdownV2,
    Html,
    Plain,
}

impl FormatMode {
    /// The `parse_mode` value understood by the Bot API; plain text
    /// sends without one.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            FormatMode::MarkdownV2 => Some("MarkdownV2"),
            FormatMode::Html => Some("HTML"),
            FormatMode::Plain => None,
        }
    }
}

impl std::fmt::Display for FormatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatMode::MarkdownV2 => write!(f, "markdown_v2"),
            FormatMode::Html => write!(f, "html"),
            FormatMode::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Capability to send text to a destination (shared group chat or an
/// individual subscriber), optionally with rich formatting.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Delivers `text` to `destination` using the given format mode.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::MarkupParse`] when the service rejected
    /// the markup specifically, so callers can degrade the format and
    /// retry.
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        mode: FormatMode,
    ) -> Result<SentMessage, NotifyError>;

    fn name(&self) -> &str;
}

/// Lookup from a group member id to a registered personal chat handle.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn chat_handle(&self, member_id: &str) -> anyhow::Result<Option<String>>;
}
