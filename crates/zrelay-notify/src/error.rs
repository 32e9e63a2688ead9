/// Errors that can occur within the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// No default messenger is configured and the group carries no
    /// credential of its own.
    #[error("Notify: messenger not configured")]
    MessengerUnavailable,

    /// An HTTP request to the messaging endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the message markup specifically; the send
    /// can be retried with a degraded format.
    #[error("Notify: markup rejected by {service}: {description}")]
    MarkupParse { service: String, description: String },

    /// The messaging API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    Api {
        service: String,
        status: u16,
        body: String,
    },

    /// The group resolved to zero reachable recipients.
    #[error("Notify: no reachable recipients")]
    NoRecipients,

    /// Every tier of the formatting ladder failed.
    #[error("Notify: all formatting tiers failed: {0}")]
    FormattingExhausted(String),

    #[error("Notify: {0}")]
    Other(String),
}

impl NotifyError {
    pub fn is_markup_parse(&self) -> bool {
        matches!(self, NotifyError::MarkupParse { .. })
    }
}
