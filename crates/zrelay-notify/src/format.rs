use chrono::FixedOffset;
use zrelay_common::types::{Alert, AlertStatus, Severity};

use crate::FormatMode;

/// Human label for a severity level.
pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::NotClassified => "Not classified",
        Severity::Info => "Information",
        Severity::Warning => "Warning",
        Severity::High => "High",
        Severity::Disaster => "Disaster",
    }
}

/// Marker shown ahead of the severity label.
pub fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::NotClassified => "⚪",
        Severity::Info => "ℹ️",
        Severity::Warning => "⚠️",
        Severity::High => "🚨",
        Severity::Disaster => "🔥",
    }
}

/// Escapes the characters MarkdownV2 reserves.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                | '|' | '{' | '}' | '.' | '!'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Strips markup control characters for the plain-text tier.
pub fn strip_markup(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '~' | '[' | ']' | '<' | '>'))
        .collect()
}

/// The same alert rendered once per formatting tier.
#[derive(Debug, Clone)]
pub struct MessageVariants {
    pub markdown: String,
    pub html: String,
    pub plain: String,
}

impl MessageVariants {
    pub fn for_mode(&self, mode: FormatMode) -> &str {
        match mode {
            FormatMode::MarkdownV2 => &self.markdown,
            FormatMode::Html => &self.html,
            FormatMode::Plain => &self.plain,
        }
    }
}

/// Renders an alert for every tier of the fallback ladder. Event time
/// is localized to the configured fixed display offset.
pub fn render(alert: &Alert, tz: FixedOffset) -> MessageVariants {
    let label = severity_label(alert.severity);
    let marker = severity_marker(alert.severity);
    let status_tag = if alert.resolved { "[RESOLVED] " } else { "" };
    let time = alert
        .event_time
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string();
    let status = match alert.status {
        AlertStatus::Ok => "OK",
        AlertStatus::Problem => "PROBLEM",
    };
    // The free-text message only gets its own section when it adds
    // something beyond the trigger name.
    let extra_message = (!alert.message.is_empty() && alert.message != alert.trigger_name)
        .then_some(alert.message.as_str());
    let description = alert.trigger_description.as_deref().filter(|d| !d.is_empty());

    let markdown = {
        let mut s = format!(
            "{marker} *{status_tag}{label}*: {trigger}\n*Host*: {host}\n*Status*: {status}\n*Time*: {time}",
            status_tag = escape_markdown_v2(status_tag),
            label = escape_markdown_v2(label),
            trigger = escape_markdown_v2(&alert.trigger_name),
            host = escape_markdown_v2(&alert.host),
            status = escape_markdown_v2(status),
            time = escape_markdown_v2(&time),
        );
        if let Some(message) = extra_message {
            s.push_str(&format!("\n*Message*: {}", escape_markdown_v2(message)));
        }
        if let Some(desc) = description {
            s.push_str(&format!("\n_{}_", escape_markdown_v2(desc)));
        }
        s
    };

    let html = {
        let mut s = format!(
            "{marker} <b>{status_tag}{label}</b>: {trigger}\n<b>Host</b>: {host}\n<b>Status</b>: {status}\n<b>Time</b>: {time}",
            status_tag = escape_html(status_tag),
            label = escape_html(label),
            trigger = escape_html(&alert.trigger_name),
            host = escape_html(&alert.host),
            status = escape_html(status),
            time = escape_html(&time),
        );
        if let Some(message) = extra_message {
            s.push_str(&format!("\n<b>Message</b>: {}", escape_html(message)));
        }
        if let Some(desc) = description {
            s.push_str(&format!("\n<i>{}</i>", escape_html(desc)));
        }
        s
    };

    let plain = {
        let mut s = format!(
            "{marker} {status_tag}{label}: {trigger}\nHost: {host}\nStatus: {status}\nTime: {time}",
            trigger = strip_markup(&alert.trigger_name),
            host = strip_markup(&alert.host),
        );
        if let Some(message) = extra_message {
            s.push_str(&format!("\nMessage: {}", strip_markup(message)));
        }
        if let Some(desc) = description {
            s.push_str(&format!("\n{}", strip_markup(desc)));
        }
        s
    };

    MessageVariants {
        markdown,
        html,
        plain,
    }
}
