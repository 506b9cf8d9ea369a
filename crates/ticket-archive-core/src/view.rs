//! Detail payload shared by the web layer and the PDF exporter.
//!
//! Everything here is presentation over already-cleaned data: no storage
//! rule is re-applied, so both consumers render the same conversation.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::Config;
use crate::models::{Message, Role, TicketDetail};
use crate::timestamps::{DISPLAY_FORMAT, format_display};

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"')]+"#).expect("url regex"));

static SIGN_OFF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:thanks|thank\s*you|many\s*thanks|regards|best|best\s*regards|kind\s*regards|warm\s*regards|cheers|sincerely)[,!.]?$",
    )
    .expect("sign-off regex")
});

const LINK_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// Color family for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusTone {
    Resolved,
    Open,
    Pending,
    Neutral,
}

impl StatusTone {
    /// Classify a free-form status by substring, first rule wins.
    #[must_use]
    pub fn classify(status: &str) -> Self {
        let lower = status.to_lowercase();
        if lower.contains("resolved") || lower.contains("closed") {
            Self::Resolved
        } else if lower.contains("open") || lower.contains("new") {
            Self::Open
        } else if lower.contains("pending") {
            Self::Pending
        } else {
            Self::Neutral
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    /// Names that may start a signature block, in addition to the author's.
    pub agent_names: Vec<String>,
    pub date_format: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            agent_names: Vec::new(),
            date_format: DISPLAY_FORMAT.to_string(),
        }
    }
}

impl ViewOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent_names: config.signature_agent_names.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketView {
    pub ticket_number: String,
    pub subject: String,
    pub status: String,
    pub status_tone: StatusTone,
    pub category: String,
    pub subcategory: String,
    pub assigned_to: String,
    pub opened_by: String,
    pub customers: String,
    pub source: String,
    pub created_display: String,
    pub updated_display: String,
    pub closed_display: String,
    pub message_count: i64,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub position: i64,
    pub author: String,
    /// Avatar letter, `?` for a blank author.
    pub initial: String,
    pub role: Role,
    pub action_type: String,
    pub created_display: String,
    /// Body without the signature block.
    pub body: String,
    pub signature: Option<String>,
    /// Escaped, linkified `body`.
    pub body_html: String,
    /// Escaped, linkified full text; only present when a signature was split off.
    pub full_html: Option<String>,
}

impl TicketView {
    #[must_use]
    pub fn build(detail: &TicketDetail, options: &ViewOptions) -> Self {
        let ticket = &detail.ticket;
        let fmt = options.date_format.as_str();
        Self {
            ticket_number: ticket.ticket_number.clone(),
            subject: ticket.subject.clone(),
            status: ticket.status.clone(),
            status_tone: StatusTone::classify(&ticket.status),
            category: ticket.category.clone(),
            subcategory: ticket.subcategory.clone(),
            assigned_to: ticket.assigned_to.clone(),
            opened_by: ticket.opened_by.clone(),
            customers: ticket.customers.clone(),
            source: ticket.source.clone(),
            created_display: format_display(ticket.created_ts, fmt),
            updated_display: format_display(ticket.updated_ts, fmt),
            closed_display: format_display(ticket.closed_ts, fmt),
            message_count: ticket.message_count,
            messages: detail
                .messages
                .iter()
                .map(|m| MessageView::build(m, options))
                .collect(),
        }
    }
}

impl MessageView {
    #[must_use]
    pub fn build(message: &Message, options: &ViewOptions) -> Self {
        let (main, signature) =
            split_signature(&message.body, &message.author, &options.agent_names);
        Self {
            position: message.position,
            author: message.author.clone(),
            initial: initial(&message.author),
            role: message.role,
            action_type: message.action_type.clone(),
            created_display: format_display(message.created_ts, &options.date_format),
            body: main.to_string(),
            signature: signature.map(str::to_string),
            body_html: linkify(main),
            full_html: signature.map(|_| linkify(&message.body)),
        }
    }
}

/// First letter of a name, uppercased.
#[must_use]
pub fn initial(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map_or_else(|| "?".to_string(), |c| c.to_uppercase().collect())
}

/// Split a trailing signature off a message body.
///
/// A signature starts at a sign-off line ("Thanks,", "Best regards", ...)
/// whose next non-blank line begins with one of `agent_names` or with the
/// author's full or first name. The earliest such sign-off wins. Nothing is
/// split when the remaining main text would be empty.
#[must_use]
pub fn split_signature<'a>(
    body: &'a str,
    author: &str,
    agent_names: &[String],
) -> (&'a str, Option<&'a str>) {
    let author = author.trim();
    let first_name = author.split_whitespace().next().unwrap_or("");
    let names: Vec<&str> = agent_names
        .iter()
        .map(|n| n.trim())
        .chain([author, first_name])
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return (body, None);
    }

    let mut lines = Vec::new();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        lines.push((offset, line.trim()));
        offset += line.len();
    }

    for (idx, &(start, line)) in lines.iter().enumerate() {
        if !SIGN_OFF.is_match(line) {
            continue;
        }
        let next_named = lines[idx + 1..]
            .iter()
            .map(|&(_, l)| l)
            .find(|l| !l.is_empty())
            .is_some_and(|l| names.iter().any(|n| starts_with_name(l, n)));
        if !next_named {
            continue;
        }
        let main = body[..start].trim();
        if !main.is_empty() {
            return (main, Some(body[start..].trim()));
        }
    }
    (body, None)
}

fn starts_with_name(line: &str, name: &str) -> bool {
    let line = line.to_lowercase();
    let name = name.to_lowercase();
    line.strip_prefix(&name)
        .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()))
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML-escape `text` and wrap plain `http(s)` URLs in anchors.
///
/// Trailing sentence punctuation is kept outside the link.
#[must_use]
pub fn linkify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in URL.find_iter(text) {
        let url = found.as_str().trim_end_matches(LINK_TRAILING_PUNCTUATION);
        if url.ends_with("://") {
            continue;
        }
        let url_end = found.start() + url.len();
        out.push_str(&escape_html(&text[last..found.start()]));
        let escaped = escape_html(url);
        out.push_str(&format!(
            "<a href=\"{escaped}\" target=\"_blank\" rel=\"noopener\">{escaped}</a>"
        ));
        last = url_end;
    }
    out.push_str(&escape_html(&text[last..]));
    out
}
