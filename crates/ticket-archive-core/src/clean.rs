//! Storage-time cleaning of action descriptions.
//!
//! [`clean_message_body`] is a pure function applied once during migration;
//! readers only ever see its output. Rules run in a fixed order:
//!
//! 1. line endings are unified to `\n`
//! 2. the BCC notice emitted by the ticketing system is removed
//! 3. a leading system header (`Action added via e-mail` /
//!    `Ticket created via e-mail`) is stripped, see [`HeaderShape`]
//! 4. mail-client noise lines are removed
//! 5. whitespace is normalized (see [`normalize_whitespace`])
//! 6. support-portal form submissions are rewritten to `Issue:`/`Location:`
//!
//! URLs are left as plain text.

use std::sync::LazyLock;

use regex::Regex;

static BCC_NOTICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Ticket created via e-mail \(BCC line\)\. Sender:.*?responding to requests\.\s*")
        .expect("bcc notice regex")
});

static SYSTEM_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\A\s*(?:Action added via e-mail|Ticket created via e-mail)(?P<tail>[^\n]*)(?:\n|\z)")
        .expect("system header regex")
});

static MAIL_HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[A-Za-z-]+:\s").expect("mail header line regex"));

static NOISE_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)These people were on the (?:To|CC) line of the email:[^\n]*\n?",
        r"(?i)You don(?:'|’)t often get email from[^\n]*\n?",
        r"(?i)Learn why this is important[^\S\n]*\n?",
        r"(?i)External Sender - Use caution opening files[^\n]*\n?",
        r"(?m)^Hello iLab Support,[^\n]*\n?",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("noise line regex"))
    .collect()
});

static PORTAL_SUBMISSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?isx)
        Please\s+explain\s+the\s+issue\s+you(?:'|’)re\s+experiencing\s*
        \(with\s+as\s+much\s+detail\s+as\s+possible\)\s*:\s*
        (?P<issue>.*?)
        Location\s+where\s+issue\s+occurred\s*\(e\.g\.?\s*link,\s*name\s+of\s+core,\s*etc\.?\)\s*:\s*
        (?P<location>.*?)
        (?:\*{2}Please\s+feel\s+free\s+to\s+record.*)?
        \z",
    )
    .expect("portal submission regex")
});

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space runs regex"));

/// How a body's leading system header was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderShape {
    /// The body does not start with a system header.
    Absent,
    /// The header is the whole body.
    Only,
    /// Header details share the marker's line; only that line is dropped.
    SingleLine,
    /// The marker stands alone and header details continue below it. The
    /// block spans the mail-header lines (`From: ...`) that follow it plus
    /// one blank separator; when none follow, a single continuation line is
    /// dropped.
    Block,
}

/// Clean a raw action description for storage.
#[must_use]
pub fn clean_message_body(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let without_bcc = BCC_NOTICE.replace_all(&unified, "");
    let (_, body) = strip_system_header(&without_bcc);

    let mut text = body.to_string();
    for pattern in NOISE_LINES.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    let normalized = normalize_whitespace(&text);
    parse_portal_submission(&normalized).unwrap_or(normalized)
}

/// Remove a leading system header and report which shape it had.
#[must_use]
pub fn strip_system_header(text: &str) -> (HeaderShape, &str) {
    let Some(caps) = SYSTEM_HEADER.captures(text) else {
        return (HeaderShape::Absent, text);
    };
    let Some(whole) = caps.get(0) else {
        return (HeaderShape::Absent, text);
    };
    let rest = &text[whole.end()..];
    if rest.trim().is_empty() {
        return (HeaderShape::Only, "");
    }

    let tail = caps.name("tail").map_or("", |m| m.as_str());
    let tail_has_details = !tail
        .trim_start_matches(|c: char| c == '.' || c == ':' || c.is_whitespace())
        .trim()
        .is_empty();
    if tail_has_details {
        return (HeaderShape::SingleLine, rest);
    }

    let mut offset = 0;
    let mut lines = rest.split_inclusive('\n').peekable();
    while let Some(line) = lines.next_if(|line| MAIL_HEADER_LINE.is_match(line)) {
        offset += line.len();
    }
    if offset == 0 {
        let after_first = rest.split_once('\n').map_or("", |(_, after)| after);
        return (HeaderShape::Block, after_first);
    }
    if let Some(blank) = lines.next_if(|line| line.trim().is_empty()) {
        offset += blank.len();
    }
    (HeaderShape::Block, &rest[offset..])
}

/// Normalize whitespace while keeping line structure.
///
/// Tabs, non-breaking spaces and the `¬†` mojibake become spaces, space runs
/// collapse, every line is trimmed, runs of blank lines collapse to one and
/// the result is trimmed.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let replaced = text
        .replace("\u{ac}\u{2020}", " ")
        .replace(['\t', '\u{a0}'], " ");
    let collapsed = SPACE_RUNS.replace_all(&replaced, " ");

    let mut out = String::with_capacity(collapsed.len());
    let mut pending_blank = false;
    for line in collapsed.lines().map(str::trim) {
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
    }
    out
}

/// Rewrite a support-portal form body into labelled sections.
///
/// Returns `None` when the text is not a portal submission or both sections
/// are empty.
#[must_use]
pub fn parse_portal_submission(text: &str) -> Option<String> {
    let caps = PORTAL_SUBMISSION.captures(text)?;
    let issue = caps.name("issue").map_or("", |m| m.as_str().trim());
    let location = caps.name("location").map_or("", |m| m.as_str().trim());

    let mut parts = Vec::with_capacity(2);
    if !issue.is_empty() {
        parts.push(format!("Issue:\n{issue}"));
    }
    if !location.is_empty() {
        parts.push(format!("Location:\n{location}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
