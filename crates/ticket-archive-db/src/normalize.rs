//! Field normalizer: visibility gate, date parsing, body cleaning, role.

use ticket_archive_core::{Role, clean_message_body, normalize_ticket_number, parse_source_timestamp};

use crate::reader::RawRow;

/// A visible row with typed, cleaned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub seq: u64,
    pub ticket_number: String,
    pub subject: String,
    pub status: String,
    pub category: String,
    pub subcategory: String,
    pub assigned_to: String,
    pub customers: String,
    pub source: String,
    pub author: String,
    pub role: Role,
    pub action_type: String,
    pub action_ts: Option<i64>,
    pub ticket_created_ts: Option<i64>,
    pub closed_ts: Option<i64>,
    pub body: String,
    pub raw_body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub dropped_invisible: u64,
    /// Non-blank date cells no known format accepted.
    pub dates_unparsed: u64,
}

/// Whether a visibility cell means "shown": `true` in any case, or `1`.
/// Everything else, blank included, is hidden.
#[must_use]
pub fn is_visible(cell: &str) -> bool {
    let value = cell.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Normalize one raw row. Returns `None` for rows hidden from the hub; those
/// rows are dropped before any other field is looked at.
pub fn normalize_row(raw: RawRow, stats: &mut NormalizeStats) -> Option<NormalizedRow> {
    if !is_visible(&raw.visible) {
        stats.dropped_invisible += 1;
        return None;
    }
    let ticket_number = normalize_ticket_number(&raw.ticket_number)?;

    let mut date = |cell: &str| {
        let parsed = parse_source_timestamp(cell);
        if parsed.is_none() && !cell.trim().is_empty() {
            stats.dates_unparsed += 1;
            tracing::debug!(seq = raw.seq, value = cell, "unparsable date");
        }
        parsed
    };
    let action_ts = date(&raw.action_created);
    let ticket_created_ts = date(&raw.ticket_created);
    let closed_ts = date(&raw.closed);

    // Role compares the cells as exported; only the stored copies are trimmed.
    let role = Role::derive(&raw.creator, &raw.assigned_to);
    let author = raw.creator.trim().to_string();
    let assigned_to = raw.assigned_to.trim().to_string();

    Some(NormalizedRow {
        seq: raw.seq,
        ticket_number,
        subject: raw.subject.trim().to_string(),
        status: raw.status.trim().to_string(),
        category: raw.category.trim().to_string(),
        subcategory: raw.subcategory.trim().to_string(),
        assigned_to,
        customers: raw.customers.trim().to_string(),
        source: raw.source.trim().to_string(),
        author,
        role,
        action_type: raw.action_type.trim().to_string(),
        action_ts,
        ticket_created_ts,
        closed_ts,
        body: clean_message_body(&raw.description),
        raw_body: raw.description,
    })
}
