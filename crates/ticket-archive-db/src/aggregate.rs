//! Groups normalized rows into tickets with ordered conversations.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ticket_archive_core::{Message, Ticket, TicketDetail, ticket_number_value};

use crate::normalize::NormalizedRow;

/// Placeholder `opened_by` when no `Description` action exists.
pub const UNKNOWN_OPENER: &str = "Unknown";

/// Ordering key for tickets: numeric ticket numbers first, ascending by
/// value, then the rest by text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketKey {
    numeric: Option<i64>,
    text: String,
}

impl TicketKey {
    #[must_use]
    pub fn new(ticket_number: &str) -> Self {
        Self {
            numeric: ticket_number_value(ticket_number),
            text: ticket_number.to_string(),
        }
    }
}

impl Ord for TicketKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric, other.numeric) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.text.cmp(&other.text)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.text.cmp(&other.text),
        }
    }
}

impl PartialOrd for TicketKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Group rows by ticket number.
///
/// Output is ordered by [`TicketKey`] and fully determined by the rows'
/// content and sequence numbers, so identical input gives identical output.
#[must_use]
pub fn aggregate(rows: impl IntoIterator<Item = NormalizedRow>) -> Vec<TicketDetail> {
    let mut groups: BTreeMap<TicketKey, Vec<NormalizedRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(TicketKey::new(&row.ticket_number))
            .or_default()
            .push(row);
    }
    groups.into_values().filter_map(build_ticket).collect()
}

/// Chronological message order: timestamp ascending, missing timestamps last,
/// input order among equals.
fn message_order(a: &NormalizedRow, b: &NormalizedRow) -> Ordering {
    match (a.action_ts, b.action_ts) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.seq.cmp(&b.seq))
}

fn build_ticket(mut rows: Vec<NormalizedRow>) -> Option<TicketDetail> {
    // `None < Some(_)`, so rows without a timestamp never win while any row has one.
    let latest = rows.iter().max_by_key(|r| (r.action_ts, r.seq))?;

    let created_ts = rows
        .iter()
        .flat_map(|r| [r.action_ts, r.ticket_created_ts])
        .flatten()
        .min();
    let updated_ts = rows.iter().filter_map(|r| r.action_ts).max();

    let mut ticket = Ticket {
        ticket_number: latest.ticket_number.clone(),
        subject: latest.subject.clone(),
        status: latest.status.clone(),
        category: latest.category.clone(),
        subcategory: latest.subcategory.clone(),
        assigned_to: latest.assigned_to.clone(),
        opened_by: UNKNOWN_OPENER.to_string(),
        customers: latest.customers.clone(),
        source: latest.source.clone(),
        created_ts,
        updated_ts,
        closed_ts: latest.closed_ts,
        message_count: 0,
    };

    rows.sort_by(message_order);
    if let Some(opener) = rows
        .iter()
        .find(|r| r.action_type.eq_ignore_ascii_case("Description") && !r.author.is_empty())
    {
        ticket.opened_by.clone_from(&opener.author);
    }

    let messages: Vec<Message> = rows
        .into_iter()
        .enumerate()
        .map(|(position, row)| Message {
            ticket_number: row.ticket_number,
            position: i64::try_from(position).unwrap_or(i64::MAX),
            author: row.author,
            role: row.role,
            action_type: row.action_type,
            created_ts: row.action_ts,
            body: row.body,
            raw_body: row.raw_body,
        })
        .collect();
    ticket.message_count = i64::try_from(messages.len()).unwrap_or(i64::MAX);

    Some(TicketDetail { ticket, messages })
}
