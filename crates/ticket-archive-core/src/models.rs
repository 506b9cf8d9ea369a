//! Domain models shared by the migration pipeline and the query surface.
//!
//! All timestamps are `Option<i64>` microseconds since the Unix epoch; `None`
//! means the source value was missing or unparsable.

use serde::{Deserialize, Serialize};

use crate::timestamps::micros_to_naive;

/// Authorship classification of a message relative to the ticket assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Agent,
    Customer,
}

impl Role {
    /// Derive the role of a message author.
    ///
    /// `Agent` only when the author matches the row's assignee exactly
    /// (case-sensitive) and the assignee is non-empty.
    #[must_use]
    pub fn derive(author: &str, assigned_to: &str) -> Self {
        if !assigned_to.is_empty() && author == assigned_to {
            Self::Agent
        } else {
            Self::Customer
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Customer => "Customer",
        }
    }

    /// Parse the stored representation; unknown values read as `Customer`.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value == "Agent" {
            Self::Agent
        } else {
            Self::Customer
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw ticket number cell.
///
/// Trims whitespace and drops a spreadsheet-style `.0` suffix on integral
/// values (`"1042.0"` becomes `"1042"`). Returns `None` for blank cells.
#[must_use]
pub fn normalize_ticket_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some((int_part, frac)) = trimmed.split_once('.') {
        if !int_part.is_empty()
            && int_part.bytes().all(|b| b.is_ascii_digit())
            && !frac.is_empty()
            && frac.bytes().all(|b| b == b'0')
        {
            return Some(int_part.to_string());
        }
    }
    Some(trimmed.to_string())
}

/// Numeric value of a ticket number, used for ordering.
#[must_use]
pub fn ticket_number_value(ticket_number: &str) -> Option<i64> {
    ticket_number.parse().ok()
}

/// One support conversation, summarized from its visible actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_number: String,
    pub subject: String,
    pub status: String,
    /// The export's "Ticket Type" column.
    pub category: String,
    pub subcategory: String,
    pub assigned_to: String,
    /// Creator of the first `Description` action, `"Unknown"` when absent.
    pub opened_by: String,
    pub customers: String,
    pub source: String,
    pub created_ts: Option<i64>,
    /// Latest message timestamp.
    pub updated_ts: Option<i64>,
    pub closed_ts: Option<i64>,
    pub message_count: i64,
}

impl Ticket {
    /// Get `updated_ts` as `NaiveDateTime`
    #[must_use]
    pub fn updated_naive(&self) -> Option<chrono::NaiveDateTime> {
        self.updated_ts.map(micros_to_naive)
    }
}

/// One conversational turn within a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub ticket_number: String,
    /// Dense 0-based position in the conversation.
    pub position: i64,
    pub author: String,
    pub role: Role,
    pub action_type: String,
    pub created_ts: Option<i64>,
    /// Cleaned body text.
    pub body: String,
    /// Body as it appeared in the export.
    pub raw_body: String,
}

/// A ticket together with its ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_requires_exact_nonempty_match() {
        assert_eq!(Role::derive("Bob", "Bob"), Role::Agent);
        assert_eq!(Role::derive("bob", "Bob"), Role::Customer);
        assert_eq!(Role::derive("Alice", "Bob"), Role::Customer);
        assert_eq!(Role::derive("", ""), Role::Customer);
        assert_eq!(Role::derive("Alice", ""), Role::Customer);
    }

    #[test]
    fn role_stored_round_trip() {
        assert_eq!(Role::from_stored(Role::Agent.as_str()), Role::Agent);
        assert_eq!(Role::from_stored(Role::Customer.as_str()), Role::Customer);
        assert_eq!(Role::from_stored("bogus"), Role::Customer);
    }

    #[test]
    fn ticket_number_normalization() {
        assert_eq!(normalize_ticket_number(" 100 "), Some("100".to_string()));
        assert_eq!(normalize_ticket_number("1042.0"), Some("1042".to_string()));
        assert_eq!(normalize_ticket_number("1042.00"), Some("1042".to_string()));
        assert_eq!(normalize_ticket_number("1042.5"), Some("1042.5".to_string()));
        assert_eq!(normalize_ticket_number("TS-9"), Some("TS-9".to_string()));
        assert_eq!(normalize_ticket_number("  "), None);
    }

    #[test]
    fn ticket_number_value_is_numeric_only() {
        assert_eq!(ticket_number_value("200"), Some(200));
        assert_eq!(ticket_number_value("TS-9"), None);
    }
}
