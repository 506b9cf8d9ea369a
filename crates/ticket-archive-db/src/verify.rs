//! Post-migration sanity report.

use std::path::Path;

use rusqlite::OptionalExtension;
use serde::Serialize;
use ticket_archive_core::timestamps::micros_to_iso;

use crate::error::DbResult;
use crate::queries::{TICKET_COLUMNS, TICKET_ORDER, TicketStore, TicketSummary, ticket_from_row};
use crate::schema;

/// Consistency checks over a finished store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub schema_version: i64,
    pub tickets: u64,
    pub messages: u64,
    /// Most recently updated ticket.
    pub latest: Option<TicketSummary>,
    /// Messages whose ticket does not exist.
    pub orphan_messages: u64,
    /// Adjacent message pairs that break chronological order.
    pub ordering_violations: u64,
    /// Tickets whose `message_count` disagrees with their messages.
    pub count_mismatches: u64,
}

impl VerifyReport {
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.orphan_messages == 0 && self.ordering_violations == 0 && self.count_mismatches == 0
    }
}

impl std::fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "schema version:      {}", self.schema_version)?;
        writeln!(f, "tickets:             {}", self.tickets)?;
        writeln!(f, "messages:            {}", self.messages)?;
        match &self.latest {
            Some(t) => writeln!(
                f,
                "latest ticket:       #{} {} ({})",
                t.ticket_number,
                t.subject,
                t.updated_ts.map_or_else(|| "no date".to_string(), micros_to_iso)
            )?,
            None => writeln!(f, "latest ticket:       none")?,
        }
        writeln!(f, "orphan messages:     {}", self.orphan_messages)?;
        writeln!(f, "ordering violations: {}", self.ordering_violations)?;
        write!(f, "count mismatches:    {}", self.count_mismatches)
    }
}

const ORPHAN_SQL: &str = "SELECT COUNT(*) FROM messages m \
     LEFT JOIN tickets t ON t.ticket_number = m.ticket_number \
     WHERE t.ticket_number IS NULL";

// A pair is out of order when a dated message follows an undated one or an
// earlier-dated one follows a later one.
const ORDERING_SQL: &str = "SELECT COUNT(*) FROM ( \
       SELECT created_ts, \
              LAG(created_ts) OVER (PARTITION BY ticket_number ORDER BY position) AS prev_ts, \
              ROW_NUMBER() OVER (PARTITION BY ticket_number ORDER BY position) AS rn \
       FROM messages \
     ) WHERE rn > 1 AND created_ts IS NOT NULL AND (prev_ts IS NULL OR created_ts < prev_ts)";

const COUNT_MISMATCH_SQL: &str = "SELECT COUNT(*) FROM tickets t \
     WHERE t.message_count != (SELECT COUNT(*) FROM messages m WHERE m.ticket_number = t.ticket_number)";

/// Open the store at `path` read-only and check it.
pub fn verify_store(path: &Path) -> DbResult<VerifyReport> {
    let store = TicketStore::open(path)?;
    let conn = store.connection();
    let count = |sql: &str| -> DbResult<u64> {
        let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    };

    let latest = conn
        .query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets ORDER BY {TICKET_ORDER} LIMIT 1"),
            [],
            ticket_from_row,
        )
        .optional()?;

    let report = VerifyReport {
        schema_version: schema::schema_version(conn)?,
        tickets: count("SELECT COUNT(*) FROM tickets")?,
        messages: count("SELECT COUNT(*) FROM messages")?,
        latest,
        orphan_messages: count(ORPHAN_SQL)?,
        ordering_violations: count(ORDERING_SQL)?,
        count_mismatches: count(COUNT_MISMATCH_SQL)?,
    };
    if report.is_healthy() {
        tracing::info!(tickets = report.tickets, messages = report.messages, "store verified");
    } else {
        tracing::warn!(
            orphan_messages = report.orphan_messages,
            ordering_violations = report.ordering_violations,
            count_mismatches = report.count_mismatches,
            "store failed verification"
        );
    }
    Ok(report)
}
