//! Database schema creation
//!
//! Tables are created on an empty file by the loader; indexes are added after
//! the bulk insert.

use rusqlite::Connection;

use crate::error::{DbError, DbResult};

/// Stamped into `PRAGMA user_version` after a successful load.
pub const SCHEMA_VERSION: i64 = 1;

/// PRAGMAs for the one-shot bulk load into a private temp file.
pub const PRAGMA_BULK_LOAD_SQL: &str = r"
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
";

/// SQL statements for creating the database schema
pub const CREATE_TABLES_SQL: &str = r"
-- Tickets table, one row per distinct ticket number
CREATE TABLE tickets (
    id INTEGER PRIMARY KEY,
    ticket_number TEXT NOT NULL UNIQUE,
    ticket_seq INTEGER,
    subject TEXT NOT NULL,
    subject_folded TEXT NOT NULL,
    status TEXT NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT NOT NULL,
    assigned_to TEXT NOT NULL,
    opened_by TEXT NOT NULL,
    customers TEXT NOT NULL,
    source TEXT NOT NULL,
    created_ts INTEGER,
    updated_ts INTEGER,
    updated_year INTEGER,
    updated_month INTEGER,
    closed_ts INTEGER,
    message_count INTEGER NOT NULL
);

-- Messages table, ordered by position within a ticket
CREATE TABLE messages (
    id INTEGER PRIMARY KEY,
    ticket_number TEXT NOT NULL REFERENCES tickets(ticket_number) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    author TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('Agent', 'Customer')),
    action_type TEXT NOT NULL,
    created_ts INTEGER,
    body TEXT NOT NULL,
    raw_body TEXT NOT NULL,
    UNIQUE(ticket_number, position)
);
";

/// Secondary indexes, built once the tables are populated.
pub const CREATE_INDEXES_SQL: &str = r"
CREATE INDEX idx_tickets_subject_folded ON tickets(subject_folded);
CREATE INDEX idx_tickets_updated ON tickets(updated_ts DESC, ticket_seq DESC);
CREATE INDEX idx_tickets_status ON tickets(status);
CREATE INDEX idx_tickets_assigned_to ON tickets(assigned_to);
CREATE INDEX idx_tickets_category ON tickets(category, subcategory);
CREATE INDEX idx_tickets_updated_year_month ON tickets(updated_year, updated_month);
";

/// Tables a finished store must contain.
pub const REQUIRED_TABLES: &[&str] = &["tickets", "messages"];

/// Create tables on a fresh connection.
pub fn create_tables(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(PRAGMA_BULK_LOAD_SQL)?;
    conn.execute_batch(CREATE_TABLES_SQL)?;
    Ok(())
}

/// Create secondary indexes.
pub fn create_indexes(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(CREATE_INDEXES_SQL)?;
    Ok(())
}

/// Read `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Fail unless the store has the expected tables and version.
pub fn check_schema(conn: &Connection) -> DbResult<()> {
    for table in REQUIRED_TABLES {
        let present: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )?;
        if !present {
            return Err(DbError::Schema(format!("missing table `{table}`")));
        }
    }
    let version = schema_version(conn)?;
    if version != SCHEMA_VERSION {
        return Err(DbError::Schema(format!(
            "unsupported schema version {version} (expected {SCHEMA_VERSION})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_and_checks() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_indexes(&conn).unwrap();
        assert!(matches!(check_schema(&conn), Err(DbError::Schema(_))));
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .unwrap();
        check_schema(&conn).unwrap();
    }

    #[test]
    fn message_requires_existing_ticket() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let err = conn.execute(
            "INSERT INTO messages (ticket_number, position, author, role, action_type, body, raw_body) \
             VALUES ('1', 0, 'a', 'Agent', '', '', '')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn empty_database_fails_check() {
        let conn = Connection::open_in_memory().unwrap();
        let err = check_schema(&conn).unwrap_err();
        assert_eq!(err.to_string(), "Schema error: missing table `tickets`");
    }
}
