//! Loader: writes aggregated tickets into a fresh `SQLite` file and swaps it
//! into place.
//!
//! The store is built in a sibling temp file and renamed over the target
//! only after the transaction commits and the file is closed. On any error
//! the temp file is removed and an existing store is left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use rusqlite::{Connection, params};
use ticket_archive_core::timestamps::micros_to_naive;
use ticket_archive_core::{TicketDetail, ticket_number_value};

use crate::error::{DbError, DbResult};
use crate::schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Run `VACUUM` before the swap.
    pub vacuum: bool,
}

/// What ended up in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub tickets: u64,
    pub messages: u64,
    /// Size of the swapped-in file.
    pub db_bytes: u64,
}

/// Temp file used while building `dest`, in the same directory so the final
/// rename stays on one filesystem.
#[must_use]
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "tickets.db".to_string(), |n| n.to_string_lossy().into_owned());
    dest.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

/// Build a new store at `dest` from `tickets`, replacing any previous one.
pub fn load_store(
    dest: &Path,
    tickets: &[TicketDetail],
    options: LoadOptions,
) -> DbResult<LoadStats> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path_for(dest);
    remove_temp_files(&tmp);

    let built = build_store(&tmp, tickets, options).and_then(|stats| {
        fs::rename(&tmp, dest)?;
        Ok(stats)
    });
    let mut stats = match built {
        Ok(stats) => stats,
        Err(e) => {
            remove_temp_files(&tmp);
            tracing::error!(dest = %dest.display(), error = %e, "store build failed, previous store kept");
            return Err(e);
        }
    };

    stats.db_bytes = fs::metadata(dest)?.len();
    tracing::info!(
        dest = %dest.display(),
        tickets = stats.tickets,
        messages = stats.messages,
        db_bytes = stats.db_bytes,
        "store swapped into place"
    );
    Ok(stats)
}

fn remove_temp_files(tmp: &Path) {
    let journal = PathBuf::from(format!("{}-journal", tmp.display()));
    for path in [tmp, journal.as_path()] {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "could not remove temp file");
        }
    }
}

fn build_store(path: &Path, tickets: &[TicketDetail], options: LoadOptions) -> DbResult<LoadStats> {
    let mut conn = Connection::open(path)?;
    schema::create_tables(&conn)?;

    let mut stats = LoadStats::default();
    let tx = conn.transaction()?;
    {
        let mut insert_ticket = tx.prepare(
            "INSERT INTO tickets (
                ticket_number, ticket_seq, subject, subject_folded, status, category,
                subcategory, assigned_to, opened_by, customers, source,
                created_ts, updated_ts, updated_year, updated_month, closed_ts, message_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        let mut insert_message = tx.prepare(
            "INSERT INTO messages (
                ticket_number, position, author, role, action_type, created_ts, body, raw_body
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for detail in tickets {
            let t = &detail.ticket;
            let updated = t.updated_ts.map(micros_to_naive);
            insert_ticket.execute(params![
                t.ticket_number,
                ticket_number_value(&t.ticket_number),
                t.subject,
                t.subject.to_lowercase(),
                t.status,
                t.category,
                t.subcategory,
                t.assigned_to,
                t.opened_by,
                t.customers,
                t.source,
                t.created_ts,
                t.updated_ts,
                updated.map(|d| d.year()),
                updated.map(|d| d.month()),
                t.closed_ts,
                t.message_count,
            ])?;
            stats.tickets += 1;

            for m in &detail.messages {
                insert_message.execute(params![
                    m.ticket_number,
                    m.position,
                    m.author,
                    m.role.as_str(),
                    m.action_type,
                    m.created_ts,
                    m.body,
                    m.raw_body,
                ])?;
                stats.messages += 1;
            }
        }
    }
    tx.commit()?;
    tracing::debug!(tickets = stats.tickets, messages = stats.messages, "rows inserted");

    schema::create_indexes(&conn)?;
    conn.execute_batch("ANALYZE;")?;
    conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
    if options.vacuum {
        tracing::debug!("vacuuming store");
        conn.execute_batch("VACUUM;")?;
    }
    conn.close().map_err(|(_, e)| DbError::from(e))?;
    Ok(stats)
}
