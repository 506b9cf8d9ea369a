//! End-to-end migration: CSV exports to a fresh ticket store.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::aggregate::aggregate;
use crate::error::DbResult;
use crate::loader::{LoadOptions, load_store};
use crate::normalize::{NormalizeStats, normalize_row};
use crate::reader::RowStream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    pub vacuum: bool,
}

/// Counts reported when a migration completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub batches: u64,
    pub rows_read: u64,
    pub rows_malformed: u64,
    pub rows_dropped_invisible: u64,
    pub rows_reencoded: u64,
    pub dates_unparsed: u64,
    pub tickets: u64,
    pub messages: u64,
    pub db_bytes: u64,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "migrated {} tickets, {} messages from {} rows in {} batches \
             ({} malformed, {} hidden, {} re-encoded, {} unparsable dates); \
             {} bytes written in {} ms",
            self.tickets,
            self.messages,
            self.rows_read,
            self.batches,
            self.rows_malformed,
            self.rows_dropped_invisible,
            self.rows_reencoded,
            self.dates_unparsed,
            self.db_bytes,
            self.elapsed_ms
        )
    }
}

/// Read every batch under `inputs`, normalize and group the rows, and
/// replace the store at `dest`.
///
/// # Errors
///
/// Fails with `NoInput` when nothing can be read, `MissingColumns` when a
/// batch header lacks a required column, and with I/O or `SQLite` errors
/// from the load. The store at `dest` is only replaced on success.
pub fn migrate_archive(
    inputs: &[PathBuf],
    dest: &Path,
    options: MigrateOptions,
) -> DbResult<MigrationStats> {
    let started = Instant::now();
    let mut stream = RowStream::open(inputs)?;
    let mut normalize_stats = NormalizeStats::default();

    let mut rows = Vec::new();
    for raw in stream.by_ref() {
        if let Some(row) = normalize_row(raw?, &mut normalize_stats) {
            rows.push(row);
        }
    }
    let read_stats = stream.stats();
    tracing::info!(
        batches = read_stats.batches,
        rows_read = read_stats.rows_read,
        rows_malformed = read_stats.rows_malformed,
        rows_dropped_invisible = normalize_stats.dropped_invisible,
        visible_rows = rows.len(),
        "input read"
    );

    let tickets = aggregate(rows);
    let load_stats = load_store(dest, &tickets, LoadOptions { vacuum: options.vacuum })?;

    let stats = MigrationStats {
        batches: read_stats.batches,
        rows_read: read_stats.rows_read,
        rows_malformed: read_stats.rows_malformed,
        rows_dropped_invisible: normalize_stats.dropped_invisible,
        rows_reencoded: read_stats.rows_reencoded,
        dates_unparsed: normalize_stats.dates_unparsed,
        tickets: load_stats.tickets,
        messages: load_stats.messages,
        db_bytes: load_stats.db_bytes,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    tracing::info!(%stats, "migration complete");
    Ok(stats)
}
