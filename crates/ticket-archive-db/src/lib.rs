//! Migration pipeline and read-only store for the ticket archive
//!
//! This crate provides:
//! - Record parsing of CSV exports (`reader`)
//! - Row normalization and ticket aggregation (`normalize`, `aggregate`)
//! - The `SQLite` loader with atomic store replacement (`loader`, `migrate`)
//! - The read-only query surface and post-migration verification
//!
//! # Timestamp Convention
//!
//! All timestamps are stored as `i64` (microseconds since Unix epoch).
//! `NULL` marks a value that was missing or unparsable in the export.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod loader;
pub mod migrate;
pub mod normalize;
pub mod queries;
pub mod reader;
pub mod schema;
pub mod verify;

pub use aggregate::{TicketKey, UNKNOWN_OPENER, aggregate};
pub use error::{DbError, DbResult};
pub use loader::{LoadOptions, LoadStats, load_store};
pub use migrate::{MigrateOptions, MigrationStats, migrate_archive};
pub use normalize::{NormalizeStats, NormalizedRow, is_visible, normalize_row};
pub use queries::{
    FacetCount, Facets, MonthFacet, TicketCounts, TicketFilter, TicketPage, TicketStore,
    TicketSummary, YearFacet,
};
pub use reader::{Column, RawRow, ReadStats, RowStream, resolve_inputs};
pub use schema::SCHEMA_VERSION;
pub use verify::{VerifyReport, verify_store};
