//! Record parser for "All Ticket Actions" CSV exports.
//!
//! Inputs are resolved into an ordered list of batches and read as one
//! lazy stream of [`RawRow`]s. Header names are matched loosely (case,
//! spacing and punctuation are ignored, a UTF-8 BOM is dropped), so both the
//! export's `Ticket Number` and a hand-made `ticket_number` map to the same
//! column.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, Reader, ReaderBuilder};

use crate::error::{DbError, DbResult};

/// Logical columns of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    TicketNumber,
    Subject,
    Status,
    Category,
    Subcategory,
    AssignedTo,
    Customers,
    Source,
    Creator,
    ActionType,
    Description,
    ActionCreated,
    TicketCreated,
    Closed,
    Visible,
}

impl Column {
    pub const ALL: [Self; 15] = [
        Self::TicketNumber,
        Self::Subject,
        Self::Status,
        Self::Category,
        Self::Subcategory,
        Self::AssignedTo,
        Self::Customers,
        Self::Source,
        Self::Creator,
        Self::ActionType,
        Self::Description,
        Self::ActionCreated,
        Self::TicketCreated,
        Self::Closed,
        Self::Visible,
    ];

    /// Header names in canonical form, see [`canonical_header`].
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::TicketNumber => &["ticketnumber", "ticketno", "ticketid", "ticket"],
            Self::Subject => &["ticketname", "subject", "title"],
            Self::Status => &["status", "ticketstatus"],
            Self::Category => &["tickettype", "category", "type"],
            Self::Subcategory => &["subcategory"],
            Self::AssignedTo => &["assignedto", "assignee", "owner"],
            Self::Customers => &["customers", "customer"],
            Self::Source => &["ticketsource", "source"],
            Self::Creator => &["actioncreatorname", "actioncreator", "creator", "author"],
            Self::ActionType => &["actiontype"],
            Self::Description => &["actiondescription", "description", "body"],
            Self::ActionCreated => &["dateactioncreated", "actioncreated", "actiondate"],
            Self::TicketCreated => &["dateticketcreated", "ticketcreated", "created"],
            Self::Closed => &["dateclosed", "closed", "closeddate"],
            Self::Visible => &["isvisibleonhub", "visibleonhub", "visible", "isvisible"],
        }
    }

    /// Columns a batch cannot be read without.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(
            self,
            Self::Subcategory | Self::Customers | Self::Source | Self::ActionType | Self::Closed
        )
    }

    /// Human-readable name used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TicketNumber => "ticket number",
            Self::Subject => "subject",
            Self::Status => "status",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::AssignedTo => "assigned to",
            Self::Customers => "customers",
            Self::Source => "source",
            Self::Creator => "action creator name",
            Self::ActionType => "action type",
            Self::Description => "action description",
            Self::ActionCreated => "date action created",
            Self::TicketCreated => "date ticket created",
            Self::Closed => "date closed",
            Self::Visible => "visibility flag",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Reduce a header cell to lowercase ASCII alphanumerics.
#[must_use]
pub fn canonical_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Positions of the logical columns within one batch's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    slots: [Option<usize>; Column::ALL.len()],
    width: usize,
}

impl ColumnMap {
    /// Map header cells onto columns; the first matching cell wins.
    pub fn from_headers<'a>(
        path: &Path,
        headers: impl IntoIterator<Item = &'a str>,
    ) -> DbResult<Self> {
        let mut slots = [None; Column::ALL.len()];
        let mut width = 0;
        for (idx, header) in headers.into_iter().enumerate() {
            width = idx + 1;
            let canonical = canonical_header(header);
            if let Some(column) = Column::ALL
                .iter()
                .find(|c| c.aliases().contains(&canonical.as_str()))
            {
                slots[column.slot()].get_or_insert(idx);
            }
        }

        let missing: Vec<String> = Column::ALL
            .iter()
            .filter(|c| c.is_required() && slots[c.slot()].is_none())
            .map(|c| c.label().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DbError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }
        Ok(Self { slots, width })
    }

    /// Number of cells in the header row.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn index(&self, column: Column) -> Option<usize> {
        self.slots[column.slot()]
    }
}

/// One data row with every field as (lossily decoded) text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Global input order across all batches.
    pub seq: u64,
    pub ticket_number: String,
    pub subject: String,
    pub status: String,
    pub category: String,
    pub subcategory: String,
    pub assigned_to: String,
    pub customers: String,
    pub source: String,
    pub creator: String,
    pub action_type: String,
    pub description: String,
    pub action_created: String,
    pub ticket_created: String,
    pub closed: String,
    pub visible: String,
}

/// Counters kept while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub batches: u64,
    /// Every data record encountered, malformed ones included.
    pub rows_read: u64,
    pub rows_malformed: u64,
    pub rows_reencoded: u64,
}

/// Expand input paths into an ordered batch list.
///
/// Files are kept in the order given; a directory contributes its `*.csv`
/// files sorted by name. Missing paths are logged and skipped.
pub fn resolve_inputs(inputs: &[PathBuf]) -> DbResult<Vec<PathBuf>> {
    let mut batches = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && is_csv(p))
                .collect();
            found.sort();
            if found.is_empty() {
                tracing::warn!(path = %input.display(), "input directory holds no CSV files");
            }
            batches.extend(found);
        } else if input.is_file() {
            batches.push(input.clone());
        } else {
            tracing::warn!(path = %input.display(), "input path does not exist, skipping");
        }
    }

    if batches.is_empty() {
        let listed: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
        return Err(DbError::NoInput(if listed.is_empty() {
            "no input paths given".to_string()
        } else {
            format!("no CSV batches found in {}", listed.join(", "))
        }));
    }
    Ok(batches)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

struct Batch {
    path: PathBuf,
    reader: Reader<File>,
    columns: ColumnMap,
    line: u64,
}

impl Batch {
    fn open(path: PathBuf) -> DbResult<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(&path)?;
        let headers = reader.byte_headers()?.clone();
        let decoded: Vec<String> = headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();
        let columns = ColumnMap::from_headers(&path, decoded.iter().map(String::as_str))?;
        tracing::debug!(path = %path.display(), width = columns.width(), "opened input batch");
        Ok(Self {
            path,
            reader,
            columns,
            line: 1,
        })
    }
}

/// Lazy row stream over all batches, in batch order.
pub struct RowStream {
    pending: VecDeque<PathBuf>,
    current: Option<Batch>,
    record: ByteRecord,
    next_seq: u64,
    stats: ReadStats,
}

impl RowStream {
    #[must_use]
    pub fn new(batches: Vec<PathBuf>) -> Self {
        Self {
            pending: batches.into(),
            current: None,
            record: ByteRecord::new(),
            next_seq: 0,
            stats: ReadStats::default(),
        }
    }

    /// Resolve `inputs` and stream their rows.
    pub fn open(inputs: &[PathBuf]) -> DbResult<Self> {
        Ok(Self::new(resolve_inputs(inputs)?))
    }

    #[must_use]
    pub const fn stats(&self) -> ReadStats {
        self.stats
    }

    fn next_row(&mut self) -> DbResult<Option<RawRow>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.pending.pop_front() else {
                    return Ok(None);
                };
                self.current = Some(Batch::open(path)?);
                self.stats.batches += 1;
            }
            let Some(batch) = self.current.as_mut() else {
                continue;
            };

            let has_record = match batch.reader.read_byte_record(&mut self.record) {
                Ok(has_record) => has_record,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    batch.line += 1;
                    self.stats.rows_read += 1;
                    self.stats.rows_malformed += 1;
                    tracing::debug!(path = %batch.path.display(), error = %e, "skipping unparsable row");
                    continue;
                }
            };
            if !has_record {
                tracing::debug!(path = %batch.path.display(), rows = batch.line - 1, "finished input batch");
                self.current = None;
                continue;
            }

            batch.line += 1;
            self.stats.rows_read += 1;
            let line = self
                .record
                .position()
                .map_or(batch.line, csv::Position::line);

            if self.record.len() != batch.columns.width() {
                self.stats.rows_malformed += 1;
                tracing::debug!(
                    path = %batch.path.display(),
                    line,
                    expected = batch.columns.width(),
                    found = self.record.len(),
                    "skipping row with wrong column count"
                );
                continue;
            }

            let mut reencoded = false;
            let mut cell = |column: Column| -> String {
                let Some(bytes) = batch.columns.index(column).and_then(|i| self.record.get(i))
                else {
                    return String::new();
                };
                match String::from_utf8_lossy(bytes) {
                    std::borrow::Cow::Borrowed(text) => text.to_string(),
                    std::borrow::Cow::Owned(text) => {
                        reencoded = true;
                        text
                    }
                }
            };

            let row = RawRow {
                seq: self.next_seq,
                ticket_number: cell(Column::TicketNumber),
                subject: cell(Column::Subject),
                status: cell(Column::Status),
                category: cell(Column::Category),
                subcategory: cell(Column::Subcategory),
                assigned_to: cell(Column::AssignedTo),
                customers: cell(Column::Customers),
                source: cell(Column::Source),
                creator: cell(Column::Creator),
                action_type: cell(Column::ActionType),
                description: cell(Column::Description),
                action_created: cell(Column::ActionCreated),
                ticket_created: cell(Column::TicketCreated),
                closed: cell(Column::Closed),
                visible: cell(Column::Visible),
            };

            if row.ticket_number.trim().is_empty() {
                self.stats.rows_malformed += 1;
                tracing::debug!(path = %batch.path.display(), line, "skipping row without ticket number");
                continue;
            }
            if reencoded {
                self.stats.rows_reencoded += 1;
                tracing::debug!(path = %batch.path.display(), line, "replaced invalid UTF-8 in row");
            }

            self.next_seq += 1;
            return Ok(Some(row));
        }
    }
}

impl Iterator for RowStream {
    type Item = DbResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => {
                self.pending.clear();
                self.current = None;
                Some(Err(e))
            }
        }
    }
}
