//! Read-only query surface over a finished store.
//!
//! Each [`TicketStore`] owns one read-only connection; open one per reader.
//! The store is never written after a migration, so readers need no locking.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row, params_from_iter};
use serde::Serialize;
use ticket_archive_core::{
    ALLOWED_PAGE_SIZES, Config, Message, Role, Ticket, TicketDetail, normalize_ticket_number,
};

use crate::error::{DbError, DbResult};
use crate::schema;

/// Row shape returned by the listing operations.
pub type TicketSummary = Ticket;

pub(crate) const TICKET_COLUMNS: &str = "ticket_number, subject, status, category, subcategory, assigned_to, \
     opened_by, customers, source, created_ts, updated_ts, closed_ts, message_count";

pub(crate) const TICKET_ORDER: &str = "updated_ts DESC NULLS LAST, ticket_seq DESC NULLS LAST, ticket_number DESC";

const FACET_LIMIT: usize = 50;
const CUSTOMER_FACET_LIMIT: usize = 20;

/// Listing filters; `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketFilter {
    /// Case-insensitive substring of the ticket number or subject.
    pub search: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub customer: Option<String>,
    /// Year of the last update.
    pub year: Option<i32>,
    /// Month (1-12) of the last update.
    pub month: Option<u32>,
}

impl TicketFilter {
    /// Filter with only a search term.
    #[must_use]
    pub fn search(term: &str) -> Self {
        Self {
            search: Some(term.to_string()),
            ..Self::default()
        }
    }

    fn where_clause(&self) -> DbResult<(String, Vec<Value>)> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        // The term is matched as typed; only an empty term means no filter.
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let folded = term.to_lowercase();
            conditions.push(
                "(instr(lower(ticket_number), ?) > 0 OR instr(subject_folded, ?) > 0)",
            );
            values.push(Value::Text(folded.clone()));
            values.push(Value::Text(folded));
        }

        let exact = [
            ("assigned_to = ?", &self.assigned_to),
            ("status = ?", &self.status),
            ("category = ?", &self.category),
            ("subcategory = ?", &self.subcategory),
            ("customers = ?", &self.customer),
        ];
        for (condition, value) in exact {
            if let Some(v) = non_blank(value.as_deref()) {
                conditions.push(condition);
                values.push(Value::Text(v.to_string()));
            }
        }

        if let Some(year) = self.year {
            conditions.push("updated_year = ?");
            values.push(Value::Integer(i64::from(year)));
        }
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(DbError::invalid("month", format!("{month} is not in 1..=12")));
            }
            conditions.push("updated_month = ?");
            values.push(Value::Integer(i64::from(month)));
        }

        let clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        Ok((clause, values))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketPage {
    pub tickets: Vec<TicketSummary>,
    /// 1-based page actually returned, after clamping.
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total: u64,
    pub filtered: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TicketCounts {
    /// Tickets in the store.
    pub total: u64,
    /// Tickets matching the filter.
    pub filtered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearFacet {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthFacet {
    pub month: u32,
    pub name: String,
    pub count: u64,
}

/// Value counts of the filtered listing, per facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub assigned_to: Vec<FacetCount>,
    pub status: Vec<FacetCount>,
    pub category: Vec<FacetCount>,
    pub subcategory: Vec<FacetCount>,
    pub customer: Vec<FacetCount>,
    /// Most recent first.
    pub year: Vec<YearFacet>,
    /// Calendar order.
    pub month: Vec<MonthFacet>,
}

/// Read-only handle on a ticket store.
pub struct TicketStore {
    conn: Connection,
    path: PathBuf,
    default_per_page: usize,
}

impl TicketStore {
    /// Open the store at `path` read-only and check its schema.
    pub fn open(path: &Path) -> DbResult<Self> {
        if !path.is_file() {
            return Err(DbError::not_found("Store", path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        schema::check_schema(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            default_per_page: Config::default().default_per_page,
        })
    }

    /// Open the configured store, using its default page size.
    pub fn open_with_config(config: &Config) -> DbResult<Self> {
        let mut store = Self::open(&config.database_path)?;
        store.default_per_page = config.default_per_page;
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// All tickets matching `search`, most recently updated first.
    ///
    /// A blank or absent term lists every ticket.
    pub fn list_tickets(&self, search: Option<&str>) -> DbResult<Vec<TicketSummary>> {
        let filter = TicketFilter {
            search: search.map(str::to_string),
            ..TicketFilter::default()
        };
        let (clause, values) = filter.where_clause()?;
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE {clause} ORDER BY {TICKET_ORDER}");
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(params_from_iter(values), ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    /// One ticket with its conversation in stored order.
    ///
    /// # Errors
    ///
    /// `NotFound` when no ticket has this number.
    pub fn get_ticket(&self, ticket_number: &str) -> DbResult<TicketDetail> {
        let Some(number) = normalize_ticket_number(ticket_number) else {
            return Err(DbError::not_found("Ticket", ticket_number));
        };
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_number = ?1");
        let ticket = match self.conn.query_row(&sql, [&number], ticket_from_row) {
            Ok(ticket) => ticket,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(DbError::not_found("Ticket", number));
            }
            Err(e) => return Err(e.into()),
        };

        let mut stmt = self.conn.prepare(
            "SELECT ticket_number, position, author, role, action_type, created_ts, body, raw_body \
             FROM messages WHERE ticket_number = ?1 ORDER BY position",
        )?;
        let messages = stmt
            .query_map([&number], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TicketDetail { ticket, messages })
    }

    /// Total and filtered ticket counts.
    pub fn ticket_counts(&self, filter: &TicketFilter) -> DbResult<TicketCounts> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |r| r.get(0))?;
        let (clause, values) = filter.where_clause()?;
        let filtered: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM tickets WHERE {clause}"),
            params_from_iter(values),
            |r| r.get(0),
        )?;
        Ok(TicketCounts {
            total: u64::try_from(total).unwrap_or(0),
            filtered: u64::try_from(filtered).unwrap_or(0),
        })
    }

    /// One page of the filtered listing.
    ///
    /// `per_page` outside the allowed sizes falls back to the default; `page`
    /// is 1-based and clamped into `1..=total_pages`.
    pub fn list_tickets_page(
        &self,
        filter: &TicketFilter,
        page: usize,
        per_page: usize,
    ) -> DbResult<TicketPage> {
        let per_page = if ALLOWED_PAGE_SIZES.contains(&per_page) {
            per_page
        } else {
            self.default_per_page
        };
        let counts = self.ticket_counts(filter)?;
        let filtered = usize::try_from(counts.filtered).unwrap_or(usize::MAX);
        let total_pages = filtered.div_ceil(per_page).max(1);
        let page = page.clamp(1, total_pages);

        let (clause, mut values) = filter.where_clause()?;
        values.push(Value::Integer(i64::try_from(per_page).unwrap_or(i64::MAX)));
        values.push(Value::Integer(
            i64::try_from((page - 1) * per_page).unwrap_or(i64::MAX),
        ));
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE {clause} ORDER BY {TICKET_ORDER} LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(params_from_iter(values), ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TicketPage {
            tickets,
            page,
            per_page,
            total_pages,
            total: counts.total,
            filtered: counts.filtered,
        })
    }

    /// Facet value counts over the tickets matching `filter`.
    pub fn facets(&self, filter: &TicketFilter) -> DbResult<Facets> {
        let (clause, values) = filter.where_clause()?;

        let value_counts = |column: &str, limit: usize| -> DbResult<Vec<FacetCount>> {
            let sql = format!(
                "SELECT {column}, COUNT(*) AS c FROM tickets WHERE ({clause}) AND {column} != '' \
                 GROUP BY {column} ORDER BY c DESC, {column} ASC LIMIT {limit}"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |r| {
                    Ok(FacetCount {
                        value: r.get(0)?,
                        count: count_from(r.get(1)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        };

        let assigned_to = value_counts("assigned_to", FACET_LIMIT)?;
        let status = value_counts("status", FACET_LIMIT)?;
        let category = value_counts("category", FACET_LIMIT)?;
        let subcategory = value_counts("subcategory", FACET_LIMIT)?;
        let customer = value_counts("customers", CUSTOMER_FACET_LIMIT)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT updated_year, COUNT(*) FROM tickets WHERE ({clause}) AND updated_year IS NOT NULL \
             GROUP BY updated_year ORDER BY updated_year DESC"
        ))?;
        let year = stmt
            .query_map(params_from_iter(values.iter()), |r| {
                Ok(YearFacet {
                    year: r.get(0)?,
                    count: count_from(r.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT updated_month, COUNT(*) FROM tickets WHERE ({clause}) AND updated_month IS NOT NULL \
             GROUP BY updated_month ORDER BY updated_month ASC"
        ))?;
        let month = stmt
            .query_map(params_from_iter(values.iter()), |r| {
                let month: u32 = r.get(0)?;
                Ok(MonthFacet {
                    month,
                    name: month_name(month),
                    count: count_from(r.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Facets {
            assigned_to,
            status,
            category,
            subcategory,
            customer,
            year,
            month,
        })
    }
}

fn count_from(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map_or_else(|| month.to_string(), |m| m.name().to_string())
}

pub(crate) fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        ticket_number: row.get(0)?,
        subject: row.get(1)?,
        status: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get(4)?,
        assigned_to: row.get(5)?,
        opened_by: row.get(6)?,
        customers: row.get(7)?,
        source: row.get(8)?,
        created_ts: row.get(9)?,
        updated_ts: row.get(10)?,
        closed_ts: row.get(11)?,
        message_count: row.get(12)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    Ok(Message {
        ticket_number: row.get(0)?,
        position: row.get(1)?,
        author: row.get(2)?,
        role: Role::from_stored(&role),
        action_type: row.get(4)?,
        created_ts: row.get(5)?,
        body: row.get(6)?,
        raw_body: row.get(7)?,
    })
}
