//! `ta`: operator CLI for the ticket archive
//!
//! - `migrate` rebuilds the store from CSV exports
//! - `verify` checks a finished store
//! - `list`, `show` and `facets` browse it read-only
//!
//! Results go to stdout (pretty JSON with `--json`); logs go to stderr.

#![forbid(unsafe_code)]

pub mod output;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ticket_archive_core::timestamps::{DISPLAY_FORMAT, format_display};
use ticket_archive_core::{Config, TicketView, ViewOptions};
use ticket_archive_db::{
    DbError, MigrateOptions, TicketFilter, TicketStore, migrate_archive, verify_store,
};

use crate::output::{CliTable, json_or_text};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("exit code {0}")]
    ExitCode(i32),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "ta", version, about = "Migrate and browse the support ticket archive")]
pub struct Cli {
    /// Log at debug level.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Store to use instead of `DATABASE_PATH`.
    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive match on ticket number or subject.
    #[arg(long = "q", value_name = "TERM")]
    pub search: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    /// Assigned agent.
    #[arg(long = "agent")]
    pub assigned_to: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub subcategory: Option<String>,
    #[arg(long)]
    pub customer: Option<String>,
    /// Year of last update.
    #[arg(long)]
    pub year: Option<i32>,
    /// Month of last update (1-12).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,
}

impl FilterArgs {
    #[must_use]
    pub fn to_filter(&self) -> TicketFilter {
        TicketFilter {
            search: self.search.clone(),
            assigned_to: self.assigned_to.clone(),
            status: self.status.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            customer: self.customer.clone(),
            year: self.year,
            month: self.month,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the store from CSV exports (files or directories).
    #[command(name = "migrate")]
    Migrate {
        /// Export files or directories; defaults to `ARCHIVE_INPUT_DIR`.
        #[arg(value_name = "INPUT")]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
        /// Compact the store after loading.
        #[arg(long, default_value_t = false)]
        vacuum: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check store consistency.
    #[command(name = "verify")]
    Verify {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List tickets, most recently updated first.
    #[command(name = "list")]
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long = "per-page")]
        per_page: Option<usize>,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show one ticket with its conversation.
    #[command(name = "show")]
    Show {
        ticket: String,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Value counts per filter facet.
    #[command(name = "facets")]
    Facets {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute(cli, &Config::from_env(), &mut out, output::is_tty()) {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            err_exit_code(&err)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Process exit code for a failed command: 2 for a missing ticket or store,
/// otherwise 1.
#[must_use]
pub const fn err_exit_code(err: &CliError) -> i32 {
    match err {
        CliError::ExitCode(code) => *code,
        CliError::Db(DbError::NotFound { .. }) => 2,
        _ => 1,
    }
}

fn emit_error(err: &CliError) {
    if matches!(err, CliError::ExitCode(_)) {
        return;
    }
    if let CliError::Db(db) = err {
        eprintln!("error [{}]: {db}", db.error_code());
    } else {
        eprintln!("error: {err}");
    }
}

/// Run one parsed command against `config`, writing results to `out`.
pub fn execute(cli: Cli, config: &Config, out: &mut dyn Write, tty: bool) -> CliResult<()> {
    match cli.command {
        Commands::Migrate {
            inputs,
            store,
            vacuum,
            json,
        } => handle_migrate(config, inputs, &store, vacuum, json, out),
        Commands::Verify { store, json } => handle_verify(config, &store, json, out),
        Commands::List {
            filters,
            page,
            per_page,
            store,
            json,
        } => handle_list(config, &filters, page, per_page, &store, json, out, tty),
        Commands::Show {
            ticket,
            store,
            json,
        } => handle_show(config, &ticket, &store, json, out),
        Commands::Facets {
            filters,
            store,
            json,
        } => handle_facets(config, &filters, &store, json, out),
    }
}

fn store_path(config: &Config, store: &StoreArgs) -> PathBuf {
    store
        .database
        .clone()
        .unwrap_or_else(|| config.database_path.clone())
}

fn open_store(config: &Config, store: &StoreArgs) -> CliResult<TicketStore> {
    let config = Config {
        database_path: store_path(config, store),
        ..config.clone()
    };
    Ok(TicketStore::open_with_config(&config)?)
}

fn handle_migrate(
    config: &Config,
    inputs: Vec<PathBuf>,
    store: &StoreArgs,
    vacuum: bool,
    json: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let inputs = if inputs.is_empty() {
        vec![config.input_dir.clone()]
    } else {
        inputs
    };
    let dest = store_path(config, store);
    let options = MigrateOptions {
        vacuum: vacuum || config.vacuum_after_migrate,
    };
    tracing::debug!(?inputs, dest = %dest.display(), vacuum = options.vacuum, "starting migration");
    let stats = migrate_archive(&inputs, &dest, options)?;
    json_or_text(out, json, &stats, |out| {
        writeln!(out, "{stats}")?;
        writeln!(out, "store: {}", dest.display())?;
        Ok(())
    })
}

fn handle_verify(
    config: &Config,
    store: &StoreArgs,
    json: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let report = verify_store(&store_path(config, store))?;
    json_or_text(out, json, &report, |out| {
        writeln!(out, "{report}")?;
        Ok(())
    })?;
    if report.is_healthy() {
        Ok(())
    } else {
        Err(CliError::ExitCode(1))
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_list(
    config: &Config,
    filters: &FilterArgs,
    page: usize,
    per_page: Option<usize>,
    store: &StoreArgs,
    json: bool,
    out: &mut dyn Write,
    tty: bool,
) -> CliResult<()> {
    let ticket_store = open_store(config, store)?;
    let per_page = config.page_size(per_page);
    let listing = ticket_store.list_tickets_page(&filters.to_filter(), page, per_page)?;

    json_or_text(out, json, &listing, |out| {
        if listing.tickets.is_empty() {
            writeln!(out, "No tickets found.")?;
            return Ok(());
        }
        let mut table = CliTable::new(&["TICKET", "UPDATED", "STATUS", "ASSIGNED", "SUBJECT"]);
        for ticket in &listing.tickets {
            table.add_row(vec![
                ticket.ticket_number.clone(),
                format_display(ticket.updated_ts, DISPLAY_FORMAT),
                ticket.status.clone(),
                ticket.assigned_to.clone(),
                ticket.subject.clone(),
            ]);
        }
        write!(out, "{}", table.render_to_string(tty))?;
        writeln!(
            out,
            "page {} of {} ({} of {} tickets)",
            listing.page, listing.total_pages, listing.filtered, listing.total
        )?;
        Ok(())
    })
}

fn handle_show(
    config: &Config,
    ticket: &str,
    store: &StoreArgs,
    json: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let detail = open_store(config, store)?.get_ticket(ticket)?;
    let view = TicketView::build(&detail, &ViewOptions::from_config(config));
    json_or_text(out, json, &view, |out| render_ticket(&view, out))
}

fn render_ticket(view: &TicketView, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "#{} {}", view.ticket_number, view.subject)?;
    writeln!(out, "status:    {} ({})", view.status, view.status_tone.as_str())?;
    writeln!(out, "category:  {} / {}", view.category, view.subcategory)?;
    writeln!(out, "assigned:  {}", view.assigned_to)?;
    writeln!(out, "opened by: {}", view.opened_by)?;
    writeln!(out, "customers: {}", view.customers)?;
    writeln!(out, "source:    {}", view.source)?;
    writeln!(
        out,
        "created {} | updated {} | closed {}",
        view.created_display, view.updated_display, view.closed_display
    )?;
    for message in &view.messages {
        writeln!(out)?;
        writeln!(
            out,
            "[{}] {} {} ({}, {})",
            message.position + 1,
            message.created_display,
            message.author,
            message.role,
            message.action_type
        )?;
        if message.body.is_empty() {
            writeln!(out, "(no content)")?;
        } else {
            writeln!(out, "{}", message.body)?;
        }
        if let Some(signature) = &message.signature {
            writeln!(out, "-- ")?;
            writeln!(out, "{signature}")?;
        }
    }
    Ok(())
}

fn handle_facets(
    config: &Config,
    filters: &FilterArgs,
    store: &StoreArgs,
    json: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let facets = open_store(config, store)?.facets(&filters.to_filter())?;
    json_or_text(out, json, &facets, |out| {
        let sections = [
            ("assigned to", &facets.assigned_to),
            ("status", &facets.status),
            ("category", &facets.category),
            ("subcategory", &facets.subcategory),
            ("customer", &facets.customer),
        ];
        for (label, counts) in sections {
            writeln!(out, "{label}:")?;
            for c in counts {
                writeln!(out, "  {:<30} {}", c.value, c.count)?;
            }
        }
        writeln!(out, "year:")?;
        for y in &facets.year {
            writeln!(out, "  {:<30} {}", y.year, y.count)?;
        }
        writeln!(out, "month:")?;
        for m in &facets.month {
            writeln!(out, "  {:<30} {}", m.name, m.count)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_migrate_inputs_and_flags() {
        let cli = Cli::try_parse_from([
            "ta",
            "migrate",
            "exports/2019.csv",
            "exports/2020",
            "--database",
            "/tmp/t.db",
            "--vacuum",
        ])
        .expect("failed to parse migrate flags");
        match cli.command {
            Commands::Migrate {
                inputs,
                store,
                vacuum,
                json,
            } => {
                assert_eq!(
                    inputs,
                    vec![PathBuf::from("exports/2019.csv"), PathBuf::from("exports/2020")]
                );
                assert_eq!(store.database, Some(PathBuf::from("/tmp/t.db")));
                assert!(vacuum);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn clap_parses_list_filters() {
        let cli = Cli::try_parse_from([
            "ta", "-v", "list", "--q", "printer", "--agent", "Bob", "--year", "2024", "--month",
            "7", "--page", "3", "--per-page", "50",
        ])
        .expect("failed to parse list flags");
        assert!(cli.verbose);
        match cli.command {
            Commands::List {
                filters,
                page,
                per_page,
                ..
            } => {
                let filter = filters.to_filter();
                assert_eq!(filter.search.as_deref(), Some("printer"));
                assert_eq!(filter.assigned_to.as_deref(), Some("Bob"));
                assert_eq!(filter.year, Some(2024));
                assert_eq!(filter.month, Some(7));
                assert_eq!(page, 3);
                assert_eq!(per_page, Some(50));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn clap_rejects_out_of_range_month() {
        assert!(Cli::try_parse_from(["ta", "list", "--month", "13"]).is_err());
    }

    #[test]
    fn not_found_maps_to_exit_code_two() {
        let missing = CliError::Db(DbError::not_found("Ticket", "42"));
        assert_eq!(err_exit_code(&missing), 2);
        let invalid = CliError::Db(DbError::invalid("month", "bad"));
        assert_eq!(err_exit_code(&invalid), 1);
        assert_eq!(err_exit_code(&CliError::ExitCode(3)), 3);
    }

    #[test]
    fn flag_overrides_configured_store() {
        let config = Config::default();
        let store = StoreArgs {
            database: Some(PathBuf::from("elsewhere.db")),
        };
        assert_eq!(store_path(&config, &store), PathBuf::from("elsewhere.db"));
        assert_eq!(
            store_path(&config, &StoreArgs::default()),
            config.database_path
        );
    }
}
