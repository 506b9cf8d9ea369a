//! End-to-end migration: export batches in, store out, query surface reads.

mod common;

use common::{Action, write_batch};
use ticket_archive_core::Role;
use ticket_archive_db::{
    DbError, MigrateOptions, TicketStore, UNKNOWN_OPENER, migrate_archive, verify_store,
};

#[test]
fn header_block_is_stripped_and_role_derived() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[Action::new(
            "100",
            "2024-01-05T10:00",
            "Alice",
            "Action added via e-mail\nHeader junk\nHello there",
        )],
    );
    let db = dir.path().join("tickets.db");
    migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");

    let store = TicketStore::open(&db).expect("open store");
    let detail = store.get_ticket("100").expect("ticket 100");
    assert_eq!(detail.messages.len(), 1);
    let message = &detail.messages[0];
    assert_eq!(message.body, "Hello there");
    assert_eq!(message.role, Role::Customer);
    assert_eq!(message.author, "Alice");
    assert_eq!(
        message.raw_body,
        "Action added via e-mail\nHeader junk\nHello there"
    );
}

#[test]
fn out_of_order_rows_are_stored_chronologically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new("200", "02/01/2024 09:00 AM", "Bob", "second"),
            Action::new("200", "01/01/2024 09:00 AM", "Carol", "first").action_type("Description"),
        ],
    );
    let db = dir.path().join("tickets.db");
    migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");

    let detail = TicketStore::open(&db)
        .expect("open store")
        .get_ticket("200")
        .expect("ticket 200");
    let bodies: Vec<&str> = detail.messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert_eq!(detail.messages[1].role, Role::Agent);
    assert_eq!(detail.ticket.opened_by, "Carol");
    assert_eq!(detail.ticket.message_count, 2);
    assert!(detail.ticket.created_ts < detail.ticket.updated_ts);
}

#[test]
fn hidden_rows_never_reach_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new("300", "01/01/2024 09:00 AM", "Alice", "visible"),
            Action::new("300", "03/01/2024 09:00 AM", "Bob", "internal note")
                .subject("Renamed internally")
                .status("Closed")
                .visible("False"),
            Action::new("301", "01/01/2024 09:00 AM", "Alice", "hidden only").visible(""),
            Action::new("302", "01/01/2024 09:00 AM", "Alice", "yes").visible("1"),
        ],
    );
    let db = dir.path().join("tickets.db");
    let stats = migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");
    assert_eq!(stats.rows_read, 4);
    assert_eq!(stats.rows_dropped_invisible, 2);
    assert_eq!(stats.tickets, 2);
    assert_eq!(stats.messages, 2);

    let store = TicketStore::open(&db).expect("open store");
    let detail = store.get_ticket("300").expect("ticket 300");
    assert_eq!(detail.ticket.subject, "Ticket 300");
    assert_eq!(detail.ticket.status, "Open");
    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.ticket.opened_by, UNKNOWN_OPENER);

    assert!(store.get_ticket("301").expect_err("hidden ticket").is_not_found());
    assert_eq!(store.list_tickets(Some("")).expect("list").len(), 2);
}

#[test]
fn header_block_keeps_later_paragraphs_and_yes_flags_stay_hidden() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new(
                "500",
                "01/01/2024 09:00 AM",
                "Alice",
                "Action added via e-mail\nHeader junk\nHello there\n\nThanks,\nAlice",
            ),
            Action::new("500", "01/02/2024 09:00 AM", "Bob", "flagged Y").visible("Y"),
            Action::new("501", "01/02/2024 09:00 AM", "Bob", "flagged yes").visible("yes"),
        ],
    );
    let db = dir.path().join("tickets.db");
    let stats = migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");
    assert_eq!(stats.rows_dropped_invisible, 2);
    assert_eq!(stats.tickets, 1);

    let store = TicketStore::open(&db).expect("open store");
    let detail = store.get_ticket("500").expect("ticket 500");
    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.messages[0].body, "Hello there\n\nThanks,\nAlice");
    assert!(store.get_ticket("501").expect_err("hidden ticket").is_not_found());
}

#[test]
fn batches_form_one_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inputs = dir.path().join("exports");
    std::fs::create_dir(&inputs).expect("mkdir");
    write_batch(
        &inputs,
        "2019.csv",
        &[Action::new("400", "06/01/2019 09:00 AM", "Alice", "old half")],
    );
    write_batch(
        &inputs,
        "2020.csv",
        &[Action::new("400", "06/01/2020 09:00 AM", "Alice", "new half")
            .subject("Latest subject")],
    );
    let db = dir.path().join("tickets.db");
    let stats = migrate_archive(&[inputs], &db, MigrateOptions::default()).expect("migrate");
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.tickets, 1);

    let detail = TicketStore::open(&db)
        .expect("open store")
        .get_ticket("400")
        .expect("ticket 400");
    assert_eq!(detail.ticket.subject, "Latest subject");
    assert_eq!(detail.messages.len(), 2);
}

#[test]
fn unparsable_dates_keep_the_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new("500", "sometime last week", "Alice", "undated"),
            Action::new("500", "01/02/2024 08:00 AM", "Alice", "dated"),
        ],
    );
    let db = dir.path().join("tickets.db");
    let stats = migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");
    assert_eq!(stats.dates_unparsed, 1);

    let detail = TicketStore::open(&db)
        .expect("open store")
        .get_ticket("500")
        .expect("ticket 500");
    let bodies: Vec<&str> = detail.messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["dated", "undated"]);
    assert_eq!(detail.messages[1].created_ts, None);
}

#[test]
fn rerun_is_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new("2", "01/03/2024 09:00 AM", "Alice", "a"),
            Action::new("1", "01/03/2024 09:00 AM", "Alice", "b"),
            Action::new("1", "", "Bob", "c"),
            Action::new("3", "", "Carol", "d"),
            Action::new("1", "01/01/2024 09:00 AM", "Bob", "e"),
        ],
    );
    let db = dir.path().join("tickets.db");

    let snapshot = || {
        let store = TicketStore::open(&db).expect("open store");
        let tickets = store.list_tickets(None).expect("list");
        let details: Vec<_> = tickets
            .iter()
            .map(|t| store.get_ticket(&t.ticket_number).expect("detail"))
            .collect();
        (tickets, details)
    };

    let first = migrate_archive(&[batch.clone()], &db, MigrateOptions::default()).expect("first");
    let first_snapshot = snapshot();
    let second = migrate_archive(&[batch], &db, MigrateOptions { vacuum: true }).expect("second");
    let second_snapshot = snapshot();

    assert_eq!(
        (first.rows_read, first.tickets, first.messages),
        (second.rows_read, second.tickets, second.messages)
    );
    assert_eq!(first_snapshot, second_snapshot);

    // Same update time: higher ticket number first; undated ticket last.
    let order: Vec<&str> = first_snapshot
        .0
        .iter()
        .map(|t| t.ticket_number.as_str())
        .collect();
    assert_eq!(order, vec!["2", "1", "3"]);
}

#[test]
fn missing_column_fails_and_keeps_previous_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = write_batch(
        dir.path(),
        "good.csv",
        &[Action::new("600", "01/01/2024 09:00 AM", "Alice", "hi")],
    );
    let db = dir.path().join("tickets.db");
    migrate_archive(&[good], &db, MigrateOptions::default()).expect("migrate");

    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "Ticket Number,Status\n601,Open\n").expect("write bad batch");
    let err = migrate_archive(&[bad], &db, MigrateOptions::default()).expect_err("must fail");
    assert!(matches!(err, DbError::MissingColumns { .. }));
    assert_eq!(err.error_code(), "INPUT_ERROR");

    let store = TicketStore::open(&db).expect("previous store");
    assert!(store.get_ticket("600").is_ok());
}

#[test]
fn no_readable_input_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("tickets.db");
    let err = migrate_archive(
        &[dir.path().join("missing.csv")],
        &db,
        MigrateOptions::default(),
    )
    .expect_err("must fail");
    assert!(matches!(err, DbError::NoInput(_)));
    assert!(!db.exists());
}

#[test]
fn verify_reports_a_healthy_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let batch = write_batch(
        dir.path(),
        "actions.csv",
        &[
            Action::new("700", "01/01/2024 09:00 AM", "Alice", "one"),
            Action::new("700", "", "Bob", "two"),
            Action::new("701", "05/01/2024 09:00 AM", "Alice", "three").subject("Newest"),
        ],
    );
    let db = dir.path().join("tickets.db");
    migrate_archive(&[batch], &db, MigrateOptions::default()).expect("migrate");

    let report = verify_store(&db).expect("verify");
    assert!(report.is_healthy(), "{report}");
    assert_eq!(report.tickets, 2);
    assert_eq!(report.messages, 3);
    assert_eq!(report.schema_version, ticket_archive_db::SCHEMA_VERSION);
    assert_eq!(
        report.latest.map(|t| t.subject),
        Some("Newest".to_string())
    );
}
