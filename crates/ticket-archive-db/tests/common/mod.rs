//! Shared fixtures: export-shaped CSV batches written into a temp dir.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const EXPORT_HEADER: [&str; 15] = [
    "Ticket Number",
    "Ticket Name",
    "Status",
    "Subcategory",
    "Date Action Created",
    "Date Ticket Created",
    "Date Closed",
    "Ticket Type",
    "Customers",
    "Assigned To",
    "Ticket Source",
    "Action Creator Name",
    "Action Type",
    "Action Description",
    "Is Visible on Hub",
];

/// One export row. Fields not set keep plausible defaults.
#[derive(Debug, Clone)]
pub struct Action {
    pub ticket: String,
    pub subject: String,
    pub status: String,
    pub subcategory: String,
    pub action_created: String,
    pub ticket_created: String,
    pub closed: String,
    pub category: String,
    pub customers: String,
    pub assigned_to: String,
    pub source: String,
    pub creator: String,
    pub action_type: String,
    pub body: String,
    pub visible: String,
}

impl Action {
    pub fn new(ticket: &str, action_created: &str, creator: &str, body: &str) -> Self {
        Self {
            ticket: ticket.to_string(),
            subject: format!("Ticket {ticket}"),
            status: "Open".to_string(),
            subcategory: "General".to_string(),
            action_created: action_created.to_string(),
            ticket_created: String::new(),
            closed: String::new(),
            category: "Support".to_string(),
            customers: "Acme Lab".to_string(),
            assigned_to: "Bob".to_string(),
            source: "Email".to_string(),
            creator: creator.to_string(),
            action_type: "Comment".to_string(),
            body: body.to_string(),
            visible: "True".to_string(),
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn assigned_to(mut self, name: &str) -> Self {
        self.assigned_to = name.to_string();
        self
    }

    pub fn action_type(mut self, action_type: &str) -> Self {
        self.action_type = action_type.to_string();
        self
    }

    pub fn visible(mut self, visible: &str) -> Self {
        self.visible = visible.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn customers(mut self, customers: &str) -> Self {
        self.customers = customers.to_string();
        self
    }

    fn record(&self) -> [&str; 15] {
        [
            &self.ticket,
            &self.subject,
            &self.status,
            &self.subcategory,
            &self.action_created,
            &self.ticket_created,
            &self.closed,
            &self.category,
            &self.customers,
            &self.assigned_to,
            &self.source,
            &self.creator,
            &self.action_type,
            &self.body,
            &self.visible,
        ]
    }
}

/// Write `actions` as an export batch at `dir/name`.
pub fn write_batch(dir: &Path, name: &str, actions: &[Action]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).expect("create batch");
    writer.write_record(EXPORT_HEADER).expect("write header");
    for action in actions {
        writer.write_record(action.record()).expect("write row");
    }
    writer.flush().expect("flush batch");
    path
}
