//! Core types, configuration, and text handling for the ticket archive
//!
//! This crate provides:
//! - Configuration management (`Config`, environment parsing)
//! - Data models (`Ticket`, `Message`, `Role`)
//! - Source timestamp parsing and display formatting
//! - Storage-time body cleaning and the detail view builder

#![forbid(unsafe_code)]

pub mod clean;
pub mod config;
pub mod models;
pub mod timestamps;
pub mod view;

// Re-export key types for convenience
pub use clean::{HeaderShape, clean_message_body, normalize_whitespace, strip_system_header};
pub use config::{ALLOWED_PAGE_SIZES, Config, parse_bool};
pub use models::{Message, Role, Ticket, TicketDetail, normalize_ticket_number, ticket_number_value};
pub use timestamps::{format_display, micros_to_iso, parse_source_timestamp};
pub use view::{MessageView, StatusTone, TicketView, ViewOptions, linkify, split_signature};
