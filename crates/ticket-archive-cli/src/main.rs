#![forbid(unsafe_code)]

fn main() {
    std::process::exit(ticket_archive_cli::run());
}
