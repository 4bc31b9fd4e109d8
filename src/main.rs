//! mapctl - wallet association store CLI tool
//!
//! A developer-friendly command-line interface for inspecting and seeding
//! the wallet association database.

use seimap::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
