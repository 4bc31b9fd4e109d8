//! Configuration constants and list-file loading
//!
//! Handles loading the lookup endpoint list and address seed files.
//! Each line holds one entry; empty lines and lines starting with '#'
//! are ignored.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Maximum number of tasks handed to one worker.
pub const DEFAULT_BATCH_SIZE: usize = 80;

/// Number of batch workers kept in flight.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// An address is no longer retried once it has failed this many lookups.
pub const DEFAULT_RETRY_CAP: u32 = 3;

/// Per-lookup HTTP timeout in seconds. A hung lookup counts as "not found".
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Fallback REST endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://tasty.seipex.fi:1317";

/// Load a list of lookup endpoints from a file.
///
/// Each line should contain one base URL, e.g. `http://node.example.com:1317`.
/// A single endpoint is the degenerate, supported case.
pub fn load_endpoints(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read endpoints file: {:?}", path))?;

    let mut endpoints = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !line.starts_with("http://") && !line.starts_with("https://") {
            anyhow::bail!(
                "Invalid endpoint on line {} (expected http:// or https:// URL): {}",
                line_num + 1,
                line
            );
        }

        endpoints.push(line.trim_end_matches('/').to_string());
    }

    if endpoints.is_empty() {
        anyhow::bail!("Endpoints file is empty (no valid endpoints found)");
    }

    Ok(endpoints)
}

/// Load wallet addresses from a seed file, one per line.
///
/// Used by `mapctl import` to create rows before a mapper run.
pub fn load_address_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read address file: {:?}", path))?;

    let mut addresses = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        validate_wallet_address(line)
            .with_context(|| format!("Invalid address on line {}: {}", line_num + 1, line))?;

        addresses.push(line.to_string());
    }

    if addresses.is_empty() {
        anyhow::bail!("Address file is empty (no valid addresses found)");
    }

    Ok(addresses)
}

/// Check that a string is plausibly a Sei bech32 wallet address.
///
/// Only shape is checked here; the checksum is validated implicitly when the
/// derived address is compared against the source after a successful lookup.
pub fn validate_wallet_address(address: &str) -> Result<()> {
    if !address.starts_with("sei1") {
        anyhow::bail!("Address must start with 'sei1'");
    }
    if address.len() < 8 {
        anyhow::bail!("Address too short");
    }
    if address.chars().any(|c| c.is_ascii_uppercase()) {
        anyhow::bail!("Address must be lowercase");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_endpoints() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "http://node-a.example.com:1317").unwrap();
        writeln!(file, "# mirror").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "https://node-b.example.com/").unwrap();
        file.flush().unwrap();

        let endpoints = load_endpoints(file.path()).unwrap();
        assert_eq!(endpoints.len(), 2);
        // Trailing slash is stripped so path joining stays uniform
        assert_eq!(endpoints[1], "https://node-b.example.com");
    }

    #[test]
    fn test_load_endpoints_rejects_bare_host() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "node-a.example.com:1317").unwrap();
        file.flush().unwrap();

        assert!(load_endpoints(file.path()).is_err());
    }

    #[test]
    fn test_load_endpoints_empty() {
        let file = NamedTempFile::new().unwrap();
        assert!(load_endpoints(file.path()).is_err());
    }

    #[test]
    fn test_load_address_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sei1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "sei1q6hag67dl53wl99vzg42z8eyzfz2xlkva0h2sd").unwrap();
        file.flush().unwrap();

        let addresses = load_address_file(file.path()).unwrap();
        assert_eq!(addresses.len(), 2);
    }

    #[test]
    fn test_load_address_file_rejects_foreign_prefix() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cosmos1q6hag67dl53wl99vzg42z8eyzfz2xlkvxkjdnd").unwrap();
        file.flush().unwrap();

        assert!(load_address_file(file.path()).is_err());
    }

    #[test]
    fn test_validate_wallet_address() {
        assert!(validate_wallet_address("sei1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe").is_ok());
        assert!(validate_wallet_address("sei1").is_err());
        assert!(validate_wallet_address("SEI1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe").is_err());
    }
}
