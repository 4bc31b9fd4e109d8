//! Record types for wallet association data
//!
//! These structs represent rows in the wallet association store and the
//! per-address outcome produced by the processing pipeline.

use serde::{Deserialize, Serialize};

/// A row in the `wallet_associations` table.
///
/// `public_key` and `derived_evm_address` stay NULL until a lookup and
/// derivation succeed for the address. `failed_attempts` counts lookup
/// failures; it only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Sei wallet address (bech32, primary key)
    pub address: String,
    /// Base64-encoded compressed secp256k1 public key, once known
    pub public_key: Option<String>,
    /// Derived EVM address (0x-prefixed lowercase hex), once derived
    pub derived_evm_address: Option<String>,
    /// Number of failed lookup attempts so far
    pub failed_attempts: u32,
}

/// Successful lookup + derivation outcome for one address.
///
/// Written to storage via upsert: on conflict only `public_key` and
/// `derived_evm_address` are overwritten, never `failed_attempts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationResult {
    /// Source wallet address
    pub address: String,
    /// Base64-encoded compressed public key returned by the lookup
    pub public_key: String,
    /// Derived EVM address (0x-prefixed lowercase hex)
    pub evm_address: String,
}

/// Aggregate row counts for the store, as reported by `mapctl stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total rows in the table
    pub total: u64,
    /// Rows with a derived EVM address
    pub derived: u64,
    /// Rows still eligible for processing (not derived, under the retry cap)
    pub pending: u64,
    /// Rows that exhausted the retry cap without a derivation
    pub exhausted: u64,
}
