//! seimap - Sei wallet to EVM address association mapper
//!
//! Looks up secp256k1 public keys for Sei wallet addresses, derives the
//! matching bech32 and EVM address representations, and persists the
//! associations in SQLite through a single serialized writer.

pub mod cli;
pub mod config;
pub mod derive;
pub mod dispatcher;
pub mod lookup;
pub mod records;
pub mod store;
pub mod worker;
pub mod writer;

// Re-export the main types for convenience
pub use records::{DerivationResult, StoreStats, WalletRecord};
pub use store::{SqliteWalletStore, WalletStore};
