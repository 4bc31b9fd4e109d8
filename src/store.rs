//! WalletStore trait and SQLite implementation
//!
//! Persistent store for wallet → public key → EVM address associations.
//! One table, keyed by wallet address. Upserts of derived results never
//! touch the failure counter, and counter increments never touch the
//! derived columns, so the two write paths cannot clobber each other.

use crate::records::{DerivationResult, StoreStats, WalletRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Trait defining the interface for the wallet association store.
///
/// All methods return Results for proper error handling. Mutating methods
/// take `&mut self`; after startup only the writer actor holds the store,
/// which makes it the single mutation point by construction.
pub trait WalletStore {
    /// Load addresses eligible for processing.
    ///
    /// Eligible means no derived EVM address yet and, when `retry_cap` is
    /// given, fewer failed attempts than the cap. `None` disables the cap
    /// and returns every underived address.
    fn load_pending(&self, retry_cap: Option<u32>) -> Result<Vec<String>>;

    /// Get the full record for one address.
    fn get_record(&self, address: &str) -> Result<Option<WalletRecord>>;

    /// Insert bare address rows, skipping ones that already exist.
    ///
    /// Returns the number of rows actually created.
    fn insert_addresses(&mut self, addresses: &[String]) -> Result<usize>;

    /// Apply a batch of derivation results as one all-or-nothing unit.
    ///
    /// On primary-key conflict only `public_key` and `derived_evm_address`
    /// are overwritten; `failed_attempts` is left untouched.
    fn upsert_derived(&mut self, results: &[DerivationResult]) -> Result<()>;

    /// Increment the failure counter for exactly one address.
    fn increment_failure(&mut self, address: &str) -> Result<()>;

    /// Aggregate row counts, with pending/exhausted split at `retry_cap`.
    fn stats(&self, retry_cap: u32) -> Result<StoreStats>;
}

/// SQLite-backed implementation of WalletStore.
pub struct SqliteWalletStore {
    conn: Connection,
}

impl SqliteWalletStore {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;
        Self::init(conn)
    }

    /// Open a fresh in-memory database (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS wallet_associations (
                wallet_address      TEXT PRIMARY KEY,
                public_key          TEXT,
                derived_evm_address TEXT,
                failed_attempts     INTEGER NOT NULL DEFAULT 0
            );",
        )
        .context("Failed to create wallet_associations table")?;
        Ok(Self { conn })
    }

    /// Close the underlying connection, reporting any close-time error.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow::Error::new(e).context("Failed to close database"))
    }

    fn count(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row(sql, params, |row| row.get(0))
            .context("Failed to count rows")?;
        Ok(n as u64)
    }

    fn collect_addresses(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare pending query")?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .context("Failed to query pending addresses")?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to read pending addresses")
    }
}

impl WalletStore for SqliteWalletStore {
    fn load_pending(&self, retry_cap: Option<u32>) -> Result<Vec<String>> {
        match retry_cap {
            Some(cap) => self.collect_addresses(
                "SELECT wallet_address FROM wallet_associations
                 WHERE derived_evm_address IS NULL AND failed_attempts < ?1",
                &[&cap],
            ),
            None => self.collect_addresses(
                "SELECT wallet_address FROM wallet_associations
                 WHERE derived_evm_address IS NULL",
                &[],
            ),
        }
    }

    fn get_record(&self, address: &str) -> Result<Option<WalletRecord>> {
        self.conn
            .query_row(
                "SELECT wallet_address, public_key, derived_evm_address, failed_attempts
                 FROM wallet_associations WHERE wallet_address = ?1",
                params![address],
                |row| {
                    Ok(WalletRecord {
                        address: row.get(0)?,
                        public_key: row.get(1)?,
                        derived_evm_address: row.get(2)?,
                        failed_attempts: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to get record for {}", address))
    }

    fn insert_addresses(&mut self, addresses: &[String]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin insert transaction")?;
        let mut created = 0;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO wallet_associations (wallet_address) VALUES (?1)")
                .context("Failed to prepare insert")?;
            for address in addresses {
                created += stmt
                    .execute(params![address])
                    .with_context(|| format!("Failed to insert {}", address))?;
            }
        }
        tx.commit().context("Failed to commit inserts")?;
        Ok(created)
    }

    fn upsert_derived(&mut self, results: &[DerivationResult]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin upsert transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO wallet_associations (wallet_address, public_key, derived_evm_address)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(wallet_address) DO UPDATE SET
                         public_key = excluded.public_key,
                         derived_evm_address = excluded.derived_evm_address",
                )
                .context("Failed to prepare upsert")?;
            for result in results {
                stmt.execute(params![result.address, result.public_key, result.evm_address])
                    .with_context(|| format!("Failed to upsert {}", result.address))?;
            }
        }
        tx.commit().context("Failed to commit upsert batch")
    }

    fn increment_failure(&mut self, address: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE wallet_associations
                 SET failed_attempts = failed_attempts + 1
                 WHERE wallet_address = ?1",
                params![address],
            )
            .with_context(|| format!("Failed to increment failure counter for {}", address))?;
        Ok(())
    }

    fn stats(&self, retry_cap: u32) -> Result<StoreStats> {
        let total = self.count("SELECT COUNT(*) FROM wallet_associations", &[])?;
        let derived = self.count(
            "SELECT COUNT(*) FROM wallet_associations WHERE derived_evm_address IS NOT NULL",
            &[],
        )?;
        let pending = self.count(
            "SELECT COUNT(*) FROM wallet_associations
             WHERE derived_evm_address IS NULL AND failed_attempts < ?1",
            &[&retry_cap],
        )?;
        let exhausted = self.count(
            "SELECT COUNT(*) FROM wallet_associations
             WHERE derived_evm_address IS NULL AND failed_attempts >= ?1",
            &[&retry_cap],
        )?;
        Ok(StoreStats {
            total,
            derived,
            pending,
            exhausted,
        })
    }
}
