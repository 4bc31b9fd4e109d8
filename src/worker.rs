//! Batch worker
//!
//! Processes one batch of wallet addresses sequentially: look up the
//! public key, derive the addresses, and partition the outcomes. Lookup
//! failures are streamed back immediately, one message per address;
//! successful derivations are returned together when the batch finishes.
//! Workers never touch the store.

use crate::derive;
use crate::lookup::KeySource;
use crate::records::DerivationResult;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Process a batch of addresses against a key source.
///
/// Every address yields exactly one outcome: a `DerivationResult` in the
/// returned vector, or one message on the `failures` channel. A key that
/// cannot be derived (malformed base64, invalid curve point) counts as a
/// failure for that address only.
pub async fn process_batch<S: KeySource>(
    batch_id: u64,
    addresses: Vec<String>,
    source: Arc<S>,
    failures: mpsc::Sender<String>,
) -> (u64, Vec<DerivationResult>) {
    let mut derived = Vec::with_capacity(addresses.len());

    for address in addresses {
        match source.fetch_pubkey(&address).await {
            Some(public_key) => match derive::derive_addresses(&public_key) {
                Ok(d) => {
                    if d.bech32_address != address {
                        warn!(
                            "Derived address {} does not match source {}",
                            d.bech32_address, address
                        );
                    }
                    derived.push(DerivationResult {
                        address,
                        public_key,
                        evm_address: d.evm_address,
                    });
                }
                Err(e) => {
                    debug!("Derivation failed for {}: {:#}", address, e);
                    report_failure(&failures, address).await;
                }
            },
            None => report_failure(&failures, address).await,
        }
    }

    debug!("Batch {} processing completed", batch_id);
    (batch_id, derived)
}

/// Stream one failure back so counters advance without waiting on the
/// rest of the batch.
async fn report_failure(failures: &mpsc::Sender<String>, address: String) {
    if failures.send(address).await.is_err() {
        warn!("Failure channel closed before batch finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_1_B64: &str = "Anm+Zn753LusVaBilc6HCwcCm/zbLc4o2VnygVsW+BeY";
    const ADDR_1: &str = "sei1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe";

    struct MapSource(HashMap<String, String>);

    impl KeySource for MapSource {
        async fn fetch_pubkey(&self, address: &str) -> Option<String> {
            self.0.get(address).cloned()
        }
    }

    #[tokio::test]
    async fn test_every_address_yields_exactly_one_outcome() {
        let mut keys = HashMap::new();
        keys.insert(ADDR_1.to_string(), KEY_1_B64.to_string());
        keys.insert("sei1badkey".to_string(), "%%% not base64 %%%".to_string());
        let source = Arc::new(MapSource(keys));

        let batch = vec![
            ADDR_1.to_string(),
            "sei1missing".to_string(),
            "sei1badkey".to_string(),
        ];
        let (failure_tx, mut failure_rx) = mpsc::channel(8);

        let (batch_id, derived) = process_batch(7, batch, source, failure_tx).await;
        assert_eq!(batch_id, 7);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].address, ADDR_1);
        assert_eq!(derived[0].public_key, KEY_1_B64);
        assert_eq!(
            derived[0].evm_address,
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );

        let mut failed = Vec::new();
        while let Ok(address) = failure_rx.try_recv() {
            failed.push(address);
        }
        assert_eq!(failed, vec!["sei1missing", "sei1badkey"]);
    }

    #[tokio::test]
    async fn test_empty_key_source_fails_whole_batch() {
        let source = Arc::new(MapSource(HashMap::new()));
        let batch = vec!["sei1a".to_string(), "sei1b".to_string()];
        let (failure_tx, mut failure_rx) = mpsc::channel(8);

        let (_, derived) = process_batch(0, batch, source, failure_tx).await;
        assert!(derived.is_empty());
        assert_eq!(failure_rx.try_recv().unwrap(), "sei1a");
        assert_eq!(failure_rx.try_recv().unwrap(), "sei1b");
    }
}
