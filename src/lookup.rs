//! Account public-key lookup over Cosmos REST endpoints
//!
//! Provides a typed client for the `/cosmos/auth/v1beta1/accounts/{address}`
//! query. Every failure mode (network error, timeout, non-2xx status,
//! unexpected body shape) collapses to "no key" at the `KeySource`
//! boundary; callers never see an error from this module.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Source of account public keys, keyed by wallet address.
///
/// The seam between the pipeline and the network: workers are generic over
/// this so tests can substitute a canned key map.
pub trait KeySource: Send + Sync + 'static {
    /// Fetch the base64-encoded compressed public key for an address.
    ///
    /// Returns `None` when the key cannot be obtained for any reason.
    fn fetch_pubkey(&self, address: &str) -> impl Future<Output = Option<String>> + Send;
}

/// REST client that spreads lookups across a list of equivalent endpoints.
pub struct LookupClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
    /// Rotating endpoint cursor, advanced once per lookup call.
    cursor: AtomicUsize,
}

impl LookupClient {
    /// Create a new lookup client.
    ///
    /// `timeout` bounds each request end to end; a hung endpoint surfaces
    /// as an absent key rather than a stalled worker.
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            anyhow::bail!("At least one lookup endpoint is required");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Pick the next endpoint in round-robin order.
    fn next_endpoint(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.endpoints[i % self.endpoints.len()]
    }

    /// Query one endpoint for the account's public key.
    async fn fetch(&self, address: &str) -> Result<Option<String>> {
        let endpoint = self.next_endpoint();
        let url = format!("{}/cosmos/auth/v1beta1/accounts/{}", endpoint, address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send lookup request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP status {}", status);
        }

        let body: AccountResponse = response
            .json()
            .await
            .context("Failed to parse lookup response")?;

        Ok(extract_key(body))
    }
}

impl KeySource for LookupClient {
    async fn fetch_pubkey(&self, address: &str) -> Option<String> {
        match self.fetch(address).await {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Lookup failed for {}: {:#}", address, e);
                None
            }
        }
    }
}

/// Success body of the accounts query. Only the nested key field matters;
/// everything else is ignored.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    pub_key: Option<AccountPubKey>,
}

#[derive(Debug, Deserialize)]
struct AccountPubKey {
    key: Option<String>,
}

/// Flatten the nested response shape into the optional key.
fn extract_key(body: AccountResponse) -> Option<String> {
    body.account.and_then(|a| a.pub_key).and_then(|k| k.key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(endpoints: &[&str]) -> LookupClient {
        LookupClient::new(
            endpoints.iter().map(|e| e.to_string()).collect(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_an_endpoint() {
        assert!(LookupClient::new(Vec::new(), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_endpoint_rotation() {
        let client = test_client(&["http://a:1317", "http://b:1317", "http://c:1317"]);
        let picks: Vec<&str> = (0..5).map(|_| client.next_endpoint()).collect();
        assert_eq!(
            picks,
            vec![
                "http://a:1317",
                "http://b:1317",
                "http://c:1317",
                "http://a:1317",
                "http://b:1317"
            ]
        );
    }

    #[test]
    fn test_single_endpoint_rotation() {
        let client = test_client(&["http://only:1317"]);
        assert_eq!(client.next_endpoint(), "http://only:1317");
        assert_eq!(client.next_endpoint(), "http://only:1317");
    }

    #[test]
    fn test_extract_key_from_full_response() {
        let body: AccountResponse = serde_json::from_str(
            r#"{
                "account": {
                    "@type": "/cosmos.auth.v1beta1.BaseAccount",
                    "address": "sei1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe",
                    "pub_key": {
                        "@type": "/cosmos.crypto.secp256k1.PubKey",
                        "key": "Anm+Zn753LusVaBilc6HCwcCm/zbLc4o2VnygVsW+BeY"
                    },
                    "account_number": "42",
                    "sequence": "7"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            extract_key(body).as_deref(),
            Some("Anm+Zn753LusVaBilc6HCwcCm/zbLc4o2VnygVsW+BeY")
        );
    }

    #[test]
    fn test_extract_key_missing_pub_key() {
        // Accounts that have never signed a transaction have no pub_key
        let body: AccountResponse = serde_json::from_str(
            r#"{"account": {"@type": "/cosmos.auth.v1beta1.BaseAccount", "sequence": "0"}}"#,
        )
        .unwrap();
        assert_eq!(extract_key(body), None);
    }

    #[test]
    fn test_extract_key_error_shape() {
        let body: AccountResponse =
            serde_json::from_str(r#"{"code": 5, "message": "account not found"}"#).unwrap();
        assert_eq!(extract_key(body), None);
    }
}
