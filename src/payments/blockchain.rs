// ABOUTME: On-chain verification of manual Solana and Bitcoin payments
// ABOUTME: Looks up a transaction by reference and checks the amount paid to the receiving address
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Blockchain Verification
//!
//! Solana is queried over JSON-RPC (`getTransaction`), Bitcoin through an
//! Esplora-compatible indexer (`GET /tx/{txid}`). Both report a
//! [`ChainTransfer`]: whether the transaction is final and how much it paid to
//! a given address.

use std::time::Duration;

use async_trait::async_trait;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info};

use super::rate_limit::RpcRateLimiter;

/// What a transaction did for one receiving address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTransfer {
    /// Final on chain (Solana: no error at `confirmed`; Bitcoin: in a block)
    pub confirmed: bool,
    /// Whether execution failed
    pub failed: bool,
    /// Smallest units received by the address
    pub received: u64,
}

/// Transaction lookup for one chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain name for messages
    fn chain(&self) -> &'static str;

    /// Whether `reference` is shaped like a transaction id on this chain
    fn is_valid_reference(&self, reference: &str) -> bool;

    /// Find `reference` and measure what it paid to `address`; `None` if unknown
    async fn lookup(&self, reference: &str, address: &str) -> AppResult<Option<ChainTransfer>>;
}

/// Result of verifying a payment reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Paid in full and final
    Confirmed {
        /// Units received
        received: u64,
    },
    /// Not visible (or not final) after every attempt
    Pending,
    /// The transaction failed on chain
    Failed,
    /// Paid less than expected
    Insufficient {
        /// Units received
        received: u64,
    },
}

/// Lookup retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total lookups, at least one
    pub attempts: u32,
    /// Pause between lookups
    pub delay: Duration,
}

/// Check that `reference` paid at least `expected` to `address`
///
/// Transactions that are unknown or not final yet are looked up again until
/// the policy is exhausted.
///
/// # Errors
///
/// Returns `INVALID_FORMAT` for a malformed reference, or the lookup error
pub async fn verify_transfer(
    client: &dyn ChainClient,
    reference: &str,
    address: &str,
    expected: u64,
    policy: RetryPolicy,
) -> AppResult<Verification> {
    if !client.is_valid_reference(reference) {
        return Err(AppError::new(
            ErrorCode::InvalidFormat,
            format!("'{reference}' is not a valid {} transaction id", client.chain()),
        ));
    }

    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match client.lookup(reference, address).await? {
            Some(transfer) if transfer.failed => return Ok(Verification::Failed),
            Some(transfer) if transfer.confirmed => {
                info!(
                    chain = client.chain(),
                    received = transfer.received,
                    expected,
                    "Transaction found"
                );
                return Ok(if transfer.received >= expected {
                    Verification::Confirmed {
                        received: transfer.received,
                    }
                } else {
                    Verification::Insufficient {
                        received: transfer.received,
                    }
                });
            }
            _ => debug!(chain = client.chain(), attempt, attempts, "Transaction not final yet"),
        }
        if attempt < attempts {
            sleep(policy.delay).await;
        }
    }
    Ok(Verification::Pending)
}

// ============================================================================
// Solana
// ============================================================================

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Deserialize)]
struct SolanaTransaction {
    meta: Option<SolanaMeta>,
    transaction: SolanaTransactionBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaMeta {
    err: Option<serde_json::Value>,
    pre_balances: Vec<u64>,
    post_balances: Vec<u64>,
}

#[derive(Deserialize)]
struct SolanaTransactionBody {
    message: SolanaMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaMessage {
    account_keys: Vec<SolanaAccountKey>,
}

/// `jsonParsed` returns objects; plain encodings return bare strings
#[derive(Deserialize)]
#[serde(untagged)]
enum SolanaAccountKey {
    Parsed { pubkey: String },
    Plain(String),
}

impl SolanaAccountKey {
    fn pubkey(&self) -> &str {
        match self {
            Self::Parsed { pubkey } | Self::Plain(pubkey) => pubkey,
        }
    }
}

/// Solana JSON-RPC client
pub struct SolanaClient {
    client: Client,
    endpoint: String,
    limiter: RpcRateLimiter,
}

impl SolanaClient {
    /// Create a client for `endpoint`
    #[must_use]
    pub fn new(client: Client, endpoint: &str, limiter: RpcRateLimiter) -> Self {
        Self {
            client,
            endpoint: endpoint.to_owned(),
            limiter,
        }
    }
}

fn solana_transfer(tx: &SolanaTransaction, address: &str) -> ChainTransfer {
    let Some(meta) = &tx.meta else {
        return ChainTransfer {
            confirmed: false,
            failed: false,
            received: 0,
        };
    };
    let received = tx
        .transaction
        .message
        .account_keys
        .iter()
        .position(|key| key.pubkey() == address)
        .and_then(|index| {
            let pre = meta.pre_balances.get(index)?;
            let post = meta.post_balances.get(index)?;
            Some(post.saturating_sub(*pre))
        })
        .unwrap_or(0);
    ChainTransfer {
        confirmed: true,
        failed: meta.err.is_some(),
        received,
    }
}

#[async_trait]
impl ChainClient for SolanaClient {
    fn chain(&self) -> &'static str {
        "Solana"
    }

    fn is_valid_reference(&self, reference: &str) -> bool {
        (64..=88).contains(&reference.len())
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l'))
    }

    async fn lookup(&self, reference: &str, address: &str) -> AppResult<Option<ChainTransfer>> {
        self.limiter.acquire(&self.endpoint).await;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                reference,
                {
                    "encoding": "jsonParsed",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0
                }
            ]
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service("Solana RPC", format!("Request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service("Solana RPC", format!("HTTP {status}")));
        }
        let parsed: RpcResponse<SolanaTransaction> = response
            .json()
            .await
            .map_err(|e| {
                AppError::external_service("Solana RPC", format!("Invalid response: {e}"))
            })?;
        if let Some(error) = parsed.error {
            return Err(AppError::external_service("Solana RPC", error.message));
        }
        Ok(parsed.result.map(|tx| solana_transfer(&tx, address)))
    }
}

// ============================================================================
// Bitcoin
// ============================================================================

#[derive(Deserialize)]
struct EsploraTransaction {
    vout: Vec<EsploraOutput>,
    status: EsploraStatus,
}

#[derive(Deserialize)]
struct EsploraOutput {
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Deserialize)]
struct EsploraStatus {
    confirmed: bool,
}

/// Esplora indexer client (mempool.space, blockstream.info)
pub struct BitcoinClient {
    client: Client,
    base_url: String,
    limiter: RpcRateLimiter,
}

impl BitcoinClient {
    /// Create a client for an indexer at `base_url`
    #[must_use]
    pub fn new(client: Client, base_url: &str, limiter: RpcRateLimiter) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            limiter,
        }
    }
}

fn bitcoin_transfer(tx: &EsploraTransaction, address: &str) -> ChainTransfer {
    ChainTransfer {
        confirmed: tx.status.confirmed,
        failed: false,
        received: tx
            .vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(address))
            .map(|out| out.value)
            .sum(),
    }
}

#[async_trait]
impl ChainClient for BitcoinClient {
    fn chain(&self) -> &'static str {
        "Bitcoin"
    }

    fn is_valid_reference(&self, reference: &str) -> bool {
        reference.len() == 64 && reference.chars().all(|c| c.is_ascii_hexdigit())
    }

    async fn lookup(&self, reference: &str, address: &str) -> AppResult<Option<ChainTransfer>> {
        let url = format!("{}/tx/{}", self.base_url, reference.to_ascii_lowercase());
        self.limiter.acquire(&url).await;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("Bitcoin indexer", format!("Request failed: {e}"))
            })?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => return Ok(None),
            status if !status.is_success() => {
                return Err(AppError::external_service("Bitcoin indexer", format!("HTTP {status}")));
            }
            _ => {}
        }
        let tx: EsploraTransaction = response
            .json()
            .await
            .map_err(|e| {
                AppError::external_service("Bitcoin indexer", format!("Invalid response: {e}"))
            })?;
        Ok(Some(bitcoin_transfer(&tx, address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const RECEIVER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    #[test]
    fn test_solana_balance_delta() {
        let tx: SolanaTransaction = serde_json::from_value(json!({
            "meta": {"err": null, "preBalances": [5_000_000, 1_000], "postBalances": [3_995_000, 1_001_000]},
            "transaction": {"message": {"accountKeys": [
                {"pubkey": "sender", "signer": true, "writable": true},
                {"pubkey": RECEIVER, "signer": false, "writable": true}
            ]}}
        }))
        .unwrap();
        let transfer = solana_transfer(&tx, RECEIVER);
        assert!(transfer.confirmed);
        assert!(!transfer.failed);
        assert_eq!(transfer.received, 1_000_000);
        assert_eq!(solana_transfer(&tx, "someone-else").received, 0);
    }

    #[test]
    fn test_solana_failed_transaction() {
        let tx: SolanaTransaction = serde_json::from_value(json!({
            "meta": {"err": {"InstructionError": [0, "Custom"]}, "preBalances": [1], "postBalances": [1]},
            "transaction": {"message": {"accountKeys": [RECEIVER]}}
        }))
        .unwrap();
        assert!(solana_transfer(&tx, RECEIVER).failed);
    }

    #[test]
    fn test_bitcoin_outputs_are_summed() {
        let tx: EsploraTransaction = serde_json::from_value(json!({
            "vout": [
                {"scriptpubkey_address": "bc1qreceiver", "value": 40_000},
                {"scriptpubkey_address": "bc1qchange", "value": 12_345},
                {"scriptpubkey_address": "bc1qreceiver", "value": 10_000},
                {"value": 0}
            ],
            "status": {"confirmed": true, "block_height": 840_000}
        }))
        .unwrap();
        let transfer = bitcoin_transfer(&tx, "bc1qreceiver");
        assert!(transfer.confirmed);
        assert_eq!(transfer.received, 50_000);
    }

    struct ScriptedChain {
        calls: AtomicU32,
        visible_after: u32,
        received: u64,
    }

    #[async_trait]
    impl ChainClient for ScriptedChain {
        fn chain(&self) -> &'static str {
            "Test"
        }
        fn is_valid_reference(&self, reference: &str) -> bool {
            !reference.is_empty()
        }
        async fn lookup(
            &self,
            _reference: &str,
            _address: &str,
        ) -> AppResult<Option<ChainTransfer>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((call >= self.visible_after).then_some(ChainTransfer {
                confirmed: true,
                failed: false,
                received: self.received,
            }))
        }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retries_until_visible() {
        let chain = ScriptedChain {
            calls: AtomicU32::new(0),
            visible_after: 3,
            received: 100,
        };
        let result = verify_transfer(&chain, "tx", "addr", 100, policy(3)).await.unwrap();
        assert_eq!(result, Verification::Confirmed { received: 100 });
        assert_eq!(chain.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pending_after_attempts_and_insufficient() {
        let hidden = ScriptedChain {
            calls: AtomicU32::new(0),
            visible_after: 10,
            received: 100,
        };
        let result = verify_transfer(&hidden, "tx", "addr", 100, policy(2)).await.unwrap();
        assert_eq!(result, Verification::Pending);
        assert_eq!(hidden.calls.load(Ordering::SeqCst), 2);

        let short = ScriptedChain {
            calls: AtomicU32::new(0),
            visible_after: 1,
            received: 99,
        };
        let result = verify_transfer(&short, "tx", "addr", 100, policy(1)).await.unwrap();
        assert_eq!(result, Verification::Insufficient { received: 99 });
    }

    #[test]
    fn test_reference_shapes() {
        let limiter = RpcRateLimiter::new(Duration::ZERO);
        let btc = BitcoinClient::new(Client::new(), "https://mempool.space/api/", limiter.clone());
        assert!(btc.is_valid_reference(&"a1".repeat(32)));
        assert!(!btc.is_valid_reference("xyz"));

        let sol = SolanaClient::new(Client::new(), "https://api.mainnet-beta.solana.com", limiter);
        assert!(sol.is_valid_reference(&"5".repeat(87)));
        assert!(!sol.is_valid_reference(&"0".repeat(87)));
    }
}
