//! RPC client facade.
//!
//! Thin adapter over the nonblocking RPC client: optional account reads,
//! chunked multi-account reads, balance and token-balance reads, transaction
//! submission with confirmation, program-account queries, and account-change
//! subscription over the optional websocket endpoint.
//!
//! Rate-limit responses (HTTP 429 / "too many requests") are retried here
//! with exponential backoff so callers only ever see them after the retry
//! budget is spent. Every other failure propagates untouched; classification
//! is the worker's job, not the transport's.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_commitment_config::CommitmentConfig;
use solana_rpc_client_api::config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::common::types::{AnyResult, SolanaRpcClient};
use crate::constants::trade::{RATE_LIMIT_BASE_MS, RATE_LIMIT_CAP_MS, RATE_LIMIT_MAX_RETRIES};

const MULTIPLE_ACCOUNTS_CHUNK: usize = 100;

/// Shared, reentrant RPC access for the whole engine.
pub struct RpcFacade {
    client: Arc<SolanaRpcClient>,
    ws_url: Option<String>,
    commitment: CommitmentConfig,
}

impl RpcFacade {
    pub fn new(rpc_url: String, ws_url: Option<String>, commitment: CommitmentConfig) -> Self {
        let client = Arc::new(SolanaRpcClient::new_with_commitment(rpc_url, commitment));
        Self { client, ws_url, commitment }
    }

    pub fn client(&self) -> &Arc<SolanaRpcClient> {
        &self.client
    }

    /// Account data, or `None` when the account does not exist.
    pub async fn get_account_optional(&self, address: &Pubkey) -> AnyResult<Option<Account>> {
        let address = *address;
        let commitment = self.commitment;
        self.with_retry("get_account", || {
            let client = self.client.clone();
            async move {
                client
                    .get_account_with_commitment(&address, commitment)
                    .await
                    .map(|response| response.value)
            }
        })
        .await
    }

    /// Batched account read, chunked to stay under the RPC request cap.
    /// The output is position-aligned with `addresses`.
    pub async fn get_multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> AnyResult<Vec<Option<Account>>> {
        let mut out = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MULTIPLE_ACCOUNTS_CHUNK) {
            let chunk = chunk.to_vec();
            let accounts = self
                .with_retry("get_multiple_accounts", || {
                    let client = self.client.clone();
                    let chunk = chunk.clone();
                    async move { client.get_multiple_accounts(&chunk).await }
                })
                .await?;
            out.extend(accounts);
        }
        Ok(out)
    }

    pub async fn get_balance(&self, address: &Pubkey) -> AnyResult<u64> {
        let address = *address;
        self.with_retry("get_balance", || {
            let client = self.client.clone();
            async move { client.get_balance(&address).await }
        })
        .await
    }

    /// Base-unit balance of a token account; missing accounts read as zero.
    pub async fn get_token_balance(&self, token_account: &Pubkey) -> AnyResult<u64> {
        let token_account = *token_account;
        let result = self
            .with_retry("get_token_account_balance", || {
                let client = self.client.clone();
                async move { client.get_token_account_balance(&token_account).await }
            })
            .await;
        match result {
            Ok(balance) => balance
                .amount
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("unparseable token balance: {e}")),
            Err(e) if is_account_missing(&e.to_string()) => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub async fn get_latest_blockhash(&self) -> AnyResult<Hash> {
        self.with_retry("get_latest_blockhash", || {
            let client = self.client.clone();
            async move { client.get_latest_blockhash().await }
        })
        .await
    }

    /// Submits a signed transaction and waits for `confirmed` commitment.
    ///
    /// Not retried: a duplicate submission inside the blockhash window would
    /// at best fail and at worst double-count in caller stats.
    pub async fn send_and_confirm(&self, transaction: &Transaction) -> AnyResult<Signature> {
        Ok(self.client.send_and_confirm_transaction(transaction).await?)
    }

    pub async fn get_program_accounts_with_config(
        &self,
        program: &Pubkey,
        config: RpcProgramAccountsConfig,
    ) -> AnyResult<Vec<(Pubkey, Account)>> {
        let program = *program;
        self.with_retry("get_program_accounts", || {
            let client = self.client.clone();
            let config = config.clone();
            async move { client.get_program_accounts_with_config(&program, config).await }
        })
        .await
    }

    /// Streams the lamport balance of `address` on every account change.
    ///
    /// Returns `None` when no websocket endpoint is configured. The
    /// subscription lives in a background task and ends silently when the
    /// receiver is dropped or the socket closes; callers must keep their own
    /// polling fallback.
    pub fn subscribe_account_lamports(&self, address: Pubkey) -> Option<mpsc::Receiver<u64>> {
        let ws_url = self.ws_url.clone()?;
        let commitment = self.commitment;
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let client = match PubsubClient::new(&ws_url).await {
                Ok(client) => client,
                Err(e) => {
                    debug!(%address, "account subscription unavailable: {e}");
                    return;
                }
            };
            let config = RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: None,
                commitment: Some(commitment),
                min_context_slot: None,
            };
            let subscription = client.account_subscribe(&address, Some(config)).await;
            let (mut stream, _unsubscribe) = match subscription {
                Ok(pair) => pair,
                Err(e) => {
                    debug!(%address, "account_subscribe failed: {e}");
                    return;
                }
            };
            use futures::StreamExt;
            while let Some(update) = stream.next().await {
                if tx.send(update.value.lamports).await.is_err() {
                    break;
                }
            }
        });
        Some(rx)
    }

    async fn with_retry<T, E, F, Fut>(&self, what: &str, mut call: F) -> AnyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut delay = Duration::from_millis(RATE_LIMIT_BASE_MS);
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if is_rate_limited(&e.to_string()) && attempt < RATE_LIMIT_MAX_RETRIES => {
                    attempt += 1;
                    warn!(what, attempt, delay_ms = delay.as_millis() as u64, "rpc rate limited");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_millis(RATE_LIMIT_CAP_MS));
                }
                Err(e) => {
                    // The cause text stays in the message so downstream
                    // classification can still see codes and reasons.
                    return Err(anyhow::anyhow!("rpc {what} failed: {e}"));
                }
            }
        }
    }
}

pub(crate) fn is_rate_limited(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
}

pub(crate) fn is_account_missing(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("could not find account")
        || lower.contains("accountnotfound")
        || lower.contains("invalid param: could not find")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(is_rate_limited("HTTP status client error (429 Too Many Requests)"));
        assert!(is_rate_limited("rate limit exceeded"));
        assert!(!is_rate_limited("connection refused"));
    }

    #[test]
    fn missing_account_detection() {
        assert!(is_account_missing("Invalid param: could not find account"));
        assert!(!is_account_missing("timeout"));
    }
}
