//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to the JSON-RPC endpoints of one network
//! - Query chain state (chain id, balances, nonces, gas price, receipts)
//! - Broadcast signed transactions
//! - Handle timeouts and fall over to secondary endpoints for reads

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId};
use crate::config::RpcConfig;
use crate::connector::NetworkDescriptor;

type SharedProvider = Arc<dyn Provider + Send + Sync>;

/// RPC client for a single network, with failover across its endpoints.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Providers in priority order (descriptor urls, then configured failovers).
    providers: Vec<SharedProvider>,
    /// Endpoint urls, parallel to `providers`.
    urls: Vec<String>,
    /// Chain this client is expected to talk to.
    chain_id: ChainId,
    /// Per-call timeout.
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a client for `network`.
    ///
    /// Invalid urls are skipped with a warning; at least one must parse.
    /// No request is made here, use [`verify_chain_id`](Self::verify_chain_id)
    /// to check the endpoint.
    pub fn new(network: &NetworkDescriptor, rpc: &RpcConfig) -> BlockchainResult<Self> {
        let mut providers = Vec::new();
        let mut urls = Vec::new();

        for url_str in network.rpc_urls.iter().chain(rpc.failover_urls.iter()) {
            match url_str.parse::<url::Url>() {
                Ok(url) => {
                    providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as SharedProvider);
                    urls.push(url_str.clone());
                }
                Err(e) => {
                    tracing::warn!(url = %url_str, error = %e, "Ignoring invalid RPC URL");
                }
            }
        }

        if providers.is_empty() {
            return Err(BlockchainError::Rpc(format!(
                "No usable RPC URL for chain {}",
                network.chain_id
            )));
        }

        tracing::debug!(
            chain_id = %network.chain_id,
            endpoints = providers.len(),
            "Blockchain client created"
        );

        Ok(Self {
            providers,
            urls,
            chain_id: network.chain_id,
            timeout_duration: Duration::from_secs(rpc.timeout_secs),
        })
    }

    /// Run a read against each provider in turn until one answers.
    async fn read<T, F, Fut>(&self, op: &'static str, call: F) -> BlockchainResult<T>
    where
        F: Fn(SharedProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed: {}", op)))
    }

    /// Verify the endpoint reports the chain id this client was created for.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self.get_chain_id().await?;
        if actual != self.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.chain_id.0,
                actual: actual.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.read("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the balance of an address in wei.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.read("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }

    /// Get the pending transaction count (next nonce) for an address.
    pub async fn get_transaction_count(&self, address: Address) -> BlockchainResult<u64> {
        self.read("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.read("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Estimate the gas a transaction will use.
    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64> {
        self.read("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Get a transaction receipt by hash.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.read("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Broadcast a signed transaction.
    ///
    /// Goes to the primary endpoint only. A broadcast is never repeated
    /// against another endpoint.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let provider = &self.providers[0];
        match timeout(self.timeout_duration, provider.send_raw_transaction(&raw)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(BlockchainError::Rpc(e.to_string())),
            Err(_) => Err(BlockchainError::Rpc(format!(
                "Broadcast timed out after {} seconds",
                self.timeout_duration.as_secs()
            ))),
        }
    }

    /// Chain this client targets.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Endpoint urls in priority order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("urls", &self.urls)
            .field("chain_id", &self.chain_id)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
