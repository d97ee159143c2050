//! Transaction assembly, signing and broadcast for the local wallet.
//!
//! # Responsibilities
//! - Fill nonce, gas limit, gas price and chain id of a wallet request
//! - Sign with the local key and broadcast exactly once

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;

/// Base cost of any transaction.
const BASE_GAS: u64 = 21_000;

/// Gas limit used when the node cannot estimate: base cost plus a flat
/// allowance for a token transfer and 16 gas per calldata byte.
pub fn fallback_gas_limit(data_len: usize) -> u64 {
    BASE_GAS + 40_000 + data_len as u64 * 16
}

/// Signs and broadcasts wallet requests on one network.
pub struct TxBuilder<'a> {
    client: &'a BlockchainClient,
    wallet: &'a Wallet,
}

impl<'a> TxBuilder<'a> {
    pub fn new(client: &'a BlockchainClient, wallet: &'a Wallet) -> Self {
        Self { client, wallet }
    }

    /// Complete a request with nonce, gas and chain id.
    ///
    /// A `gasPrice` already present on the request is kept, otherwise the
    /// node's current legacy gas price is used.
    pub async fn prepare(&self, request: TransactionRequest) -> BlockchainResult<TransactionRequest> {
        let from = self.wallet.address();
        let nonce = self.client.get_transaction_count(from).await?;

        let gas_price = match request.gas_price {
            Some(price) => price,
            None => self.client.get_gas_price().await?,
        };

        let tx = request
            .with_from(from)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_chain_id(self.client.chain_id().0);

        let gas_limit = match tx.gas {
            Some(limit) => limit,
            None => match self.client.estimate_gas(&tx).await {
                Ok(estimate) => estimate,
                Err(e) => {
                    let data_len = tx.input.input().map(|d| d.len()).unwrap_or_default();
                    let fallback = fallback_gas_limit(data_len);
                    tracing::warn!(error = %e, fallback, "Gas estimation failed, using fallback limit");
                    fallback
                }
            },
        };

        Ok(tx.with_gas_limit(gas_limit))
    }

    /// Sign a prepared request into its raw EIP-2718 encoding.
    pub async fn sign(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        let signer = self.wallet.network_wallet();
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &signer)
            .await
            .map_err(|e| BlockchainError::Transaction(format!("Signing failed: {}", e)))?;
        Ok(Bytes::from(envelope.encoded_2718()))
    }

    /// Prepare, sign and broadcast. One broadcast per call.
    pub async fn send(&self, request: TransactionRequest) -> BlockchainResult<TxHash> {
        let tx = self.prepare(request).await?;
        let nonce = tx.nonce;
        let raw = self.sign(tx).await?;
        let tx_hash = self.client.send_raw_transaction(raw).await?;

        tracing::info!(
            tx_hash = %tx_hash,
            from = %self.wallet.address(),
            nonce = ?nonce,
            "Transaction broadcast"
        );
        Ok(tx_hash)
    }
}
