//! Submission of token transfers through the connected wallet.

use alloy::primitives::{Address, TxHash, U256};
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::blockchain::units::{format_base_units, parse_quantity, parse_token_amount};
use crate::blockchain::ConfirmationStatus;
use crate::config::TokenConfig;
use crate::connector::{ConnectionState, ConnectionStatus, WalletConnector};
use crate::observability::metrics;
use crate::transfer::confirm::{await_receipt, ConfirmationPolicy};
use crate::transfer::recipient::RecipientDirectory;
use crate::transfer::request::{TransferReceipt, TransferRequest, TransferResult};
use crate::transfer::token::transfer_calldata;
use crate::transfer::TransferError;

/// Deployment parameters of the executor.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub contract_address: Address,
    pub decimals: u8,
    /// The only account allowed to send.
    pub authorized_sender: Address,
    pub confirmation: ConfirmationPolicy,
    pub recipients: RecipientDirectory,
}

impl From<&TokenConfig> for TransferSettings {
    fn from(config: &TokenConfig) -> Self {
        Self {
            contract_address: config.contract_address,
            decimals: config.decimals,
            authorized_sender: config.authorized_sender,
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(config.confirmation_timeout_secs),
                base_interval_ms: config.poll_interval_ms,
                max_interval_ms: config.max_poll_interval_ms,
            },
            recipients: RecipientDirectory::new(
                config.recipients.iter().map(|(name, address)| (name.as_str(), *address)),
            ),
        }
    }
}

/// Performs one on-chain `transfer` per submitted request.
pub struct TransferExecutor {
    connector: WalletConnector,
    settings: TransferSettings,
    submissions: Mutex<()>,
}

/// A request that passed every local check.
struct ValidatedTransfer {
    from: Address,
    to: Address,
    amount: U256,
}

impl TransferExecutor {
    pub fn new(connector: WalletConnector, settings: TransferSettings) -> Self {
        Self {
            connector,
            settings,
            submissions: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Submit `request` using the account in `connection`.
    ///
    /// Never retries: at most one `eth_sendTransaction` is issued. Local
    /// validation failures touch no provider at all.
    pub async fn submit(&self, request: TransferRequest, connection: &ConnectionState) -> TransferResult {
        let request_id = request.id;
        let result = match self.validate(&request, connection) {
            Ok(transfer) => self.execute(request, transfer).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(receipt) if receipt.confirmed => {
                metrics::record_transfer("confirmed");
                tracing::info!(
                    request_id = %request_id,
                    tx_hash = %receipt.transaction_id,
                    block_number = ?receipt.block_number,
                    "Transfer confirmed"
                );
                TransferResult::Submitted { request_id, receipt }
            }
            Ok(receipt) => {
                metrics::record_transfer("unconfirmed");
                tracing::warn!(
                    request_id = %request_id,
                    tx_hash = %receipt.transaction_id,
                    "Transfer broadcast but not confirmed in time"
                );
                TransferResult::Submitted { request_id, receipt }
            }
            Err(error) => {
                metrics::record_transfer(error.kind());
                tracing::warn!(request_id = %request_id, error = %error, "Transfer failed");
                TransferResult::Failed { request_id, error }
            }
        }
    }

    fn validate(&self, request: &TransferRequest, connection: &ConnectionState) -> Result<ValidatedTransfer, TransferError> {
        let from = match (connection.status, connection.address) {
            (ConnectionStatus::Connected, Some(address)) => address,
            _ => return Err(TransferError::NotConnected),
        };

        let amount = parse_token_amount(&request.amount_tokens, self.settings.decimals)
            .map_err(TransferError::InvalidAmount)?;

        if from != self.settings.authorized_sender {
            return Err(TransferError::WrongAccount {
                expected: self.settings.authorized_sender,
                actual: from,
            });
        }

        let to = self.settings.recipients.resolve(&request.recipient)?;
        Ok(ValidatedTransfer { from, to, amount })
    }

    async fn execute(&self, request: TransferRequest, transfer: ValidatedTransfer) -> Result<TransferReceipt, TransferError> {
        let _serial = self.submissions.lock().await;

        let tx_hash = self.send(&transfer).await?;
        let amount_tokens = format_base_units(transfer.amount, self.settings.decimals);
        tracing::info!(
            request_id = %request.id,
            tx_hash = %tx_hash,
            to = %transfer.to,
            amount = %amount_tokens,
            "Transfer submitted, awaiting receipt"
        );

        let (confirmed, block_number) =
            match await_receipt(&self.connector, tx_hash, self.settings.confirmation).await {
                Some(ConfirmationStatus::Confirmed { block_number }) => (true, block_number),
                Some(ConfirmationStatus::Reverted) => {
                    return Err(TransferError::TransferFailed(format!(
                        "transaction {} reverted",
                        tx_hash
                    )))
                }
                Some(ConfirmationStatus::Pending) | None => (false, None),
            };

        Ok(TransferReceipt {
            transaction_id: tx_hash,
            from: transfer.from,
            to: transfer.to,
            amount_tokens,
            amount_base_units: transfer.amount,
            confirmed,
            block_number,
            message: request.message,
        })
    }

    /// Read the gas price and send the call. The only place a transaction leaves.
    async fn send(&self, transfer: &ValidatedTransfer) -> Result<TxHash, TransferError> {
        let lease = self
            .connector
            .provider_lease()
            .await
            .map_err(|e| TransferError::TransferFailed(e.to_string()))?;

        let gas_price = lease
            .request("eth_gasPrice", json!([]))
            .await
            .map_err(|e| TransferError::TransferFailed(e.message))?;
        let gas_price = parse_quantity(&gas_price)
            .ok_or_else(|| TransferError::TransferFailed(format!("malformed gas price {}", gas_price)))?;

        let tx = json!([{
            "from": transfer.from,
            "to": self.settings.contract_address,
            "data": transfer_calldata(transfer.to, transfer.amount),
            "gasPrice": gas_price,
        }]);

        let response = lease
            .request("eth_sendTransaction", tx)
            .await
            .map_err(|e| TransferError::TransferFailed(e.message))?;

        serde_json::from_value::<TxHash>(response.clone())
            .map_err(|_| TransferError::TransferFailed(format!("malformed transaction hash {}", response)))
    }
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferExecutor")
            .field("contract", &self.settings.contract_address)
            .field("authorized_sender", &self.settings.authorized_sender)
            .finish()
    }
}
