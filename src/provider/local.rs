//! Native wallet provider backed by a local key and JSON-RPC endpoints.
//!
//! Answers the same requests a browser extension does, so the connector and
//! executor run unchanged against it.

use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::{BlockchainClient, ChainId, Wallet};
use crate::config::RpcConfig;
use crate::connector::NetworkDescriptor;
use crate::provider::{
    codes, Listener, ListenerId, ProviderError, ProviderEvent, ProviderEventKind, WalletProvider,
};

struct KnownNetwork {
    descriptor: NetworkDescriptor,
    client: BlockchainClient,
}

/// Wallet provider signing with a local key.
pub struct LocalWallet {
    wallet: Wallet,
    rpc: RpcConfig,
    networks: DashMap<ChainId, KnownNetwork>,
    active: AtomicU64,
    authorized: AtomicBool,
    auto_approve: bool,
    listeners: DashMap<ListenerId, (ProviderEventKind, Listener)>,
    next_listener: AtomicU64,
}

impl LocalWallet {
    /// Create a wallet knowing `networks`; the first one starts active.
    pub fn new(
        wallet: Wallet,
        rpc: RpcConfig,
        networks: Vec<NetworkDescriptor>,
        auto_approve: bool,
    ) -> Result<Self, ProviderError> {
        let first = networks
            .first()
            .map(|n| n.chain_id)
            .ok_or_else(|| ProviderError::invalid_params("local wallet needs at least one network"))?;

        let known = DashMap::new();
        for descriptor in networks {
            let client = BlockchainClient::new(&descriptor, &rpc)?;
            known.insert(descriptor.chain_id, KnownNetwork { descriptor, client });
        }

        tracing::info!(
            address = %wallet.address(),
            active_chain = %first,
            networks = known.len(),
            "Local wallet ready"
        );

        Ok(Self {
            wallet,
            rpc,
            networks: known,
            active: AtomicU64::new(first.0),
            authorized: AtomicBool::new(false),
            auto_approve,
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn active_chain(&self) -> ChainId {
        ChainId(self.active.load(Ordering::SeqCst))
    }

    pub fn knows_chain(&self, chain_id: ChainId) -> bool {
        self.networks.contains_key(&chain_id)
    }

    /// Grant account access, as a user approving the connection would.
    pub fn unlock(&self) {
        if !self.authorized.swap(true, Ordering::SeqCst) {
            self.emit(ProviderEvent::AccountsChanged(vec![self.address()]));
        }
    }

    /// Withdraw account access and notify listeners with an empty account list.
    pub fn revoke(&self) {
        if self.authorized.swap(false, Ordering::SeqCst) {
            self.emit(ProviderEvent::AccountsChanged(Vec::new()));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        let mut targets: Vec<(ListenerId, Listener)> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().0 == kind)
            .map(|entry| (*entry.key(), entry.value().1.clone()))
            .collect();
        targets.sort_by_key(|(id, _)| id.0);

        tracing::debug!(event = kind.as_str(), listeners = targets.len(), "Emitting provider event");
        for (_, listener) in targets {
            listener(&event);
        }
    }

    fn accounts(&self) -> Vec<Address> {
        if self.authorized.load(Ordering::SeqCst) {
            vec![self.address()]
        } else {
            Vec::new()
        }
    }

    fn require_authorized(&self) -> Result<(), ProviderError> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::new(
                codes::UNAUTHORIZED,
                "The requested account has not been authorized by the user.",
            ))
        }
    }

    fn active_client(&self) -> Result<BlockchainClient, ProviderError> {
        self.networks
            .get(&self.active_chain())
            .map(|n| n.client.clone())
            .ok_or_else(|| ProviderError::new(codes::INTERNAL, "active network is not registered"))
    }

    fn request_accounts(&self) -> Result<Value, ProviderError> {
        if !self.authorized.load(Ordering::SeqCst) {
            if !self.auto_approve {
                return Err(ProviderError::user_rejected());
            }
            self.authorized.store(true, Ordering::SeqCst);
            tracing::info!(address = %self.address(), "Account access granted");
        }
        Ok(json!(self.accounts()))
    }

    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let target = NetworkDescriptor::chain_from_switch_params(params)?;
        if !self.knows_chain(target) {
            return Err(ProviderError::new(
                codes::UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.", target.to_hex()),
            ));
        }
        let previous = self.active.swap(target.0, Ordering::SeqCst);
        if previous != target.0 {
            tracing::info!(from = previous, to = %target, "Switched network");
            self.emit(ProviderEvent::ChainChanged(target));
        }
        Ok(Value::Null)
    }

    async fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let descriptor = NetworkDescriptor::from_add_chain_params(params)?;
        if !self.knows_chain(descriptor.chain_id) {
            let client = BlockchainClient::new(&descriptor, &self.rpc)?;
            client.verify_chain_id().await?;
            tracing::info!(
                chain_id = %descriptor.chain_id,
                name = %descriptor.chain_name,
                "Network added"
            );
            self.networks
                .insert(descriptor.chain_id, KnownNetwork { descriptor, client });
        }
        Ok(Value::Null)
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        self.require_authorized()?;
        let raw = params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::invalid_params("expected one transaction object"))?;
        let request: TransactionRequest = serde_json::from_value(raw)
            .map_err(|e| ProviderError::invalid_params(format!("malformed transaction: {}", e)))?;

        match request.from {
            Some(from) if from == self.address() => {}
            _ => {
                return Err(ProviderError::new(
                    codes::UNAUTHORIZED,
                    "Transaction sender is not an authorized account.",
                ))
            }
        }

        let client = self.active_client()?;
        let tx_hash = TxBuilder::new(&client, &self.wallet).send(request).await?;
        Ok(json!(tx_hash))
    }

    async fn get_balance(&self, params: &Value) -> Result<Value, ProviderError> {
        let address: Address = params
            .get(0)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| ProviderError::invalid_params("expected [address, block]"))?;
        let balance = self.active_client()?.get_balance(address).await?;
        Ok(json!(balance))
    }

    async fn get_receipt(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx_hash: TxHash = params
            .get(0)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| ProviderError::invalid_params("expected [transactionHash]"))?;
        let receipt = self.active_client()?.get_transaction_receipt(tx_hash).await?;
        serde_json::to_value(receipt).map_err(|e| ProviderError::new(codes::INTERNAL, e.to_string()))
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        tracing::trace!(method, "Local wallet request");
        match method {
            "eth_requestAccounts" => self.request_accounts(),
            "eth_accounts" => Ok(json!(self.accounts())),
            "eth_chainId" => Ok(json!(self.active_chain().to_hex())),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            "wallet_addEthereumChain" => self.add_chain(&params).await,
            "eth_getBalance" => self.get_balance(&params).await,
            "eth_gasPrice" => {
                let price = self.active_client()?.get_gas_price().await?;
                Ok(json!(U256::from(price)))
            }
            "eth_sendTransaction" => self.send_transaction(&params).await,
            "eth_getTransactionReceipt" => self.get_receipt(&params).await,
            other => Err(ProviderError::new(
                codes::UNSUPPORTED_METHOD,
                format!("The method \"{}\" is not supported.", other),
            )),
        }
    }

    fn on(&self, event: ProviderEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.insert(id, (event, listener));
        id
    }

    fn remove_listener(&self, event: ProviderEventKind, id: ListenerId) {
        self.listeners.remove_if(&id, |_, (kind, _)| *kind == event);
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address())
            .field("active_chain", &self.active_chain())
            .field("networks", &self.networks.len())
            .finish()
    }
}
