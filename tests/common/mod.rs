//! Shared utilities for connector and transfer integration tests.

#![allow(dead_code)]

use alloy::primitives::{address, Address, TxHash, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use uzh_wallet::blockchain::ChainId;
use uzh_wallet::connector::NetworkDescriptor;
use uzh_wallet::provider::{codes, Listener, ListenerId, ProviderError, ProviderEvent, ProviderEventKind};
use uzh_wallet::WalletProvider;

pub const ACCOUNT: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub const OTHER_ACCOUNT: Address = address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub const AUTHORIZED_SENDER: Address = address!("0x284edb1ab6010422503c4190beb08dbaa6bb7ea5");
pub const JOHN_DOE: Address = address!("0x75ce93e8a7a73cf688b4c0b12b11bbbc96417995");
pub const MAINNET: ChainId = ChainId(1);
pub const UZH: ChainId = ChainId(702);

/// Scripted wallet behaviour. Tests mutate it through [`MockProvider::set`].
pub struct MockState {
    pub accounts: Vec<Address>,
    /// Returned by `eth_accounts`.
    pub authorized: Vec<Address>,
    pub chain: ChainId,
    pub known_chains: Vec<ChainId>,
    pub reject_accounts: bool,
    pub fail_add: bool,
    /// Switch requests succeed without changing the chain.
    pub switch_noop: bool,
    pub balance: U256,
    /// Latency of `eth_getBalance`, keeping a sequence in flight.
    pub balance_delay: Option<Duration>,
    pub gas_price: U256,
    pub send_error: Option<ProviderError>,
    pub receipt: Value,
    /// When set, `eth_requestAccounts` waits for a permit before answering.
    pub hold_accounts: Option<Arc<Notify>>,
    pub calls: Vec<String>,
    pub sent: Vec<Value>,
    listeners: Vec<(ProviderEventKind, ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            accounts: vec![ACCOUNT],
            authorized: Vec::new(),
            chain: UZH,
            known_chains: vec![MAINNET, UZH],
            reject_accounts: false,
            fail_add: false,
            switch_noop: false,
            // 1.5 UZHETHw
            balance: U256::from(1_500_000_000_000_000_000u64),
            balance_delay: None,
            gas_price: U256::from(20_000_000_000u64),
            send_error: None,
            receipt: json!({ "status": "0x1", "blockNumber": "0x10" }),
            hold_accounts: None,
            calls: Vec::new(),
            sent: Vec::new(),
            listeners: Vec::new(),
            next_listener: 1,
        }
    }
}

/// In-memory EIP-1193 provider.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<F: FnOnce(&mut MockState)>(f: F) -> Arc<Self> {
        let mock = Self::new();
        mock.set(f);
        mock
    }

    pub fn set<F: FnOnce(&mut MockState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn as_provider(self: &Arc<Self>) -> Arc<dyn WalletProvider> {
        self.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| c.as_str() == method).count()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn chain(&self) -> ChainId {
        self.state.lock().unwrap().chain
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    /// Deliver `event` to every matching listener, like a wallet would.
    pub fn emit(&self, event: ProviderEvent) {
        let listeners: Vec<Listener> = self
            .state
            .lock()
            .unwrap()
            .listeners
            .iter()
            .filter(|(kind, _, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Wait until `method` has been requested at least `n` times.
    pub async fn wait_for_calls(&self, method: &str, n: usize) {
        wait_until(|| self.count(method) >= n).await;
    }

    fn tx_hash(n: usize) -> TxHash {
        TxHash::with_last_byte(n as u8)
    }

    /// Switch like a wallet does: unknown chains fail with 4902, and a chain
    /// that actually changes is announced with `chainChanged`.
    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let target = NetworkDescriptor::chain_from_switch_params(params)?;
        let changed = {
            let mut state = self.state.lock().unwrap();
            if !state.known_chains.contains(&target) {
                return Err(ProviderError::new(codes::UNRECOGNIZED_CHAIN, "Unrecognized chain ID"));
            }
            if state.switch_noop || state.chain == target {
                false
            } else {
                state.chain = target;
                true
            }
        };
        if changed {
            self.emit(ProviderEvent::ChainChanged(target));
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (hold, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(method.to_string());
            match method {
                "eth_requestAccounts" => (state.hold_accounts.clone(), None),
                "eth_getBalance" => (None, state.balance_delay),
                _ => (None, None),
            }
        };
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if method == "wallet_switchEthereumChain" {
            return self.switch_chain(&params);
        }

        let mut state = self.state.lock().unwrap();
        match method {
            "eth_requestAccounts" => {
                if state.reject_accounts {
                    Err(ProviderError::user_rejected())
                } else {
                    Ok(json!(state.accounts))
                }
            }
            "eth_accounts" => Ok(json!(state.authorized)),
            "eth_chainId" => Ok(json!(state.chain.to_hex())),
            "wallet_addEthereumChain" => {
                if state.fail_add {
                    return Err(ProviderError::user_rejected());
                }
                let network = NetworkDescriptor::from_add_chain_params(&params)?;
                state.known_chains.push(network.chain_id);
                Ok(Value::Null)
            }
            "eth_getBalance" => Ok(json!(state.balance)),
            "eth_gasPrice" => Ok(json!(state.gas_price)),
            "eth_sendTransaction" => {
                if let Some(err) = state.send_error.clone() {
                    return Err(err);
                }
                state.sent.push(params.get(0).cloned().unwrap_or(Value::Null));
                Ok(json!(Self::tx_hash(state.sent.len())))
            }
            "eth_getTransactionReceipt" => Ok(state.receipt.clone()),
            other => Err(ProviderError::new(
                codes::UNSUPPORTED_METHOD,
                format!("unsupported method {}", other),
            )),
        }
    }

    fn on(&self, event: ProviderEventKind, listener: Listener) -> ListenerId {
        let mut state = self.state.lock().unwrap();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((event, id, listener));
        id
    }

    fn remove_listener(&self, event: ProviderEventKind, id: ListenerId) {
        self.state
            .lock()
            .unwrap()
            .listeners
            .retain(|(kind, lid, _)| !(*kind == event && *lid == id));
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
