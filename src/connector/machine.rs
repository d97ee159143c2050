//! Connect sequence state machine.
//!
//! # States
//! ```text
//! Idle ─▶ RequestingAccounts ─▶ CheckingNetwork ─▶ ReadingBalance ─▶ Connected
//!   │                               │   ▲
//!   │ (accounts already known)      ▼   │ switch ok
//!   └──────────────────────▶ SwitchingNetwork ◀──┐
//!                                   │ 4902       │ add ok
//!                                   ▼            │
//!                              AddingNetwork ────┘
//! ```
//! Any state may end in `Failed`. The network is added at most once and
//! switched at most twice, so every run terminates.

use alloy::primitives::Address;
use serde_json::json;

use crate::blockchain::units::{format_fixed, parse_quantity};
use crate::blockchain::ChainId;
use crate::connector::{ConnectError, NetworkDescriptor};
use crate::provider::{codes, ProviderError, WalletProvider};

/// Decimal places shown for the native balance.
pub const BALANCE_DISPLAY_PLACES: u8 = 4;

/// Phase of a connect sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectPhase {
    Idle,
    RequestingAccounts,
    CheckingNetwork,
    SwitchingNetwork,
    AddingNetwork,
    ReadingBalance,
    Connected,
    Failed(ConnectError),
}

impl ConnectPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequestingAccounts => "requesting_accounts",
            Self::CheckingNetwork => "checking_network",
            Self::SwitchingNetwork => "switching_network",
            Self::AddingNetwork => "adding_network",
            Self::ReadingBalance => "reading_balance",
            Self::Connected => "connected",
            Self::Failed(_) => "failed",
        }
    }
}

/// What a finished sequence learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceOutcome {
    pub address: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub balance: Option<String>,
    pub result: Result<(), ConnectError>,
}

/// Map an account-request failure onto the connect taxonomy.
pub fn classify_account_error(err: &ProviderError) -> ConnectError {
    match err.code {
        codes::USER_REJECTED => ConnectError::UserRejected,
        codes::REQUEST_PENDING => ConnectError::ConnectionInProgress,
        _ => ConnectError::ConnectionFailed(err.message.clone()),
    }
}

/// One run of the connect flow against a provider.
pub struct ConnectSequence<'a> {
    provider: &'a dyn WalletProvider,
    network: &'a NetworkDescriptor,
    known_accounts: Option<Vec<Address>>,
    address: Option<Address>,
    chain_id: Option<ChainId>,
    balance: Option<String>,
    switched: bool,
    added: bool,
}

impl<'a> ConnectSequence<'a> {
    /// `known_accounts` skips the account request; it carries the list an
    /// `accountsChanged` notification delivered.
    pub fn new(
        provider: &'a dyn WalletProvider,
        network: &'a NetworkDescriptor,
        known_accounts: Option<Vec<Address>>,
    ) -> Self {
        Self {
            provider,
            network,
            known_accounts,
            address: None,
            chain_id: None,
            balance: None,
            switched: false,
            added: false,
        }
    }

    /// Drive the machine to a terminal phase.
    pub async fn run(mut self) -> SequenceOutcome {
        let mut phase = ConnectPhase::Idle;
        while !phase.is_terminal() {
            let next = self.step(&phase).await;
            tracing::debug!(from = phase.name(), to = next.name(), "Connect sequence transition");
            phase = next;
        }

        let result = match phase {
            ConnectPhase::Failed(err) => Err(err),
            _ => Ok(()),
        };
        SequenceOutcome {
            address: self.address,
            chain_id: self.chain_id,
            balance: self.balance,
            result,
        }
    }

    async fn step(&mut self, phase: &ConnectPhase) -> ConnectPhase {
        match phase {
            ConnectPhase::Idle => match self.known_accounts.take() {
                Some(accounts) => self.adopt_accounts(accounts),
                None => ConnectPhase::RequestingAccounts,
            },
            ConnectPhase::RequestingAccounts => self.request_accounts().await,
            ConnectPhase::CheckingNetwork => self.check_network().await,
            ConnectPhase::SwitchingNetwork => self.switch_network().await,
            ConnectPhase::AddingNetwork => self.add_network().await,
            ConnectPhase::ReadingBalance => self.read_balance().await,
            ConnectPhase::Connected | ConnectPhase::Failed(_) => phase.clone(),
        }
    }

    fn adopt_accounts(&mut self, accounts: Vec<Address>) -> ConnectPhase {
        match accounts.first() {
            Some(first) => {
                self.address = Some(*first);
                ConnectPhase::CheckingNetwork
            }
            None => ConnectPhase::Failed(ConnectError::ConnectionFailed(
                "no accounts available; make sure the wallet is unlocked".to_string(),
            )),
        }
    }

    async fn request_accounts(&mut self) -> ConnectPhase {
        match self.provider.request("eth_requestAccounts", json!([])).await {
            Ok(value) => match serde_json::from_value::<Vec<Address>>(value) {
                Ok(accounts) => self.adopt_accounts(accounts),
                Err(e) => ConnectPhase::Failed(ConnectError::ConnectionFailed(format!(
                    "malformed account list: {}",
                    e
                ))),
            },
            Err(err) => ConnectPhase::Failed(classify_account_error(&err)),
        }
    }

    async fn check_network(&mut self) -> ConnectPhase {
        let chain_id = match self.provider.request("eth_chainId", json!([])).await {
            Ok(value) => match ChainId::from_json(&value) {
                Some(id) => id,
                None => {
                    return ConnectPhase::Failed(ConnectError::ConnectionFailed(format!(
                        "malformed chain id {}",
                        value
                    )))
                }
            },
            Err(err) => return ConnectPhase::Failed(ConnectError::ConnectionFailed(err.message)),
        };
        self.chain_id = Some(chain_id);

        if chain_id == self.network.chain_id {
            ConnectPhase::ReadingBalance
        } else if self.switched {
            ConnectPhase::Failed(self.mismatch(format!(
                "wallet stayed on chain {} after switching",
                chain_id
            )))
        } else {
            ConnectPhase::SwitchingNetwork
        }
    }

    async fn switch_network(&mut self) -> ConnectPhase {
        let params = self.network.switch_chain_params();
        match self.provider.request("wallet_switchEthereumChain", params).await {
            Ok(_) => {
                self.switched = true;
                ConnectPhase::CheckingNetwork
            }
            Err(err) if err.is_unrecognized_chain() && !self.added => ConnectPhase::AddingNetwork,
            Err(err) => ConnectPhase::Failed(self.mismatch(err.message)),
        }
    }

    async fn add_network(&mut self) -> ConnectPhase {
        self.added = true;
        let params = self.network.add_chain_params();
        match self.provider.request("wallet_addEthereumChain", params).await {
            Ok(_) => ConnectPhase::SwitchingNetwork,
            Err(err) => ConnectPhase::Failed(self.mismatch(err.message)),
        }
    }

    async fn read_balance(&mut self) -> ConnectPhase {
        let Some(address) = self.address else {
            return ConnectPhase::Failed(ConnectError::ConnectionFailed("no account selected".to_string()));
        };
        let params = json!([address, "latest"]);
        match self.provider.request("eth_getBalance", params).await {
            Ok(value) => match parse_quantity(&value) {
                Some(wei) => {
                    let decimals = self.network.native_currency.decimals;
                    self.balance = Some(format_fixed(wei, decimals, BALANCE_DISPLAY_PLACES));
                    ConnectPhase::Connected
                }
                None => ConnectPhase::Failed(ConnectError::ConnectionFailed(format!(
                    "malformed balance {}",
                    value
                ))),
            },
            Err(err) => ConnectPhase::Failed(ConnectError::ConnectionFailed(err.message)),
        }
    }

    fn mismatch(&self, reason: String) -> ConnectError {
        ConnectError::NetworkMismatch {
            expected: self.network.chain_id,
            reason,
        }
    }
}
