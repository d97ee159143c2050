//! Wallet connector.
//!
//! # Data Flow
//! ```text
//! caller ──connect()──▶ sequence gate ──▶ machine.rs (ConnectSequence)
//!                                             │ provider requests
//!                                             ▼
//!                              commit if epoch unchanged ──▶ watch<ConnectionState>
//!
//! provider events ──▶ session.rs (ordered queue) ──▶ same gate / commit path
//! ```
//!
//! # Concurrency
//! - One sequence at a time: explicit `connect()` calls that find the gate
//!   held fail with `ConnectionInProgress`; event-driven sequences queue.
//! - Every disconnect and every provider event advances the epoch. A
//!   sequence publishes only if the epoch it started under is still current,
//!   so stale results are dropped.
//! - A `chainChanged` to the target network while a sequence runs (usually
//!   the wallet reporting that sequence's own switch) starts nothing new.
//! - An explicit `connect()` overtaken by an event waits for the newer
//!   sequence and reports its outcome.
//! - Epoch checks and state writes happen under the watch channel's lock.

pub mod machine;
pub mod network;
pub mod session;
pub mod state;

use alloy::primitives::Address;
use serde_json::json;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{watch, Mutex, MutexGuard};

use crate::blockchain::ChainId;
use crate::observability::metrics;
use crate::provider::{ProviderEvent, WalletProvider};

pub use machine::{ConnectPhase, ConnectSequence};
pub use network::{NativeCurrency, NetworkDescriptor};
pub use session::Session;
pub use state::{ConnectionState, ConnectionStatus};

/// Reasons a connect attempt fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("no wallet provider detected; install or configure a wallet to proceed")]
    ProviderUnavailable,

    #[error("connection rejected by the user")]
    UserRejected,

    #[error("please switch the wallet to chain {expected}: {reason}")]
    NetworkMismatch { expected: ChainId, reason: String },

    #[error("failed to connect to the wallet: {0}")]
    ConnectionFailed(String),

    #[error("a wallet connection is already in progress")]
    ConnectionInProgress,
}

impl ConnectError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::UserRejected => "user_rejected",
            Self::NetworkMismatch { .. } => "network_mismatch",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::ConnectionInProgress => "connection_in_progress",
        }
    }
}

struct Inner {
    provider: Option<Arc<dyn WalletProvider>>,
    network: NetworkDescriptor,
    gate: Mutex<()>,
    epoch: AtomicU64,
    state: watch::Sender<ConnectionState>,
    /// Typed cause of the last published `Error` state.
    last_error: StdMutex<Option<ConnectError>>,
    /// Live session tasks.
    sessions: AtomicUsize,
}

/// Owns the connection state and serializes all access to the provider.
#[derive(Clone)]
pub struct WalletConnector {
    inner: Arc<Inner>,
}

/// Exclusive access to the provider, held outside of connect sequences.
pub struct ProviderLease<'a> {
    provider: Arc<dyn WalletProvider>,
    _guard: MutexGuard<'a, ()>,
}

impl Deref for ProviderLease<'_> {
    type Target = dyn WalletProvider;

    fn deref(&self) -> &Self::Target {
        self.provider.as_ref()
    }
}

impl WalletConnector {
    /// `provider` is `None` when no wallet exists in the environment.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, network: NetworkDescriptor) -> Self {
        let (state, _) = watch::channel(ConnectionState::disconnected());
        Self {
            inner: Arc::new(Inner {
                provider,
                network,
                gate: Mutex::new(()),
                epoch: AtomicU64::new(0),
                state,
                last_error: StdMutex::new(None),
                sessions: AtomicUsize::new(0),
            }),
        }
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.inner.network
    }

    pub fn has_provider(&self) -> bool {
        self.inner.provider.is_some()
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn provider(&self) -> Result<Arc<dyn WalletProvider>, ConnectError> {
        self.inner.provider.clone().ok_or(ConnectError::ProviderUnavailable)
    }

    /// Wait for any running sequence, then borrow the provider.
    pub async fn provider_lease(&self) -> Result<ProviderLease<'_>, ConnectError> {
        let provider = self.provider()?;
        let guard = self.inner.gate.lock().await;
        Ok(ProviderLease { provider, _guard: guard })
    }

    /// Request account access and make sure the wallet is on the target network.
    ///
    /// Fails with `ConnectionInProgress` while another sequence runs. If a
    /// provider event supersedes this call before it finishes, its own result
    /// is dropped and the outcome of the newer sequence is reported. After a
    /// disconnect it fails with `ConnectionFailed`.
    pub async fn connect(&self) -> Result<ConnectionState, ConnectError> {
        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(err) => {
                tracing::warn!("Connect requested but no wallet provider is present");
                metrics::record_connect(err.kind());
                let epoch = self.current_epoch();
                self.publish(epoch, |_| self.failed_state(None, None, &err));
                return Err(err);
            }
        };

        let committed = {
            let _gate = match self.inner.gate.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("Connect rejected, sequence already running");
                    metrics::record_connect(ConnectError::ConnectionInProgress.kind());
                    return Err(ConnectError::ConnectionInProgress);
                }
            };
            let epoch = self.current_epoch();
            self.run_sequence(provider.as_ref(), None, epoch).await
        };

        match committed {
            Some(result) => result,
            None => self.await_settled().await,
        }
    }

    /// Wait until no sequence is pending and translate the resulting state.
    ///
    /// Used by a `connect()` whose own result was dropped because a provider
    /// event or a disconnect came in first.
    async fn await_settled(&self) -> Result<ConnectionState, ConnectError> {
        if self.inner.sessions.load(Ordering::SeqCst) == 0 {
            self.settle_abandoned();
        }
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| s.status != ConnectionStatus::Connecting).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };

        match state.status {
            ConnectionStatus::Connected => Ok(state),
            ConnectionStatus::Error => Err(self.last_error().unwrap_or_else(|| {
                ConnectError::ConnectionFailed(state.error_message.clone().unwrap_or_default())
            })),
            _ => Err(ConnectError::ConnectionFailed(
                "the wallet was disconnected before the connection completed".to_string(),
            )),
        }
    }

    fn last_error(&self) -> Option<ConnectError> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Build an `Error` state and remember its typed cause.
    fn failed_state(
        &self,
        address: Option<Address>,
        chain_id: Option<ChainId>,
        err: &ConnectError,
    ) -> ConnectionState {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(err.clone());
        ConnectionState::failed(address, chain_id, err)
    }

    /// Clear local state. Always succeeds, and wallet-side authorization
    /// is left in place.
    pub fn disconnect(&self) -> ConnectionState {
        let inner = &self.inner;
        inner.state.send_modify(|state| {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            *state = ConnectionState::disconnected();
        });
        tracing::info!("Wallet disconnected");
        self.state()
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Start a new epoch, superseding whatever sequence is in flight.
    pub(crate) fn advance_epoch(&self) -> u64 {
        let inner = &self.inner;
        let mut epoch = 0;
        inner.state.send_if_modified(|_| {
            epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        epoch
    }

    /// Publish `next(current)` if `epoch` is still current.
    fn publish<F>(&self, epoch: u64, next: F) -> bool
    where
        F: FnOnce(&ConnectionState) -> ConnectionState,
    {
        let inner = &self.inner;
        let mut applied = false;
        inner.state.send_if_modified(|state| {
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            applied = true;
            let updated = next(state);
            let changed = *state != updated;
            *state = updated;
            changed
        });
        applied
    }

    /// `chainChanged` to the target network needs no sequence of its own when
    /// one is already running or the wallet is connected there.
    pub(crate) fn is_settled_by_current(&self, event: &ProviderEvent) -> bool {
        let ProviderEvent::ChainChanged(chain_id) = event else {
            return false;
        };
        if *chain_id != self.inner.network.chain_id {
            return false;
        }
        let running = self.inner.gate.try_lock().is_err();
        let state = self.inner.state.borrow();
        match state.status {
            ConnectionStatus::Connecting => running,
            ConnectionStatus::Connected => state.chain_id == Some(*chain_id),
            _ => false,
        }
    }

    pub(crate) fn session_started(&self) {
        self.inner.sessions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn session_ended(&self) {
        self.inner.sessions.fetch_sub(1, Ordering::SeqCst);
        self.settle_abandoned();
    }

    /// Clear a `Connecting` state that no sequence is left to finish.
    pub(crate) fn settle_abandoned(&self) {
        let Ok(_gate) = self.inner.gate.try_lock() else {
            return;
        };
        let inner = &self.inner;
        let settled = inner.state.send_if_modified(|state| {
            if state.status != ConnectionStatus::Connecting {
                return false;
            }
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            *state = ConnectionState::disconnected();
            true
        });
        if settled {
            tracing::info!("Abandoned connect sequence cleared");
        }
    }

    /// Run one sequence under an already-held gate and commit its outcome.
    ///
    /// `None` when the epoch moved on and nothing was committed.
    async fn run_sequence(
        &self,
        provider: &dyn WalletProvider,
        known_accounts: Option<Vec<Address>>,
        epoch: u64,
    ) -> Option<Result<ConnectionState, ConnectError>> {
        self.publish(epoch, ConnectionState::connecting);

        let outcome = ConnectSequence::new(provider, &self.inner.network, known_accounts)
            .run()
            .await;

        let committed = match &outcome.result {
            Ok(()) => match (outcome.address, outcome.chain_id, outcome.balance.clone()) {
                (Some(address), Some(chain_id), Some(balance)) => {
                    self.publish(epoch, |_| ConnectionState::connected(address, chain_id, balance))
                }
                _ => false,
            },
            Err(err) => self.publish(epoch, |_| {
                self.failed_state(outcome.address, outcome.chain_id, err)
            }),
        };

        if !committed {
            tracing::debug!(epoch, "Connect sequence superseded, result dropped");
            return None;
        }

        match outcome.result {
            Ok(()) => {
                metrics::record_connect("connected");
                let state = self.state();
                tracing::info!(
                    address = ?state.address_hex(),
                    chain_id = ?state.chain_id,
                    balance = ?state.balance,
                    "Wallet connected"
                );
                Some(Ok(state))
            }
            Err(err) => {
                metrics::record_connect(err.kind());
                tracing::warn!(error = %err, "Wallet connection failed");
                Some(Err(err))
            }
        }
    }

    /// Sequence triggered by a provider event; waits for the gate instead of failing.
    pub(crate) async fn reconnect(&self, known_accounts: Option<Vec<Address>>, epoch: u64) {
        let Ok(provider) = self.provider() else {
            return;
        };
        let _gate = self.inner.gate.lock().await;
        if self.current_epoch() != epoch {
            return;
        }
        let _ = self.run_sequence(provider.as_ref(), known_accounts, epoch).await;
    }

    /// Accounts the wallet already authorized, without prompting.
    pub(crate) async fn authorized_accounts(&self) -> Vec<Address> {
        let Ok(lease) = self.provider_lease().await else {
            return Vec::new();
        };
        match lease.request("eth_accounts", json!([])).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not read authorized accounts");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for WalletConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnector")
            .field("network", &self.inner.network.chain_id)
            .field("has_provider", &self.has_provider())
            .field("state", &self.state())
            .finish()
    }
}
