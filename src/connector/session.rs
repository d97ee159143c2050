//! Provider event session.
//!
//! A [`Session`] holds the `accountsChanged` and `chainChanged`
//! registrations and the task that reacts to them. Events are queued in
//! arrival order. When a newer event arrives while an older one's connect
//! sequence is still running, the older sequence is dropped unfinished,
//! except for a `chainChanged` to the target network, which the running
//! sequence already covers.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connector::{ConnectError, ConnectionState, WalletConnector};
use crate::provider::{Listener, ProviderEvent, ProviderEventKind, Subscription};

/// Live link between a connector and its provider's notifications.
///
/// Dropping the session stops event processing and unregisters both
/// listeners. [`Session::close`] also disconnects.
pub struct Session {
    connector: WalletConnector,
    task: JoinHandle<()>,
    subscriptions: Vec<Subscription>,
}

impl WalletConnector {
    /// Subscribe to provider notifications for the lifetime of the returned session.
    ///
    /// If the wallet already authorized an account, a connect sequence is
    /// started for it without prompting. Must be called inside a Tokio runtime.
    pub fn open_session(&self) -> Result<Session, ConnectError> {
        let provider = self.provider()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let subscriptions = [ProviderEventKind::AccountsChanged, ProviderEventKind::ChainChanged]
            .into_iter()
            .map(|kind| Subscription::acquire(provider.clone(), kind, forwarder(tx.clone())))
            .collect();

        let task = tokio::spawn(process_events(self.clone(), rx, SessionExit::new(self)));
        tracing::info!("Wallet session opened");

        Ok(Session {
            connector: self.clone(),
            task,
            subscriptions,
        })
    }
}

impl Session {
    pub fn connector(&self) -> &WalletConnector {
        &self.connector
    }

    pub fn state(&self) -> ConnectionState {
        self.connector.state()
    }

    /// Number of provider registrations this session holds.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// End the session and clear the connection.
    pub fn close(self) -> ConnectionState {
        let connector = self.connector.clone();
        drop(self);
        connector.disconnect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!("Wallet session closed");
    }
}

fn forwarder(tx: mpsc::UnboundedSender<ProviderEvent>) -> Listener {
    Arc::new(move |event: &ProviderEvent| {
        let _ = tx.send(event.clone());
    })
}

/// Counts the event task as live until it is dropped, then clears any
/// half-finished connection it leaves behind.
struct SessionExit(WalletConnector);

impl SessionExit {
    fn new(connector: &WalletConnector) -> Self {
        connector.session_started();
        Self(connector.clone())
    }
}

impl Drop for SessionExit {
    fn drop(&mut self) {
        self.0.session_ended();
    }
}

async fn process_events(
    connector: WalletConnector,
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    _exit: SessionExit,
) {
    let mut pending = resume(&connector).await;

    'events: loop {
        let event = match pending.take() {
            Some(event) => event,
            None => match events.recv().await {
                Some(event) => event,
                None => break,
            },
        };

        if connector.is_settled_by_current(&event) {
            tracing::debug!(?event, "Provider event covered by current connection");
            continue;
        }

        let epoch = connector.advance_epoch();
        tracing::debug!(?event, epoch, "Provider event");

        let known_accounts = match event {
            ProviderEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                connector.disconnect();
                continue;
            }
            ProviderEvent::AccountsChanged(accounts) => Some(accounts),
            ProviderEvent::ChainChanged(_) => None,
        };

        let sequence = connector.reconnect(known_accounts, epoch);
        tokio::pin!(sequence);
        loop {
            tokio::select! {
                biased;
                next = events.recv() => match next {
                    Some(next) if connector.is_settled_by_current(&next) => {
                        tracing::debug!(event = ?next, "Provider event covered by running sequence");
                    }
                    Some(next) => {
                        pending = Some(next);
                        continue 'events;
                    }
                    None => break 'events,
                },
                _ = &mut sequence => continue 'events,
            }
        }
    }
}

/// Turn an existing authorization into a synthetic account event.
async fn resume(connector: &WalletConnector) -> Option<ProviderEvent> {
    let accounts = connector.authorized_accounts().await;
    if accounts.is_empty() {
        None
    } else {
        tracing::info!(accounts = accounts.len(), "Resuming previously authorized wallet");
        Some(ProviderEvent::AccountsChanged(accounts))
    }
}

