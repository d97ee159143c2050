//! Connect flow and provider event tests.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use uzh_wallet::connector::NetworkDescriptor;
use uzh_wallet::provider::ProviderEvent;
use uzh_wallet::{ConnectError, ConnectionState, ConnectionStatus, WalletConnector};

mod common;
use common::{MockProvider, ACCOUNT, MAINNET, OTHER_ACCOUNT, UZH};

fn connector_for(mock: &Arc<MockProvider>) -> WalletConnector {
    WalletConnector::new(Some(mock.as_provider()), NetworkDescriptor::default())
}

async fn wait_for_state<F>(connector: &WalletConnector, predicate: F) -> ConnectionState
where
    F: FnMut(&ConnectionState) -> bool,
{
    let mut rx = connector.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("state not reached in time")
        .expect("connector dropped");
    state.clone()
}

#[tokio::test]
async fn test_connect_on_target_network() {
    let mock = MockProvider::new();
    let connector = connector_for(&mock);

    let state = connector.connect().await.unwrap();
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert_eq!(state.address, Some(ACCOUNT));
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(state.balance.as_deref(), Some("1.5000"));
    assert_eq!(state.address_hex().unwrap(), format!("0x{}", "a".repeat(40)));
    assert_eq!(state.error_message, None);

    assert_eq!(
        mock.calls(),
        vec!["eth_requestAccounts", "eth_chainId", "eth_getBalance"]
    );
    assert_eq!(connector.state(), state);
}

#[tokio::test]
async fn test_connect_without_wallet() {
    let connector = WalletConnector::new(None, NetworkDescriptor::default());
    assert!(!connector.has_provider());

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err, ConnectError::ProviderUnavailable);
    let state = connector.state();
    assert_eq!(state.status, ConnectionStatus::Error);
    assert!(state.error_message.unwrap().contains("no wallet provider"));
}

#[tokio::test]
async fn test_user_rejects_account_request() {
    let mock = MockProvider::with(|s| s.reject_accounts = true);
    let connector = connector_for(&mock);

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err, ConnectError::UserRejected);

    let state = connector.state();
    assert_eq!(state.status, ConnectionStatus::Error);
    assert_eq!(state.error_message, Some(ConnectError::UserRejected.to_string()));
    assert_eq!(mock.count("eth_chainId"), 0);
}

#[tokio::test]
async fn test_connect_switches_known_network() {
    let mock = MockProvider::with(|s| s.chain = MAINNET);
    let connector = connector_for(&mock);

    let state = connector.connect().await.unwrap();
    assert!(state.is_connected());
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(mock.count("wallet_switchEthereumChain"), 1);
    assert_eq!(mock.count("wallet_addEthereumChain"), 0);
    assert_eq!(mock.count("eth_chainId"), 2);
    assert_eq!(mock.chain(), UZH);
}

#[tokio::test]
async fn test_connect_adds_unknown_network_once() {
    let mock = MockProvider::with(|s| {
        s.chain = MAINNET;
        s.known_chains = vec![MAINNET];
    });
    let connector = connector_for(&mock);

    let state = connector.connect().await.unwrap();
    assert!(state.is_connected());
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(mock.count("wallet_addEthereumChain"), 1);
    assert_eq!(mock.count("wallet_switchEthereumChain"), 2);
}

#[tokio::test]
async fn test_failed_add_is_network_mismatch() {
    let mock = MockProvider::with(|s| {
        s.chain = MAINNET;
        s.known_chains = vec![MAINNET];
        s.fail_add = true;
    });
    let connector = connector_for(&mock);

    let err = connector.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::NetworkMismatch { expected, .. } if expected == UZH));
    assert_eq!(mock.count("wallet_addEthereumChain"), 1);
    assert_eq!(mock.count("wallet_switchEthereumChain"), 1);

    let state = connector.state();
    assert_eq!(state.status, ConnectionStatus::Error);
    assert_eq!(state.address, Some(ACCOUNT));
    assert_eq!(state.chain_id, Some(MAINNET));
}

#[tokio::test]
async fn test_switch_that_does_not_take_effect() {
    let mock = MockProvider::with(|s| {
        s.chain = MAINNET;
        s.switch_noop = true;
    });
    let connector = connector_for(&mock);

    let err = connector.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::NetworkMismatch { .. }));
    assert_eq!(mock.count("wallet_switchEthereumChain"), 1);
    assert_eq!(mock.count("eth_getBalance"), 0);
}

#[tokio::test]
async fn test_second_connect_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let mock = MockProvider::with(|s| s.hold_accounts = Some(gate.clone()));
    let connector = connector_for(&mock);

    let first = tokio::spawn({
        let connector = connector.clone();
        async move { connector.connect().await }
    });
    mock.wait_for_calls("eth_requestAccounts", 1).await;
    assert_eq!(connector.state().status, ConnectionStatus::Connecting);

    let err = connector.connect().await.unwrap_err();
    assert_eq!(err, ConnectError::ConnectionInProgress);
    assert_eq!(connector.state().status, ConnectionStatus::Connecting);

    gate.notify_one();
    let state = first.await.unwrap().unwrap();
    assert!(state.is_connected());
    assert_eq!(mock.count("eth_requestAccounts"), 1);
}

#[tokio::test]
async fn test_disconnect_clears_state() {
    let mock = MockProvider::new();
    let connector = connector_for(&mock);
    connector.connect().await.unwrap();

    let first = connector.disconnect();
    let second = connector.disconnect();
    assert_eq!(first, ConnectionState::disconnected());
    assert_eq!(first, second);
    assert_eq!(first.address, None);
    assert_eq!(first.balance, None);
}

#[tokio::test]
async fn test_disconnect_discards_in_flight_connect() {
    let gate = Arc::new(Notify::new());
    let mock = MockProvider::with(|s| s.hold_accounts = Some(gate.clone()));
    let connector = connector_for(&mock);

    let pending = tokio::spawn({
        let connector = connector.clone();
        async move { connector.connect().await }
    });
    mock.wait_for_calls("eth_requestAccounts", 1).await;

    connector.disconnect();
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, ConnectError::ConnectionFailed(_)));
    assert_eq!(connector.state(), ConnectionState::disconnected());
}

#[tokio::test]
async fn test_account_events_follow_latest_account() {
    let mock = MockProvider::new();
    let connector = connector_for(&mock);
    let session = connector.open_session().unwrap();

    mock.emit(ProviderEvent::AccountsChanged(vec![ACCOUNT]));
    mock.emit(ProviderEvent::AccountsChanged(vec![OTHER_ACCOUNT]));

    let state = wait_for_state(&connector, |s| s.is_connected() && s.address == Some(OTHER_ACCOUNT)).await;
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(mock.count("eth_requestAccounts"), 0);

    mock.emit(ProviderEvent::AccountsChanged(Vec::new()));
    let state = wait_for_state(&connector, |s| s.status == ConnectionStatus::Disconnected).await;
    assert_eq!(state.address, None);

    drop(session);
}

#[tokio::test]
async fn test_chain_change_revalidates_network() {
    let mock = MockProvider::new();
    let connector = connector_for(&mock);
    connector.connect().await.unwrap();
    let _session = connector.open_session().unwrap();

    mock.set(|s| s.chain = MAINNET);
    mock.emit(ProviderEvent::ChainChanged(MAINNET));

    mock.wait_for_calls("wallet_switchEthereumChain", 1).await;
    let state = wait_for_state(&connector, |s| s.is_connected()).await;
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(mock.chain(), UZH);
}

#[tokio::test]
async fn test_connect_with_session_switches_network_once() {
    let mock = MockProvider::with(|s| {
        s.chain = MAINNET;
        s.balance_delay = Some(Duration::from_millis(20));
    });
    let connector = connector_for(&mock);
    let _session = connector.open_session().unwrap();
    mock.wait_for_calls("eth_accounts", 1).await;

    let state = connector.connect().await.unwrap();
    assert!(state.is_connected());
    assert_eq!(state.chain_id, Some(UZH));
    assert_eq!(mock.count("eth_requestAccounts"), 1);
    assert_eq!(mock.count("wallet_switchEthereumChain"), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.state(), state);
    assert_eq!(mock.count("eth_requestAccounts"), 1);
    assert_eq!(mock.count("eth_getBalance"), 1);
}

#[tokio::test]
async fn test_connect_overtaken_by_account_change_reports_new_account() {
    let gate = Arc::new(Notify::new());
    let mock = MockProvider::with(|s| s.hold_accounts = Some(gate.clone()));
    let connector = connector_for(&mock);
    let _session = connector.open_session().unwrap();
    mock.wait_for_calls("eth_accounts", 1).await;

    let pending = tokio::spawn({
        let connector = connector.clone();
        async move { connector.connect().await }
    });
    mock.wait_for_calls("eth_requestAccounts", 1).await;

    mock.emit(ProviderEvent::AccountsChanged(vec![OTHER_ACCOUNT]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    gate.notify_one();

    let state = pending.await.unwrap().unwrap();
    assert!(state.is_connected());
    assert_eq!(state.address, Some(OTHER_ACCOUNT));
    assert_eq!(connector.state(), state);
    assert_eq!(mock.count("eth_requestAccounts"), 1);
}

#[tokio::test]
async fn test_connect_fails_when_overtaking_session_ends() {
    let gate = Arc::new(Notify::new());
    let mock = MockProvider::with(|s| s.hold_accounts = Some(gate.clone()));
    let connector = connector_for(&mock);
    let session = connector.open_session().unwrap();
    mock.wait_for_calls("eth_accounts", 1).await;

    let pending = tokio::spawn({
        let connector = connector.clone();
        async move { connector.connect().await }
    });
    mock.wait_for_calls("eth_requestAccounts", 1).await;

    mock.emit(ProviderEvent::AccountsChanged(vec![OTHER_ACCOUNT]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(session);
    gate.notify_one();

    let err = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("connect did not finish")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ConnectError::ConnectionFailed(_)));
    assert_eq!(connector.state(), ConnectionState::disconnected());
}

#[tokio::test]
async fn test_session_resumes_authorized_account() {
    let mock = MockProvider::with(|s| s.authorized = vec![ACCOUNT]);
    let connector = connector_for(&mock);
    let session = connector.open_session().unwrap();

    let state = wait_for_state(&connector, |s| s.is_connected()).await;
    assert_eq!(state.address, Some(ACCOUNT));
    assert_eq!(mock.count("eth_accounts"), 1);
    assert_eq!(mock.count("eth_requestAccounts"), 0);

    let closed = session.close();
    assert_eq!(closed, ConnectionState::disconnected());
}

#[tokio::test]
async fn test_dropping_session_unregisters_listeners() {
    let mock = MockProvider::new();
    let connector = connector_for(&mock);

    let session = connector.open_session().unwrap();
    assert_eq!(session.subscription_count(), 2);
    assert_eq!(mock.listener_count(), 2);

    drop(session);
    assert_eq!(mock.listener_count(), 0);

    mock.emit(ProviderEvent::AccountsChanged(vec![ACCOUNT]));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connector.state().status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_open_session_without_wallet() {
    let connector = WalletConnector::new(None, NetworkDescriptor::default());
    let err = connector.open_session().err().unwrap();
    assert_eq!(err, ConnectError::ProviderUnavailable);
}
